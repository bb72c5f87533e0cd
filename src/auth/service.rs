//! Registration and Login
//! Mission: Orchestrate store, hasher and token issuer for the public auth operations

use crate::auth::{
    account_store::{AccountStore, StoreError},
    jwt::{IssuedToken, JwtHandler},
    models::{normalize_address, NewAccount},
    password::{fits_bcrypt, PasswordHasher},
};
use anyhow::Context;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a successful register or login
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account_id: Uuid,
    pub token: IssuedToken,
}

/// Flow failures. `InvalidCredentials` never says which check failed.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("account already exists")]
    Conflict,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing required fields")]
    MissingFields,
    #[error("password too long")]
    PasswordTooLong,
    #[error("server error: {0:#}")]
    Server(#[from] anyhow::Error),
}

impl From<StoreError> for FlowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => FlowError::Conflict,
            StoreError::Backend(e) => FlowError::Server(e),
        }
    }
}

/// Register/login orchestration
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AccountStore>,
    hasher: PasswordHasher,
    jwt: Arc<JwtHandler>,
    // Verified against on unknown addresses so misses cost one bcrypt check too.
    decoy_digest: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(store: Arc<dyn AccountStore>, hasher: PasswordHasher, jwt: Arc<JwtHandler>) -> Self {
        Self {
            store,
            hasher,
            jwt,
            decoy_digest: Arc::new(OnceCell::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub fn jwt(&self) -> &Arc<JwtHandler> {
        &self.jwt
    }

    /// Create an account and issue its first token
    pub async fn register(
        &self,
        handle: &str,
        address: &str,
        plaintext: &str,
    ) -> Result<AuthSession, FlowError> {
        let handle = handle.trim();
        let address = normalize_address(address);
        if handle.is_empty() || address.is_empty() || plaintext.is_empty() {
            return Err(FlowError::MissingFields);
        }
        if !fits_bcrypt(plaintext) {
            return Err(FlowError::PasswordTooLong);
        }

        if self.store.find_by_address(&address).await?.is_some() {
            warn!("Registration rejected, address already in use");
            return Err(FlowError::Conflict);
        }

        let password_hash = self.hash_off_thread(plaintext).await?;

        // The store re-checks both unique fields atomically; a concurrent
        // duplicate surfaces here as Conflict.
        let account = self
            .store
            .insert(NewAccount {
                handle: handle.to_string(),
                address,
                password_hash,
            })
            .await
            .map_err(|e| {
                if matches!(e, StoreError::Conflict) {
                    warn!("Registration rejected, handle or address already in use");
                }
                FlowError::from(e)
            })?;

        let token = self.jwt.issue(account.id)?;
        info!("Registered account {} ({})", account.id, account.handle);

        Ok(AuthSession {
            account_id: account.id,
            token,
        })
    }

    /// Check credentials and issue a fresh token
    pub async fn login(&self, address: &str, plaintext: &str) -> Result<AuthSession, FlowError> {
        let address = normalize_address(address);
        if address.is_empty() || plaintext.is_empty() {
            return Err(FlowError::MissingFields);
        }

        let Some(account) = self.store.find_by_address(&address).await? else {
            let decoy = self
                .decoy_digest
                .get_or_try_init(|| self.hash_off_thread("decoy-password"))
                .await?;
            self.verify_off_thread(plaintext, decoy).await?;
            warn!("Failed login attempt");
            return Err(FlowError::InvalidCredentials);
        };

        if !self.verify_off_thread(plaintext, &account.password_hash).await? {
            warn!("Failed login attempt for account {}", account.id);
            return Err(FlowError::InvalidCredentials);
        }

        let token = self.jwt.issue(account.id)?;
        info!("Login successful: {}", account.id);

        Ok(AuthSession {
            account_id: account.id,
            token,
        })
    }

    async fn hash_off_thread(&self, plaintext: &str) -> anyhow::Result<String> {
        let hasher = self.hasher;
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .context("password hashing task failed")?
    }

    async fn verify_off_thread(&self, plaintext: &str, digest: &str) -> anyhow::Result<bool> {
        let hasher = self.hasher;
        let plaintext = plaintext.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .context("password verification task failed")
    }
}
