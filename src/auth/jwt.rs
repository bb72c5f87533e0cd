//! JWT Token Handler
//! Mission: Issue and verify signed, time-bounded account tokens

use crate::auth::models::Claims;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Every token lives exactly this long.
pub const TOKEN_LIFETIME: Duration = Duration::hours(1);

/// A freshly minted token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Why a token was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtHandler {
    /// Create a new JWT handler. An empty secret is refused.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.trim().is_empty() {
            bail!("JWT signing secret is empty");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Issue a token for an account, valid from now
    pub fn issue(&self, account_id: Uuid) -> Result<IssuedToken> {
        self.issue_at(account_id, Utc::now())
    }

    /// Issue a token as if minted at `issued_at`
    pub fn issue_at(&self, account_id: Uuid, issued_at: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = issued_at
            .checked_add_signed(TOKEN_LIFETIME)
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: account_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to generate JWT")?;

        debug!("Issued JWT for account {}, expires at {}", account_id, expires_at);

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and recover the account id it was issued for
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let decoded = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            },
        )?;

        // jsonwebtoken admits exp == now; the boundary instant is already expired.
        if decoded.claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }

        let account_id =
            Uuid::parse_str(&decoded.claims.sub).map_err(|_| TokenError::Malformed)?;

        debug!("Verified JWT for account {}", account_id);

        Ok(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-12345";

    #[test]
    fn test_issue_and_verify() {
        let handler = JwtHandler::new(SECRET).unwrap();
        let account_id = Uuid::new_v4();

        let issued = handler.issue(account_id).unwrap();
        assert!(!issued.token.is_empty());
        assert!(issued.expires_at > Utc::now());

        assert_eq!(handler.verify(&issued.token).unwrap(), account_id);
    }

    #[test]
    fn test_fixed_lifetime() {
        let handler = JwtHandler::new(SECRET).unwrap();
        let issued_at = Utc::now();

        let issued = handler.issue_at(Uuid::new_v4(), issued_at).unwrap();
        assert_eq!(issued.expires_at - issued_at, TOKEN_LIFETIME);
    }

    #[test]
    fn test_empty_secret_refused() {
        assert!(JwtHandler::new("").is_err());
        assert!(JwtHandler::new("   ").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let handler = JwtHandler::new(SECRET).unwrap();
        let issued_at = Utc::now() - Duration::hours(2);

        let issued = handler.issue_at(Uuid::new_v4(), issued_at).unwrap();
        assert_eq!(handler.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_expiring_now_rejected() {
        let handler = JwtHandler::new(SECRET).unwrap();
        let issued_at = Utc::now() - TOKEN_LIFETIME;

        let issued = handler.issue_at(Uuid::new_v4(), issued_at).unwrap();
        assert_eq!(handler.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_different_secrets_reject() {
        let handler1 = JwtHandler::new("secret1").unwrap();
        let handler2 = JwtHandler::new("secret2").unwrap();

        let issued = handler1.issue(Uuid::new_v4()).unwrap();
        assert_eq!(handler2.verify(&issued.token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let handler = JwtHandler::new(SECRET).unwrap();

        assert_eq!(handler.verify(""), Err(TokenError::Malformed));
        assert_eq!(handler.verify("invalid.token.here"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let handler = JwtHandler::new(SECRET).unwrap();
        let victim = handler.issue(Uuid::new_v4()).unwrap();
        let attacker = handler.issue(Uuid::new_v4()).unwrap();

        // Splice the attacker's payload onto the victim's signature.
        let victim_parts: Vec<&str> = victim.token.split('.').collect();
        let attacker_parts: Vec<&str> = attacker.token.split('.').collect();
        let tampered = format!(
            "{}.{}.{}",
            victim_parts[0], attacker_parts[1], victim_parts[2]
        );

        assert_eq!(handler.verify(&tampered), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let handler = JwtHandler::new(SECRET).unwrap();
        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(handler.verify(&token), Err(TokenError::Malformed));
    }
}
