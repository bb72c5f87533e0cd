//! Authentication Models
//! Mission: Define account records and the wire shapes of the auth API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored account record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub handle: String,
    pub address: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt digest - never serialize
    pub created_at: DateTime<Utc>,
}

/// Account fields ready for insertion. The digest must come from the hasher.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub handle: String,
    pub address: String,
    pub password_hash: String,
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (account id)
    pub iat: i64,
    pub exp: i64, // expiration timestamp
}

/// Register request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(alias = "username")]
    pub handle: String,
    #[serde(alias = "email")]
    pub address: String,
    #[serde(alias = "password")]
    pub plaintext: String,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub address: String,
    #[serde(alias = "password")]
    pub plaintext: String,
}

/// Returned by both register and login
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub account_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Account response (sanitized)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub account_id: Uuid,
    pub handle: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl AccountResponse {
    pub fn from_account(account: &Account) -> Self {
        Self {
            account_id: account.id,
            handle: account.handle.clone(),
            address: account.address.clone(),
            created_at: account.created_at,
        }
    }
}

/// Token-only view of the caller
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub account_id: Uuid,
}

/// Error body shared by every rejection
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Normalize a contact address for lookup and storage.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}
