//! Authentication Module
//! Mission: Register accounts, authenticate logins and gate API access with JWT tokens

pub mod account_store;
pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use account_store::{AccountStore, MemoryAccountStore, SqliteAccountStore, StoreError};
pub use api::AuthState;
pub use jwt::{JwtHandler, TOKEN_LIFETIME};
pub use middleware::{auth_middleware, AuthenticatedAccount};
pub use password::PasswordHasher;
pub use service::AuthService;
