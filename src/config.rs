//! Process configuration, read once at startup.
//!
//! Every value can come from a flag or the environment. `.env` files are
//! loaded once by the binary through [`load_env`] before anything else.
//! A blank `JWT_SECRET` or an out-of-range `BCRYPT_COST` is a fatal startup
//! error.

use crate::auth::password::{DEFAULT_COST, MAX_COST, MIN_COST};
use anyhow::{bail, Result};
use clap::Parser;
use std::path::Path;

#[derive(Parser, Clone)]
#[command(name = "passgate")]
#[command(about = "Account registration, login and bearer-token gated API")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// SQLite database path
    #[arg(long, env = "DATABASE_URL", default_value = "passgate.db")]
    pub database_url: String,

    /// Keep accounts in memory only (nothing persisted)
    #[arg(long, env = "IN_MEMORY", default_value_t = false)]
    pub in_memory: bool,

    /// HS256 signing secret for issued tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// bcrypt work factor
    #[arg(long, env = "BCRYPT_COST", default_value_t = DEFAULT_COST)]
    pub bcrypt_cost: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("in_memory", &self.in_memory)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl Config {
    /// Parse process flags and environment, then validate.
    /// Call [`load_env`] first; this does not read `.env` files.
    pub fn load() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.signing_secret().is_none() {
            bail!("JWT_SECRET is not set; refusing to start without a signing secret");
        }
        if !(MIN_COST..=MAX_COST).contains(&self.bcrypt_cost) {
            bail!(
                "BCRYPT_COST must be between {MIN_COST} and {MAX_COST}, got {}",
                self.bcrypt_cost
            );
        }
        Ok(())
    }

    /// The signing secret, if set and not blank
    pub fn signing_secret(&self) -> Option<&str> {
        self.jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}

/// Load `.env` files into the process environment. Existing variables win.
pub fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv::dotenv();

    // 2) Also try the crate root .env when running from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
