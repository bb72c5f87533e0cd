//! Password Hashing
//! Mission: Salted one-way digests with a fixed bcrypt work factor

use anyhow::{bail, Context, Result};
use tracing::debug;

pub use bcrypt::DEFAULT_COST;

/// Lowest and highest work factors bcrypt accepts.
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// bcrypt only reads the first 72 bytes of its input. Anything longer is
/// refused so two passwords sharing a 72-byte prefix never collide.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// True when bcrypt would see every byte of `plaintext`
pub fn fits_bcrypt(plaintext: &str) -> bool {
    plaintext.len() <= MAX_PASSWORD_BYTES
}

/// bcrypt hasher with a cost chosen once at startup
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            bail!("bcrypt cost must be between {MIN_COST} and {MAX_COST}, got {cost}");
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password. Every call draws a fresh salt.
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        if !fits_bcrypt(plaintext) {
            bail!("password exceeds {MAX_PASSWORD_BYTES} bytes");
        }
        let digest = bcrypt::hash(plaintext, self.cost).context("Failed to hash password")?;
        debug!("Hashed password with cost {}", self.cost);
        Ok(digest)
    }

    /// Check a plaintext against a stored digest. Malformed digests and
    /// over-long plaintexts never match.
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        fits_bcrypt(plaintext) && bcrypt::verify(plaintext, digest).unwrap_or(false)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}
