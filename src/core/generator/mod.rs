//! Secret generation.
//!
//! A generator produces candidate secret values and validates them against
//! its own policy. The orchestrator never writes a candidate that fails
//! [`SecretGenerator::validate`].

mod api_key;
mod database;
mod password;
mod signing;

pub use api_key::{ApiKeyGenerator, ApiKeyPolicy};
pub use database::{DatabasePasswordGenerator, DatabasePasswordPolicy, CONNECTION_SAFE_SYMBOLS};
pub use password::{PasswordGenerator, PasswordPolicy};
pub use signing::{KeyEncoding, SigningKeyGenerator, SigningKeyPolicy};

use crate::error::Result;

/// Produces and validates candidate secret values.
pub trait SecretGenerator: Send + Sync {
    /// Name the generator is registered under.
    fn name(&self) -> &str;

    /// Kind of secret produced (`password`, `api_key`, ...).
    fn kind(&self) -> &'static str;

    /// Produce a fresh candidate.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` if no candidate can be produced.
    fn generate(&self) -> Result<String>;

    /// Check a candidate against this generator's policy.
    fn validate(&self, candidate: &str) -> bool;
}
