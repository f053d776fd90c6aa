//! Database credential passwords.
//!
//! Same construction as [`PasswordGenerator`] but with a symbol alphabet
//! that needs no escaping inside connection URLs.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PasswordGenerator, PasswordPolicy, SecretGenerator};
use crate::error::Result;

/// URL-unreserved punctuation.
pub const CONNECTION_SAFE_SYMBOLS: &str = "-_.~";

/// Options for database passwords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabasePasswordPolicy {
    pub length: usize,
    pub use_symbols: bool,
}

impl Default for DatabasePasswordPolicy {
    fn default() -> Self {
        Self {
            length: 32,
            use_symbols: true,
        }
    }
}

/// Generates passwords safe to embed in database connection strings.
#[derive(Debug)]
pub struct DatabasePasswordGenerator {
    inner: PasswordGenerator,
}

impl DatabasePasswordGenerator {
    pub fn new(name: impl Into<String>, policy: DatabasePasswordPolicy) -> Result<Self> {
        let policy = PasswordPolicy {
            length: policy.length,
            use_symbols: policy.use_symbols,
            symbols: CONNECTION_SAFE_SYMBOLS.to_string(),
            ..PasswordPolicy::default()
        };
        Ok(Self {
            inner: PasswordGenerator::new(name, policy)?,
        })
    }
}

impl SecretGenerator for DatabasePasswordGenerator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> &'static str {
        "database_password"
    }

    fn generate(&self) -> Result<String> {
        let password = self.inner.sample()?;
        debug!(generator = %self.name(), "generated database password");
        Ok(password)
    }

    fn validate(&self, candidate: &str) -> bool {
        self.inner.check(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_url_reserved_characters() {
        let generator =
            DatabasePasswordGenerator::new("db", DatabasePasswordPolicy::default()).unwrap();
        for _ in 0..50 {
            let password = generator.generate().unwrap();
            assert_eq!(password.len(), 32);
            assert!(!password.contains(|c| "@:/?#&=%'\";".contains(c)));
            assert!(generator.validate(&password));
        }
        assert_eq!(generator.kind(), "database_password");
    }

    #[test]
    fn test_general_symbols_rejected() {
        let generator = DatabasePasswordGenerator::new(
            "db",
            DatabasePasswordPolicy {
                length: 8,
                use_symbols: true,
            },
        )
        .unwrap();
        assert!(generator.validate("aB3-cdef"));
        assert!(!generator.validate("aB3@cdef"));
    }
}
