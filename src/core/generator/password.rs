//! Random passwords built from configurable character classes.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SecretGenerator;
use crate::core::constants::PASSWORD_SYMBOLS;
use crate::error::{GenerationError, Result};

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";

/// Password composition rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub length: usize,
    pub use_lowercase: bool,
    pub use_uppercase: bool,
    pub use_numbers: bool,
    pub use_symbols: bool,
    /// Symbol alphabet used when `use_symbols` is set.
    pub symbols: String,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 16,
            use_lowercase: true,
            use_uppercase: true,
            use_numbers: true,
            use_symbols: true,
            symbols: PASSWORD_SYMBOLS.to_string(),
        }
    }
}

impl PasswordPolicy {
    /// Enabled character classes.
    fn classes(&self) -> Vec<Vec<char>> {
        let mut classes = Vec::new();
        if self.use_lowercase {
            classes.push(LOWERCASE.chars().collect());
        }
        if self.use_uppercase {
            classes.push(UPPERCASE.chars().collect());
        }
        if self.use_numbers {
            classes.push(DIGITS.chars().collect());
        }
        if self.use_symbols && !self.symbols.is_empty() {
            classes.push(self.symbols.chars().collect());
        }
        classes
    }

    /// Check the policy can produce at least one password.
    pub fn check(&self) -> Result<()> {
        let classes = self.classes().len();
        if classes == 0 {
            return Err(GenerationError::InvalidPolicy(
                "no character classes enabled".to_string(),
            )
            .into());
        }
        if self.length < classes {
            return Err(GenerationError::InvalidPolicy(format!(
                "length {} cannot cover {} character classes",
                self.length, classes
            ))
            .into());
        }
        Ok(())
    }
}

/// Generates passwords that contain every enabled character class.
#[derive(Debug)]
pub struct PasswordGenerator {
    name: String,
    policy: PasswordPolicy,
    classes: Vec<Vec<char>>,
}

impl PasswordGenerator {
    /// Build a generator, rejecting policies that cannot be satisfied.
    pub fn new(name: impl Into<String>, policy: PasswordPolicy) -> Result<Self> {
        policy.check()?;
        let classes = policy.classes();
        Ok(Self {
            name: name.into(),
            policy,
            classes,
        })
    }

    /// Active policy.
    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    pub(super) fn sample(&self) -> Result<String> {
        let mut rng = OsRng;

        // one from each class, the rest from the union
        let mut chars: Vec<char> = self
            .classes
            .iter()
            .map(|class| class.choose(&mut rng).copied())
            .collect::<Option<_>>()
            .ok_or(GenerationError::Random)?;

        let pool: Vec<char> = self.classes.concat();
        while chars.len() < self.policy.length {
            chars.push(*pool.choose(&mut rng).ok_or(GenerationError::Random)?);
        }
        chars.shuffle(&mut rng);

        Ok(chars.into_iter().collect())
    }

    pub(super) fn check(&self, candidate: &str) -> bool {
        if candidate.chars().count() < self.policy.length {
            return false;
        }
        let allowed: Vec<char> = self.classes.concat();
        candidate.chars().all(|c| allowed.contains(&c))
            && self
                .classes
                .iter()
                .all(|class| candidate.chars().any(|c| class.contains(&c)))
    }
}

impl SecretGenerator for PasswordGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "password"
    }

    fn generate(&self) -> Result<String> {
        let password = self.sample()?;
        debug!(generator = %self.name, length = self.policy.length, "generated password");
        Ok(password)
    }

    fn validate(&self, candidate: &str) -> bool {
        self.check(candidate)
    }
}
