//! Prefixed alphanumeric API keys.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SecretGenerator;
use crate::error::{GenerationError, Result};

/// API key shape: `{prefix}{length random alphanumerics}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeyPolicy {
    pub prefix: String,
    pub length: usize,
}

impl Default for ApiKeyPolicy {
    fn default() -> Self {
        Self {
            prefix: "sk_".to_string(),
            length: 32,
        }
    }
}

#[derive(Debug)]
pub struct ApiKeyGenerator {
    name: String,
    policy: ApiKeyPolicy,
}

impl ApiKeyGenerator {
    pub fn new(name: impl Into<String>, policy: ApiKeyPolicy) -> Result<Self> {
        if policy.length == 0 {
            return Err(
                GenerationError::InvalidPolicy("api key length must be positive".into()).into(),
            );
        }
        Ok(Self {
            name: name.into(),
            policy,
        })
    }
}

impl SecretGenerator for ApiKeyGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "api_key"
    }

    fn generate(&self) -> Result<String> {
        let body: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(self.policy.length)
            .map(char::from)
            .collect();
        debug!(generator = %self.name, "generated api key");
        Ok(format!("{}{}", self.policy.prefix, body))
    }

    fn validate(&self, candidate: &str) -> bool {
        candidate
            .strip_prefix(&self.policy.prefix)
            .is_some_and(|body| {
                body.len() == self.policy.length && body.chars().all(|c| c.is_ascii_alphanumeric())
            })
    }
}
