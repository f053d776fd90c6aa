//! Random symmetric signing keys, base64 or hex encoded.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::SecretGenerator;
use crate::error::{GenerationError, Result};

/// Shortest key accepted, in bytes.
const MIN_KEY_BYTES: usize = 16;

/// Text form of generated key bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEncoding {
    #[default]
    Base64,
    Hex,
}

impl KeyEncoding {
    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Base64 => STANDARD.encode(bytes),
            Self::Hex => hex::encode(bytes),
        }
    }

    fn decode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Self::Base64 => STANDARD.decode(text).ok(),
            Self::Hex => hex::decode(text).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningKeyPolicy {
    /// Key size in bytes.
    pub bytes: usize,
    pub encoding: KeyEncoding,
}

impl Default for SigningKeyPolicy {
    fn default() -> Self {
        Self {
            bytes: 32,
            encoding: KeyEncoding::Base64,
        }
    }
}

/// Generates HMAC-style signing keys.
#[derive(Debug)]
pub struct SigningKeyGenerator {
    name: String,
    policy: SigningKeyPolicy,
}

impl SigningKeyGenerator {
    pub fn new(name: impl Into<String>, policy: SigningKeyPolicy) -> Result<Self> {
        if policy.bytes < MIN_KEY_BYTES {
            return Err(GenerationError::InvalidPolicy(format!(
                "signing keys need at least {} bytes",
                MIN_KEY_BYTES
            ))
            .into());
        }
        Ok(Self {
            name: name.into(),
            policy,
        })
    }
}

impl SecretGenerator for SigningKeyGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "signing_key"
    }

    fn generate(&self) -> Result<String> {
        let mut bytes = Zeroizing::new(vec![0u8; self.policy.bytes]);
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| GenerationError::Random)?;
        debug!(generator = %self.name, bytes = self.policy.bytes, "generated signing key");
        Ok(self.policy.encoding.encode(&bytes))
    }

    fn validate(&self, candidate: &str) -> bool {
        self.policy
            .encoding
            .decode(candidate)
            .is_some_and(|bytes| bytes.len() == self.policy.bytes)
    }
}
