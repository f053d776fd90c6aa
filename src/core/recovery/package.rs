//! On-disk formats for master key backups.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::core::constants::FORMAT_VERSION;
use crate::core::types::KeyId;
use crate::error::{Error, IntegrityError, Result};

/// Passphrase-protected copy of the master key file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBackupPackage {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Base64 PBKDF2 salt.
    pub salt: String,
    /// PBKDF2 rounds used when the package was written.
    pub iterations: u32,
    /// Base64 sealed key file.
    pub encrypted_key_data: String,
    pub key_id: KeyId,
    /// SHA-256 hex of the sealed bytes.
    pub checksum: String,
}

impl KeyBackupPackage {
    pub(super) fn salt_bytes(&self) -> Result<Vec<u8>> {
        decode("key backup salt", &self.salt)
    }

    pub(super) fn sealed_bytes(&self) -> Result<Vec<u8>> {
        decode("encrypted key data", &self.encrypted_key_data)
    }
}

/// One share of a split master key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareFile {
    pub version: u32,
    pub share_number: u8,
    pub total_shares: u8,
    pub threshold: u8,
    pub created_at: DateTime<Utc>,
    /// Base64 share payload.
    pub share_data: String,
    /// Absent in share files from older releases.
    #[serde(default)]
    pub key_id: Option<KeyId>,
}

impl ShareFile {
    pub(super) fn payload(&self) -> Result<Zeroizing<Vec<u8>>> {
        decode("share data", &self.share_data).map(Zeroizing::new)
    }

    /// Structural checks that need no other share.
    pub(super) fn check(&self) -> Result<()> {
        let malformed = |reason: String| -> Error {
            IntegrityError::Malformed {
                what: "key share",
                reason,
            }
            .into()
        };
        check_version("key share", self.version)?;
        if self.share_number == 0 || self.share_number > self.total_shares {
            return Err(malformed(format!(
                "share number {} outside 1..={}",
                self.share_number, self.total_shares
            )));
        }
        if self.threshold < 2 || self.threshold > self.total_shares {
            return Err(malformed(format!(
                "threshold {} invalid for {} shares",
                self.threshold, self.total_shares
            )));
        }
        if self.payload()?.is_empty() {
            return Err(malformed("empty share data".to_string()));
        }
        Ok(())
    }
}

/// SHA-256 hex digest of `bytes`.
pub(super) fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub(super) fn check_version(what: &'static str, version: u32) -> Result<()> {
    if version == 0 || version > FORMAT_VERSION {
        return Err(IntegrityError::Malformed {
            what,
            reason: format!("unsupported format version {}", version),
        }
        .into());
    }
    Ok(())
}

fn decode(what: &'static str, text: &str) -> Result<Vec<u8>> {
    STANDARD.decode(text.trim()).map_err(|e| {
        IntegrityError::Malformed {
            what,
            reason: format!("invalid base64: {}", e),
        }
        .into()
    })
}

/// Read and parse a JSON backup file.
pub(super) fn read_json<T: DeserializeOwned>(what: &'static str, path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(Error::not_found(what, path));
    }
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        IntegrityError::Malformed {
            what,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Kinds of files found in the key backup directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyBackupKind {
    /// Passphrase-encrypted package.
    Encrypted,
    /// Directory of share files from one split.
    ShareSet,
    /// Snapshot of the key replaced by a restore.
    PreRestore,
    /// Snapshot of the key replaced by a master key rotation.
    PreRotate,
}

impl std::fmt::Display for KeyBackupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Encrypted => "encrypted",
            Self::ShareSet => "shares",
            Self::PreRestore => "pre-restore",
            Self::PreRotate => "pre-rotate",
        };
        f.write_str(label)
    }
}

/// Inventory entry for one backup.
#[derive(Debug, Clone, Serialize)]
pub struct KeyBackupInfo {
    pub kind: KeyBackupKind,
    pub path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
    pub key_id: Option<KeyId>,
    /// `threshold`-of-`total` for share sets.
    pub shares: Option<(u8, u8)>,
}

/// Result of a restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub key_id: KeyId,
    /// `false` for verify-only runs.
    pub installed: bool,
    /// Snapshot of the key that was replaced, if one existed.
    pub pre_restore: Option<PathBuf>,
}

/// Result of verifying a single backup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Package checksum is intact; no passphrase was tried.
    ChecksumValid { key_id: KeyId },
    /// Package decrypts to a key with the recorded id.
    Decrypts { key_id: KeyId },
    /// Share file is well formed.
    ShareValid {
        share_number: u8,
        total_shares: u8,
        threshold: u8,
    },
}
