//! Master key material and its on-disk format.
//!
//! Current files are JSON `{key, metadata}`. Legacy files hold only the key
//! (base64 text or 32 raw bytes); they load with synthesized metadata and
//! are never rewritten implicitly.

use std::fs;
use std::path::Path;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine as _,
};
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::constants::{ALGORITHM, FORMAT_VERSION, KEY_LEN};
use crate::core::fs as private_fs;
use crate::core::types::KeyId;
use crate::error::{CipherError, Error, IntegrityError, Result};

/// Metadata stored next to the key bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetadata {
    /// Monotonic key generation, bumped on every rotation.
    pub version: u32,
    /// Creation time; `None` for upgraded legacy keys.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Symmetric algorithm the key is used with.
    pub algorithm: String,
    /// Truncated SHA-256 of the key bytes.
    pub key_id: KeyId,
}

/// Which on-disk format a key was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    /// `{key, metadata}` JSON.
    Current,
    /// Raw key without metadata.
    Legacy,
}

#[derive(Serialize, Deserialize)]
struct KeyFile {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<KeyMetadata>,
}

/// Compute the key id: first 16 hex chars of SHA-256 over the key bytes.
pub fn compute_key_id(bytes: &[u8]) -> KeyId {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)[..16].to_string()
}

/// A symmetric master key with its metadata.
#[derive(Clone)]
pub struct MasterKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
    metadata: KeyMetadata,
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl MasterKey {
    /// Generate a fresh random key (version 1, created now).
    pub fn generate() -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        SystemRandom::new()
            .fill(&mut bytes[..])
            .map_err(|_| CipherError::InvalidKey("random source failure".to_string()))?;
        Ok(Self::with_metadata(bytes, FORMAT_VERSION, Some(Utc::now())))
    }

    /// Build a key from caller-supplied bytes (version 1, created now).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::with_metadata(
            to_array(bytes)?,
            FORMAT_VERSION,
            Some(Utc::now()),
        ))
    }

    fn with_metadata(
        bytes: Zeroizing<[u8; KEY_LEN]>,
        version: u32,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        let key_id = compute_key_id(&bytes[..]);
        Self {
            bytes,
            metadata: KeyMetadata {
                version,
                created_at,
                algorithm: ALGORITHM.to_string(),
                key_id,
            },
        }
    }

    /// Same key bytes with a different version number.
    pub(crate) fn with_version(mut self, version: u32) -> Self {
        self.metadata.version = version;
        self
    }

    /// Key id (hash of the key bytes).
    pub fn key_id(&self) -> &str {
        &self.metadata.key_id
    }

    /// Key metadata.
    pub fn metadata(&self) -> &KeyMetadata {
        &self.metadata
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    /// Serialize into the current `{key, metadata}` JSON form.
    pub fn to_json(&self) -> Result<Zeroizing<String>> {
        let file = KeyFile {
            key: STANDARD.encode(self.as_bytes()),
            metadata: Some(self.metadata.clone()),
        };
        let json = Zeroizing::new(serde_json::to_string_pretty(&file)?);
        Ok(json)
    }

    /// Parse key file contents in either format.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::KeyIdMismatch` when embedded metadata does
    /// not match the key bytes, and `CipherError::InvalidKey` when the
    /// contents are not a recognizable key.
    pub fn parse(contents: &[u8]) -> Result<(Self, KeyFormat)> {
        if let Ok(file) = serde_json::from_slice::<KeyFile>(contents) {
            let decoded = Zeroizing::new(
                STANDARD
                    .decode(file.key.trim())
                    .map_err(|e| CipherError::InvalidKey(format!("invalid base64: {}", e)))?,
            );
            let bytes = to_array(&decoded)?;

            return match file.metadata {
                Some(metadata) => {
                    let actual = compute_key_id(&bytes[..]);
                    if metadata.key_id != actual {
                        return Err(IntegrityError::KeyIdMismatch {
                            expected: metadata.key_id,
                            actual,
                        }
                        .into());
                    }
                    Ok((Self { bytes, metadata }, KeyFormat::Current))
                }
                None => Ok((Self::legacy(bytes), KeyFormat::Legacy)),
            };
        }

        let decoded = std::str::from_utf8(contents)
            .ok()
            .map(str::trim)
            .and_then(|text| {
                URL_SAFE
                    .decode(text)
                    .ok()
                    .or_else(|| STANDARD.decode(text).ok())
            })
            .filter(|bytes| bytes.len() == KEY_LEN)
            .map(Zeroizing::new);

        let bytes = match decoded {
            Some(bytes) => to_array(&bytes)?,
            None if contents.len() == KEY_LEN => to_array(contents)?,
            None => {
                return Err(CipherError::InvalidKey(
                    "unrecognized master key file format".to_string(),
                )
                .into())
            }
        };

        Ok((Self::legacy(bytes), KeyFormat::Legacy))
    }

    fn legacy(bytes: Zeroizing<[u8; KEY_LEN]>) -> Self {
        Self::with_metadata(bytes, FORMAT_VERSION, None)
    }

    /// Load a key file from disk.
    pub fn load(path: &Path) -> Result<(Self, KeyFormat)> {
        debug!(path = %path.display(), "loading master key");
        if !path.exists() {
            return Err(Error::not_found("master key", path));
        }
        private_fs::check_private(path);

        let contents = Zeroizing::new(fs::read(path)?);
        Self::parse(&contents)
    }

    /// Write the key to disk in the current format, owner-only.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        private_fs::write_private(path, json.as_bytes())?;
        debug!(path = %path.display(), key_id = %self.key_id(), "master key saved");
        Ok(())
    }
}

fn to_array(bytes: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if bytes.len() != KEY_LEN {
        return Err(CipherError::InvalidKey(format!(
            "expected {} bytes, got {}",
            KEY_LEN,
            bytes.len()
        ))
        .into());
    }
    let mut array = Zeroizing::new([0u8; KEY_LEN]);
    array.copy_from_slice(bytes);
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_key_id_is_hash_of_bytes() {
        let key = MasterKey::from_bytes(&[7u8; KEY_LEN]).unwrap();
        assert_eq!(key.key_id(), compute_key_id(&[7u8; KEY_LEN]));
        assert_eq!(key.key_id().len(), 16);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".master.key");

        let key = MasterKey::generate().unwrap();
        key.save(&path).unwrap();

        let (loaded, format) = MasterKey::load(&path).unwrap();
        assert_eq!(format, KeyFormat::Current);
        assert_eq!(loaded.as_bytes(), key.as_bytes());
        assert_eq!(loaded.metadata(), key.metadata());
    }

    #[test]
    fn test_key_id_mismatch_is_integrity_error() {
        let key = MasterKey::generate().unwrap();
        let json = key.to_json().unwrap();
        let tampered = json.replace(key.key_id(), "0000000000000000");

        let err = MasterKey::parse(tampered.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::KeyIdMismatch { .. })
        ));
    }

    #[test]
    fn test_legacy_base64_text() {
        let raw = [3u8; KEY_LEN];
        let text = URL_SAFE.encode(raw);

        let (key, format) = MasterKey::parse(text.as_bytes()).unwrap();
        assert_eq!(format, KeyFormat::Legacy);
        assert_eq!(key.as_bytes(), &raw);
        assert!(key.metadata().created_at.is_none());
        assert_eq!(key.key_id(), compute_key_id(&raw));
    }

    #[test]
    fn test_legacy_raw_bytes() {
        // 0xff is never valid UTF-8, so this cannot be read as text
        let raw = [0xffu8; KEY_LEN];
        let (key, format) = MasterKey::parse(&raw).unwrap();
        assert_eq!(format, KeyFormat::Legacy);
        assert_eq!(key.as_bytes(), &raw);
    }

    #[test]
    fn test_json_without_metadata_is_legacy() {
        let json = format!(r#"{{"key": "{}"}}"#, STANDARD.encode([9u8; KEY_LEN]));
        let (_, format) = MasterKey::parse(json.as_bytes()).unwrap();
        assert_eq!(format, KeyFormat::Legacy);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(MasterKey::parse(b"definitely not a key").is_err());
        assert!(MasterKey::from_bytes(&[1u8; 16]).is_err());
    }

    #[test]
    fn test_debug_redacts_bytes() {
        let key = MasterKey::from_bytes(&[0x41u8; KEY_LEN]).unwrap();
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("65, 65"));
    }
}
