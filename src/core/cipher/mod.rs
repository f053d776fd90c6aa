//! Symmetric encryption of secrets at rest.
//!
//! [`CipherService`] owns the master key lifecycle: load or generate on
//! open, integrity check of the key id, rotation, and age checks.
//!
//! ## Concurrency
//!
//! The active cipher sits behind `RwLock<Arc<MasterCipher>>`. Encrypt and
//! decrypt clone the `Arc` and drop the lock before doing any work, so a
//! rotation swaps the handle atomically and no caller sees a torn key.
//! Rotations themselves serialize on a separate mutex.

mod aead;
mod kdf;
mod key;
pub mod mask;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use tracing::{debug, info, warn};

pub use aead::MasterCipher;
pub(crate) use aead::{open, seal};
pub use kdf::{derive_key, derive_with, random_bytes, DerivedKey};
pub use key::{compute_key_id, KeyFormat, KeyMetadata, MasterKey};
pub use mask::{hash_for_comparison, mask_identifier, mask_secret};

use crate::core::types::CipherToken;
use crate::error::Result;

/// Master-key encryption service.
pub struct CipherService {
    key_file: PathBuf,
    active: RwLock<Arc<MasterCipher>>,
    rotation: Mutex<()>,
}

impl std::fmt::Debug for CipherService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherService")
            .field("key_file", &self.key_file)
            .field("key_id", &self.current().key_id())
            .finish()
    }
}

impl CipherService {
    /// Open the service, loading `key_file` or generating a new key.
    ///
    /// Legacy key files are upgraded in memory only.
    ///
    /// # Errors
    ///
    /// Returns `IntegrityError::KeyIdMismatch` if the file's metadata does
    /// not match its key bytes. Callers must treat this as fatal.
    pub fn open(key_file: impl AsRef<Path>) -> Result<Self> {
        let key_file = key_file.as_ref().to_path_buf();

        let key = if key_file.exists() {
            let (key, format) = MasterKey::load(&key_file)?;
            match format {
                KeyFormat::Current => info!(key_id = %key.key_id(), "loaded master key"),
                KeyFormat::Legacy => warn!(
                    key_id = %key.key_id(),
                    "loaded legacy master key without metadata; upgraded in memory only"
                ),
            }
            key
        } else {
            let key = MasterKey::generate()?;
            key.save(&key_file)?;
            warn!(
                path = %key_file.display(),
                "master key generated. BACK UP THIS FILE: it cannot be recovered if lost"
            );
            key
        };

        Ok(Self {
            key_file,
            active: RwLock::new(Arc::new(MasterCipher::new(key))),
            rotation: Mutex::new(()),
        })
    }

    /// Path of the master key file.
    pub fn key_file(&self) -> &Path {
        &self.key_file
    }

    /// Snapshot of the active cipher.
    pub fn current(&self) -> Arc<MasterCipher> {
        let guard = self.active.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Metadata of the active key.
    pub fn metadata(&self) -> KeyMetadata {
        self.current().metadata().clone()
    }

    /// Encrypt a string. Empty input maps to an empty token.
    pub fn encrypt(&self, plaintext: &str) -> Result<CipherToken> {
        self.current().encrypt(plaintext)
    }

    /// Decrypt a token. Empty input maps to an empty string.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::DecryptionFailed` for malformed tokens or
    /// tokens sealed under a different key.
    pub fn decrypt(&self, token: &str) -> Result<String> {
        self.current().decrypt(token)
    }

    /// Encrypt raw bytes.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.current().encrypt_bytes(plaintext)
    }

    /// Decrypt raw bytes.
    pub fn decrypt_bytes(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.current().decrypt_bytes(ciphertext)
    }

    /// Install a new master key and return the previous cipher.
    ///
    /// Generates a key when `new_key` is `None`. The new key is persisted
    /// before it becomes active. Re-encrypting existing ciphertexts with the
    /// returned cipher is the caller's job.
    pub fn rotate(&self, new_key: Option<MasterKey>) -> Result<Arc<MasterCipher>> {
        let _rotation = self.rotation.lock().unwrap_or_else(|e| e.into_inner());

        let old = self.current();
        let next_version = old.metadata().version.saturating_add(1);
        let key = match new_key {
            Some(key) => key,
            None => MasterKey::generate()?,
        }
        .with_version(next_version);

        key.save(&self.key_file)?;

        let new_id = key.key_id().to_string();
        {
            let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
            *active = Arc::new(MasterCipher::new(key));
        }

        info!(
            old_key_id = %old.key_id(),
            new_key_id = %new_id,
            version = next_version,
            "master key rotated"
        );
        Ok(old)
    }

    /// Whether the active key is older than `max_age_days`.
    ///
    /// Keys without a creation time always report `true`.
    pub fn should_rotate(&self, max_age_days: i64) -> bool {
        match self.metadata().created_at {
            Some(created_at) => {
                let age = Utc::now().signed_duration_since(created_at);
                let due = age.num_days() >= max_age_days;
                debug!(age_days = age.num_days(), max_age_days, due, "key age check");
                due
            }
            None => {
                debug!("master key has no creation time; recommending rotation");
                true
            }
        }
    }

    /// Derive a key from a passphrase with the fixed default iteration count.
    ///
    /// Returns the key and the salt used (random when `salt` is `None`).
    pub fn derive_key(passphrase: &str, salt: Option<&[u8]>) -> Result<(DerivedKey, Vec<u8>)> {
        kdf::derive_key(passphrase, salt)
    }
}

/// Decrypt a token with `old` and re-encrypt it under the service's key.
pub fn reencrypt_token(
    old: &MasterCipher,
    service: &CipherService,
    token: &str,
) -> Result<CipherToken> {
    let plaintext = zeroize::Zeroizing::new(old.decrypt(token)?);
    service.encrypt(&plaintext)
}

/// Convenience for opening a service only when encryption is enabled.
pub fn open_if(enabled: bool, key_file: &Path) -> Result<Option<Arc<CipherService>>> {
    if !enabled {
        return Ok(None);
    }
    CipherService::open(key_file).map(|service| Some(Arc::new(service)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, IntegrityError};
    use std::fs;
    use tempfile::TempDir;

    fn service() -> (TempDir, CipherService) {
        let tmp = TempDir::new().unwrap();
        let service = CipherService::open(tmp.path().join(".master.key")).unwrap();
        (tmp, service)
    }

    #[test]
    fn test_open_generates_then_reloads() {
        let (tmp, service) = service();
        let token = service.encrypt("value").unwrap();
        let key_id = service.current().key_id().to_string();
        drop(service);

        let reopened = CipherService::open(tmp.path().join(".master.key")).unwrap();
        assert_eq!(reopened.current().key_id(), key_id);
        assert_eq!(reopened.decrypt(&token).unwrap(), "value");
    }

    #[test]
    fn test_open_rejects_key_id_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".master.key");
        let key = MasterKey::generate().unwrap();
        let json = key.to_json().unwrap().replace(key.key_id(), "ffffffffffffffff");
        fs::write(&path, json).unwrap();

        let err = CipherService::open(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::KeyIdMismatch { .. })
        ));
    }

    #[test]
    fn test_legacy_file_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".master.key");
        fs::write(&path, [0xeeu8; 32]).unwrap();

        let service = CipherService::open(&path).unwrap();
        assert!(service.metadata().created_at.is_none());
        assert_eq!(fs::read(&path).unwrap(), vec![0xeeu8; 32]);
    }

    #[test]
    fn test_rotate_returns_old_cipher() {
        let (_tmp, service) = service();
        let token = service.encrypt("before").unwrap();
        let old_version = service.metadata().version;

        let old = service.rotate(None).unwrap();

        assert_ne!(old.key_id(), service.current().key_id());
        assert_eq!(service.metadata().version, old_version + 1);
        assert_eq!(old.decrypt(&token).unwrap(), "before");
        assert!(service.decrypt(&token).is_err());

        let migrated = reencrypt_token(&old, &service, &token).unwrap();
        assert_eq!(service.decrypt(&migrated).unwrap(), "before");
    }

    #[test]
    fn test_rotate_with_supplied_key_persists() {
        let (tmp, service) = service();
        let key = MasterKey::from_bytes(&[5u8; 32]).unwrap();
        let expected = key.key_id().to_string();

        service.rotate(Some(key)).unwrap();

        let reopened = CipherService::open(tmp.path().join(".master.key")).unwrap();
        assert_eq!(reopened.current().key_id(), expected);
        assert_eq!(reopened.metadata().version, 2);
    }

    #[test]
    fn test_should_rotate() {
        let (_tmp, service) = service();
        assert!(!service.should_rotate(90));
        assert!(service.should_rotate(0));
    }

    #[test]
    fn test_should_rotate_without_timestamp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".master.key");
        fs::write(&path, [0x11u8; 32]).unwrap();

        let service = CipherService::open(&path).unwrap();
        assert!(service.should_rotate(10_000));
    }

    #[test]
    fn test_concurrent_encrypt_during_rotation() {
        let (_tmp, service) = service();
        let service = Arc::new(service);

        let workers: Vec<_> = (0..4)
            .map(|i| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        let cipher = service.current();
                        let value = format!("{}-{}", i, n);
                        let token = cipher.encrypt(&value).unwrap();
                        assert_eq!(cipher.decrypt(&token).unwrap(), value);
                    }
                })
            })
            .collect();

        for _ in 0..5 {
            service.rotate(None).unwrap();
        }
        for worker in workers {
            worker.join().unwrap();
        }
    }
}
