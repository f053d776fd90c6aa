//! JSON file store.
//!
//! The file is a flat `{secret_id: value}` object. With a cipher attached,
//! values are base64 ciphertext tokens; otherwise they are plaintext.
//!
//! Writes and [`FileStore::reencrypt`] share one lock, and `set` encrypts
//! while holding it. A master key rotation must still not run while other
//! processes write the file: `CipherService::rotate` followed by
//! `reencrypt` is only safe when this store is the sole writer.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use super::SecretStore;
use crate::core::cipher::{reencrypt_token, CipherService, MasterCipher};
use crate::core::fs as private_fs;
use crate::error::{Result, StoreError};

type SecretMap = BTreeMap<String, String>;

/// Secret store backed by a single JSON file.
pub struct FileStore {
    name: String,
    path: PathBuf,
    cipher: Option<Arc<CipherService>>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("encrypted", &self.cipher.is_some())
            .finish()
    }
}

impl FileStore {
    /// Store plaintext values in `path`.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            cipher: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Encrypt values at rest with `cipher`.
    pub fn with_cipher(mut self, cipher: Arc<CipherService>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether values are stored as ciphertext.
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    fn read_failed(&self, reason: impl std::fmt::Display) -> StoreError {
        StoreError::ReadFailed {
            store: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_failed(&self, reason: impl std::fmt::Display) -> StoreError {
        StoreError::WriteFailed {
            store: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn load(&self) -> Result<SecretMap> {
        if !self.path.exists() {
            return Ok(SecretMap::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.read_failed(e))?;
        if contents.trim().is_empty() {
            return Ok(SecretMap::new());
        }
        let map = serde_json::from_str(&contents).map_err(|e| self.read_failed(e))?;
        Ok(map)
    }

    fn persist(&self, map: &SecretMap) -> Result<()> {
        let json = serde_json::to_string_pretty(map).map_err(|e| self.write_failed(e))?;
        private_fs::write_private(&self.path, json.as_bytes())
            .map_err(|e| self.write_failed(e))?;
        Ok(())
    }

    /// All secret ids currently in the file.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Re-encrypt every value from `old` to the service's current key.
    ///
    /// Values already sealed under the current key are kept as they are.
    /// Nothing is written unless every value converts. Returns the number
    /// of values migrated. A no-op for plaintext stores.
    pub fn reencrypt(&self, old: &MasterCipher) -> Result<usize> {
        let Some(cipher) = &self.cipher else {
            return Ok(0);
        };

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.load()?;
        let mut migrated = 0;
        for (secret_id, token) in map.iter_mut() {
            match reencrypt_token(old, cipher, token) {
                Ok(fresh) => {
                    *token = fresh;
                    migrated += 1;
                }
                Err(_) if cipher.decrypt(token).is_ok() => {
                    debug!(store = %self.name, secret_id = %secret_id, "already under current key");
                }
                Err(e) => return Err(e),
            }
        }
        self.persist(&map)?;

        info!(store = %self.name, count = migrated, "store re-encrypted");
        Ok(migrated)
    }
}

impl SecretStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, secret_id: &str) -> Result<Option<String>> {
        let map = self.load()?;
        let Some(stored) = map.get(secret_id) else {
            debug!(store = %self.name, secret_id, "secret not present");
            return Ok(None);
        };

        match &self.cipher {
            Some(cipher) => Ok(Some(cipher.decrypt(stored)?)),
            None => Ok(Some(stored.clone())),
        }
    }

    fn set(&self, secret_id: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let stored = match &self.cipher {
            Some(cipher) => cipher.encrypt(value)?,
            None => value.to_string(),
        };
        let mut map = self.load()?;
        map.insert(secret_id.to_string(), stored);
        self.persist(&map)?;

        debug!(store = %self.name, secret_id, "secret written");
        Ok(())
    }

    fn validate_connection(&self) -> bool {
        if self.path.exists() {
            return self.load().is_ok();
        }
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.is_dir(),
            _ => true,
        }
    }
}
