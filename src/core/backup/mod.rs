//! Durable ledger of rotated secret values.
//!
//! Every successful rotation appends one JSON file holding the old and new
//! value. Files are never modified after creation, except when values are
//! re-encrypted under a new master key, and are removed only by
//! [`BackupLedger::cleanup`].
//!
//! ## Ordering
//!
//! Records are named `{secret_id}_{timestamp}.json` where the timestamp has
//! nanosecond resolution. The ledger never hands out the same instant twice
//! for one secret, and files are created exclusively, so rapid rotations of
//! the same id always produce distinct, correctly ordered records.

mod record;

pub use record::{
    format_timestamp, BackupEntry, BackupRecord, BackupSummary, REQUIRED_FIELDS, TIMESTAMP_FORMAT,
};

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::core::cipher::{
    hash_for_comparison, mask_secret, reencrypt_token, CipherService, MasterCipher,
};
use crate::core::fs as private_fs;
use crate::error::{CipherError, Error, IntegrityError, Result};

/// Characters of a value left visible in display listings.
const DISPLAY_VISIBLE: usize = 4;

/// Attempts to find a free file name before giving up.
const MAX_NAME_ATTEMPTS: u32 = 1_000;

/// File-per-record backup store.
pub struct BackupLedger {
    dir: PathBuf,
    cipher: Option<Arc<CipherService>>,
    last_issued: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl std::fmt::Debug for BackupLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupLedger")
            .field("dir", &self.dir)
            .field("encrypted", &self.cipher.is_some())
            .finish()
    }
}

impl BackupLedger {
    /// Open (creating if needed) a ledger in `dir`.
    ///
    /// With a cipher attached, new records store ciphertext.
    pub fn open(dir: impl Into<PathBuf>, cipher: Option<Arc<CipherService>>) -> Result<Self> {
        let dir = dir.into();
        private_fs::create_private_dir(&dir)?;
        debug!(dir = %dir.display(), encrypted = cipher.is_some(), "backup ledger opened");
        Ok(Self {
            dir,
            cipher,
            last_issued: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether new records are encrypted.
    pub fn encryption_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Next creation instant for `secret_id`, strictly after the last one issued.
    fn next_instant(&self, secret_id: &str) -> DateTime<Utc> {
        let mut issued = self.last_issued.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let at = match issued.get(secret_id) {
            Some(last) if now <= *last => *last + Duration::nanoseconds(1),
            _ => now,
        };
        issued.insert(secret_id.to_string(), at);
        at
    }

    fn bump(&self, secret_id: &str, at: DateTime<Utc>) -> DateTime<Utc> {
        let next = at + Duration::nanoseconds(1);
        let mut issued = self.last_issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.insert(secret_id.to_string(), next);
        next
    }

    /// Persist one rotation's (old, new) pair.
    ///
    /// Returns the record handle (its file path).
    pub fn record(&self, secret_id: &str, old_value: &str, new_value: &str) -> Result<PathBuf> {
        let (old_value, new_value, encrypted) = match &self.cipher {
            Some(cipher) => (cipher.encrypt(old_value)?, cipher.encrypt(new_value)?, true),
            None => (old_value.to_string(), new_value.to_string(), false),
        };

        let mut at = self.next_instant(secret_id);
        for _ in 0..MAX_NAME_ATTEMPTS {
            let timestamp = format_timestamp(&at);
            let path = self
                .dir
                .join(format!("{}_{}.json", file_stem(secret_id), timestamp));

            let record = BackupRecord {
                secret_id: secret_id.to_string(),
                timestamp,
                old_value: old_value.clone(),
                new_value: new_value.clone(),
                backup_created: at,
                encrypted,
                path: PathBuf::new(),
            };

            match private_fs::create_private(&path) {
                Ok(mut file) => {
                    let json = serde_json::to_vec_pretty(&record)?;
                    if let Err(e) = file.write_all(&json).and_then(|()| file.sync_all()) {
                        let _ = fs::remove_file(&path);
                        return Err(e.into());
                    }
                    info!(secret_id, path = %path.display(), encrypted, "backup recorded");
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(secret_id, "backup name taken, bumping timestamp");
                    at = self.bump(secret_id, at);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free backup file name for {}", secret_id),
        )
        .into())
    }

    /// Read one record, decrypting its values when asked.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing file, `IntegrityError::Malformed`
    /// when required fields are missing, and `CipherError` when decryption
    /// fails or no cipher is configured.
    pub fn read(&self, handle: &Path, decrypt: bool) -> Result<BackupRecord> {
        if !handle.exists() {
            return Err(Error::not_found("backup record", handle));
        }
        let contents = fs::read_to_string(handle)?;
        let mut record: BackupRecord =
            serde_json::from_str(&contents).map_err(|e| IntegrityError::Malformed {
                what: "backup record",
                reason: e.to_string(),
            })?;
        record.path = handle.to_path_buf();

        if decrypt && record.encrypted {
            let cipher = self.cipher.as_ref().ok_or(CipherError::Disabled)?;
            record.old_value = cipher.decrypt(&record.old_value)?;
            record.new_value = cipher.decrypt(&record.new_value)?;
            record.encrypted = false;
        }
        Ok(record)
    }

    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !self.dir.exists() {
            return Ok(files);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Records for one secret (or all), newest first.
    ///
    /// Unreadable records are skipped with a warning.
    pub fn list(&self, secret_id: Option<&str>, decrypt: bool) -> Result<Vec<BackupRecord>> {
        let prefix = secret_id.map(|id| format!("{}_", file_stem(id)));

        let mut records = Vec::new();
        for path in self.record_files()? {
            let matches_prefix = match (&prefix, path.file_name().and_then(|n| n.to_str())) {
                (Some(prefix), Some(name)) => name.starts_with(prefix.as_str()),
                (Some(_), None) => false,
                (None, _) => true,
            };
            if !matches_prefix {
                continue;
            }

            match self.read(&path, decrypt) {
                Ok(record) if secret_id.map_or(true, |id| record.secret_id == id) => {
                    records.push(record)
                }
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable backup"),
            }
        }

        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.secret_id.cmp(&b.secret_id))
        });
        Ok(records)
    }

    /// Records with masked values and no raw fields, newest first.
    pub fn list_for_display(&self, secret_id: Option<&str>) -> Result<Vec<BackupEntry>> {
        let records = self.list(secret_id, false)?;

        Ok(records
            .into_iter()
            .map(|record| {
                let plain = self.plaintext_values(&record);
                let (old_value_masked, new_value_masked, new_value_hash) = match &plain {
                    Some((old, new)) => (
                        mask_secret(old, DISPLAY_VISIBLE),
                        mask_secret(new, DISPLAY_VISIBLE),
                        Some(hash_for_comparison(new)),
                    ),
                    None => (mask_secret("", 0), mask_secret("", 0), None),
                };
                BackupEntry {
                    secret_id: record.secret_id,
                    timestamp: record.timestamp,
                    backup_created: record.backup_created,
                    encrypted: record.encrypted,
                    old_value_masked,
                    new_value_masked,
                    new_value_hash,
                    path: record.path,
                }
            })
            .collect())
    }

    fn plaintext_values(&self, record: &BackupRecord) -> Option<(String, String)> {
        if !record.encrypted {
            return Some((record.old_value.clone(), record.new_value.clone()));
        }
        let cipher = self.cipher.as_ref()?;
        let old = cipher.decrypt(&record.old_value).ok()?;
        let new = cipher.decrypt(&record.new_value).ok()?;
        Some((old, new))
    }

    /// Creation time of a record file: `backup_created`, else file mtime.
    fn created_at(path: &Path) -> Option<DateTime<Utc>> {
        let from_record = fs::read_to_string(path)
            .ok()
            .and_then(|contents| serde_json::from_str::<serde_json::Value>(&contents).ok())
            .and_then(|value| {
                value
                    .get("backup_created")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            })
            .map(|at| at.with_timezone(&Utc));

        from_record.or_else(|| {
            fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from)
        })
    }

    /// Remove records created more than `retention_days` ago.
    ///
    /// Returns the number of files removed.
    pub fn cleanup(&self, retention_days: u32) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let mut removed = 0;

        for path in self.record_files()? {
            let Some(created) = Self::created_at(&path) else {
                warn!(path = %path.display(), "cannot determine backup age, keeping");
                continue;
            };
            if created >= cutoff {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %path.display(), "removed expired backup");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove backup"),
            }
        }

        info!(removed, retention_days, "backup cleanup complete");
        Ok(removed)
    }

    /// Whether a record is readable, decryptable and complete.
    ///
    /// Never errors: any failure along the way is a `false`.
    pub fn verify(&self, handle: &Path) -> bool {
        let result = (|| -> Result<()> {
            let contents = fs::read_to_string(handle)?;
            let value: serde_json::Value = serde_json::from_str(&contents)?;
            if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| value.get(**f).is_none()) {
                return Err(IntegrityError::Malformed {
                    what: "backup record",
                    reason: format!("missing field {}", missing),
                }
                .into());
            }
            self.read(handle, true)?;
            Ok(())
        })();

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %handle.display(), error = %e, "backup verification failed");
                false
            }
        }
    }

    /// Totals, per-secret counts and age range of all records.
    pub fn export_summary(&self) -> Result<BackupSummary> {
        let records = self.list(None, false)?;

        let mut summary = BackupSummary {
            total: records.len(),
            encryption_enabled: self.encryption_enabled(),
            ..BackupSummary::default()
        };
        for record in &records {
            *summary.per_secret.entry(record.secret_id.clone()).or_insert(0) += 1;
            let at = record.backup_created;
            summary.oldest = Some(summary.oldest.map_or(at, |o| o.min(at)));
            summary.newest = Some(summary.newest.map_or(at, |n| n.max(at)));
        }
        Ok(summary)
    }

    /// Re-encrypt stored values from `old` to the current master key.
    ///
    /// Plaintext records are left alone. Returns the number rewritten.
    ///
    /// Every record is re-encrypted in memory before any file is written,
    /// so a value `old` cannot decrypt leaves the ledger untouched.
    pub fn reencrypt(&self, old: &MasterCipher) -> Result<usize> {
        let Some(cipher) = &self.cipher else {
            return Ok(0);
        };

        let mut rewritten = Vec::new();
        for mut record in self.list(None, false)? {
            if !record.encrypted {
                continue;
            }
            record.old_value = reencrypt_token(old, cipher, &record.old_value)?;
            record.new_value = reencrypt_token(old, cipher, &record.new_value)?;
            rewritten.push((serde_json::to_vec_pretty(&record)?, record.path));
        }

        for (json, path) in &rewritten {
            private_fs::write_private(path, json)?;
        }

        info!(count = rewritten.len(), "backup records re-encrypted");
        Ok(rewritten.len())
    }
}

/// File-name-safe form of a secret id.
fn file_stem(secret_id: &str) -> String {
    secret_id
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plain_ledger(tmp: &TempDir) -> BackupLedger {
        BackupLedger::open(tmp.path().join("backup"), None).unwrap()
    }

    fn encrypted_ledger(tmp: &TempDir) -> (Arc<CipherService>, BackupLedger) {
        let cipher = Arc::new(CipherService::open(tmp.path().join(".master.key")).unwrap());
        let ledger =
            BackupLedger::open(tmp.path().join("backup"), Some(Arc::clone(&cipher))).unwrap();
        (cipher, ledger)
    }

    fn age_record(path: &Path, days: i64) {
        let mut value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        let created = Utc::now() - Duration::days(days);
        value["backup_created"] = serde_json::Value::String(created.to_rfc3339());
        fs::write(path, serde_json::to_string(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_record_and_read() {
        let tmp = TempDir::new().unwrap();
        let ledger = plain_ledger(&tmp);

        let handle = ledger.record("db", "old", "new").unwrap();
        let record = ledger.read(&handle, false).unwrap();

        assert_eq!(record.secret_id, "db");
        assert_eq!(record.old_value, "old");
        assert_eq!(record.new_value, "new");
        assert!(!record.encrypted);
        assert_eq!(record.path, handle);
        assert!(handle
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("db_"));
    }

    #[test]
    fn test_encrypted_record() {
        let tmp = TempDir::new().unwrap();
        let (_cipher, ledger) = encrypted_ledger(&tmp);

        let handle = ledger.record("db", "old-secret", "new-secret").unwrap();
        let raw = fs::read_to_string(&handle).unwrap();
        assert!(!raw.contains("old-secret"));
        assert!(!raw.contains("new-secret"));

        let stored = ledger.read(&handle, false).unwrap();
        assert!(stored.encrypted);

        let record = ledger.read(&handle, true).unwrap();
        assert_eq!(record.old_value, "old-secret");
        assert_eq!(record.new_value, "new-secret");
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let ledger = plain_ledger(&tmp);
        let err = ledger.read(&tmp.path().join("nope.json"), false).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_rapid_records_are_distinct_and_ordered() {
        let tmp = TempDir::new().unwrap();
        let ledger = plain_ledger(&tmp);

        for i in 0..5 {
            ledger.record("api", &format!("v{}", i), &format!("v{}", i + 1)).unwrap();
        }

        let records = ledger.list(Some("api"), false).unwrap();
        assert_eq!(records.len(), 5);
        let news: Vec<_> = records.iter().map(|r| r.new_value.as_str()).collect();
        assert_eq!(news, vec!["v5", "v4", "v3", "v2", "v1"]);
        for pair in records.windows(2) {
            assert!(pair[0].timestamp > pair[1].timestamp);
        }
    }

    #[test]
    fn test_list_filters_exact_secret_id() {
        let tmp = TempDir::new().unwrap();
        let ledger = plain_ledger(&tmp);
        ledger.record("db", "a", "b").unwrap();
        ledger.record("db_replica", "c", "d").unwrap();
        ledger.record("db/replica", "e", "f").unwrap();

        assert_eq!(ledger.list(Some("db"), false).unwrap().len(), 1);
        assert_eq!(ledger.list(Some("db/replica"), false).unwrap().len(), 1);
        assert_eq!(ledger.list(None, false).unwrap().len(), 3);
    }

    #[test]
    fn test_list_for_display_masks() {
        let tmp = TempDir::new().unwrap();
        let (_cipher, ledger) = encrypted_ledger(&tmp);
        ledger.record("db", "old-password-value", "new-password-value").unwrap();

        let entries = ledger.list_for_display(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].old_value_masked, "old-********");
        assert_eq!(entries[0].new_value_masked, "new-********");
        assert_eq!(
            entries[0].new_value_hash.as_deref(),
            Some(hash_for_comparison("new-password-value").as_str())
        );

        let json = serde_json::to_string(&entries).unwrap();
        assert!(!json.contains("password-value"));
        assert!(!json.contains("\"old_value\""));
    }

    #[test]
    fn test_cleanup_removes_expired_only() {
        let tmp = TempDir::new().unwrap();
        let ledger = plain_ledger(&tmp);
        let old = ledger.record("db", "a", "b").unwrap();
        let fresh = ledger.record("db", "b", "c").unwrap();
        age_record(&old, 31);

        assert_eq!(ledger.cleanup(30).unwrap(), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_cleanup_keeps_records_created_now() {
        let tmp = TempDir::new().unwrap();
        let ledger = plain_ledger(&tmp);
        let handle = ledger.record("db", "a", "b").unwrap();

        assert_eq!(ledger.cleanup(1).unwrap(), 0);
        assert!(handle.exists());
    }

    #[test]
    fn test_verify() {
        let tmp = TempDir::new().unwrap();
        let ledger = plain_ledger(&tmp);
        let good = ledger.record("db", "a", "b").unwrap();
        assert!(ledger.verify(&good));

        let missing_field = tmp.path().join("backup").join("x_1.json");
        fs::write(&missing_field, r#"{"secret_id": "x", "timestamp": "1", "old_value": "a"}"#)
            .unwrap();
        assert!(!ledger.verify(&missing_field));

        let garbage = tmp.path().join("backup").join("y_1.json");
        fs::write(&garbage, "not json").unwrap();
        assert!(!ledger.verify(&garbage));

        assert!(!ledger.verify(&tmp.path().join("absent.json")));
    }

    #[test]
    fn test_verify_encrypted_without_cipher_fails() {
        let tmp = TempDir::new().unwrap();
        let (_cipher, ledger) = encrypted_ledger(&tmp);
        let handle = ledger.record("db", "a", "b").unwrap();
        assert!(ledger.verify(&handle));

        let reader = BackupLedger::open(tmp.path().join("backup"), None).unwrap();
        assert!(!reader.verify(&handle));
    }

    #[test]
    fn test_export_summary() {
        let tmp = TempDir::new().unwrap();
        let ledger = plain_ledger(&tmp);
        ledger.record("a", "1", "2").unwrap();
        ledger.record("a", "2", "3").unwrap();
        ledger.record("b", "1", "2").unwrap();

        let summary = ledger.export_summary().unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.per_secret.get("a"), Some(&2));
        assert_eq!(summary.per_secret.get("b"), Some(&1));
        assert!(summary.oldest.unwrap() <= summary.newest.unwrap());
        assert!(!summary.encryption_enabled);
    }

    #[test]
    fn test_reencrypt_after_key_rotation() {
        let tmp = TempDir::new().unwrap();
        let (cipher, ledger) = encrypted_ledger(&tmp);
        let handle = ledger.record("db", "old", "new").unwrap();

        let previous = cipher.rotate(None).unwrap();
        assert!(ledger.read(&handle, true).is_err());

        assert_eq!(ledger.reencrypt(&previous).unwrap(), 1);
        let record = ledger.read(&handle, true).unwrap();
        assert_eq!(record.old_value, "old");
        assert_eq!(record.new_value, "new");
    }

    #[test]
    fn test_reencrypt_with_foreign_record_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let (cipher, ledger) = encrypted_ledger(&tmp);
        let good = ledger.record("db", "old", "new").unwrap();
        let good_before = fs::read(&good).unwrap();

        let other = CipherService::open(tmp.path().join("other.key")).unwrap();
        let foreign = BackupRecord {
            secret_id: "api".to_string(),
            timestamp: "20200101_000000_000000000".to_string(),
            old_value: other.encrypt("a").unwrap(),
            new_value: other.encrypt("b").unwrap(),
            backup_created: Utc::now(),
            encrypted: true,
            path: PathBuf::new(),
        };
        fs::write(
            ledger.dir().join("api_20200101_000000_000000000.json"),
            serde_json::to_vec(&foreign).unwrap(),
        )
        .unwrap();

        let previous = cipher.rotate(None).unwrap();
        assert!(ledger.reencrypt(&previous).is_err());
        assert_eq!(fs::read(&good).unwrap(), good_before);
    }

    #[cfg(unix)]
    #[test]
    fn test_record_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let ledger = plain_ledger(&tmp);
        let handle = ledger.record("db", "a", "b").unwrap();

        let file_mode = fs::metadata(&handle).unwrap().permissions().mode() & 0o777;
        let dir_mode = fs::metadata(ledger.dir()).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }
}
