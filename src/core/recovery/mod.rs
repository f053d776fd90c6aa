//! Master key backup and recovery.
//!
//! Two independent paths protect the master key file:
//!
//! - **Passphrase packages**: the serialized key file sealed with a
//!   PBKDF2-derived key. The iteration count is stored in the package so
//!   raising the default never strands old backups.
//! - **Threshold shares**: the serialized key file split with Shamir's
//!   scheme; any `threshold` share files rebuild it.
//!
//! Every restore that installs a key first snapshots the current key file
//! to `master_key_pre_restore_{timestamp}.key`, and master key rotation
//! snapshots it to `master_key_pre_rotate_{timestamp}.key`. Either snapshot
//! can be installed again with [`KeyRecovery::restore_from_snapshot`]. All
//! files written here are owner-only. Passphrases and share payloads never reach the logs.

mod package;
pub mod sharing;

pub use package::{
    KeyBackupInfo, KeyBackupKind, KeyBackupPackage, RestoreOutcome, ShareFile, VerifyOutcome,
};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::core::cipher::{self, MasterKey};
use crate::core::constants::{BACKUP_ITERATIONS, BACKUP_SALT_LEN, FORMAT_VERSION};
use crate::core::fs as private_fs;
use crate::error::{CipherError, Error, IntegrityError, RecoveryError, Result};
use sharing::Share;

const PACKAGE_PREFIX: &str = "master_key_backup_";
const PACKAGE_EXT: &str = "enc";
const SHARE_DIR_PREFIX: &str = "shares_";
const PRE_RESTORE_PREFIX: &str = "master_key_pre_restore_";
const PRE_ROTATE_PREFIX: &str = "master_key_pre_rotate_";

fn file_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S_%6f").to_string()
}

/// Backup and restore of the master key file.
#[derive(Debug, Clone)]
pub struct KeyRecovery {
    key_file: PathBuf,
    backup_dir: PathBuf,
    iterations: u32,
}

impl KeyRecovery {
    /// Manage backups of `key_file` inside `backup_dir` (created owner-only).
    pub fn new(key_file: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Result<Self> {
        let backup_dir = backup_dir.into();
        private_fs::create_private_dir(&backup_dir)?;
        Ok(Self {
            key_file: key_file.into(),
            backup_dir,
            iterations: BACKUP_ITERATIONS,
        })
    }

    /// PBKDF2 rounds for new packages.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn key_file(&self) -> &Path {
        &self.key_file
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn active_key(&self) -> Result<MasterKey> {
        match MasterKey::load(&self.key_file) {
            Ok((key, _)) => Ok(key),
            Err(Error::NotFound { .. }) => {
                Err(RecoveryError::NoActiveKey(self.key_file.clone()).into())
            }
            Err(e) => Err(e),
        }
    }

    /// Seal the active key file under `passphrase`.
    ///
    /// Returns the package path.
    pub fn create_encrypted_backup(&self, passphrase: &str) -> Result<PathBuf> {
        if passphrase.is_empty() {
            return Err(
                RecoveryError::InvalidParameters("passphrase must not be empty".to_string()).into(),
            );
        }

        let key = self.active_key()?;
        let serialized = key.to_json()?;

        let salt = cipher::random_bytes(BACKUP_SALT_LEN)?;
        let derived = cipher::derive_with(passphrase.as_bytes(), &salt, self.iterations)?;
        let sealed = cipher::seal(&derived[..], serialized.as_bytes())?;

        let now = Utc::now();
        let package = KeyBackupPackage {
            version: FORMAT_VERSION,
            created_at: now,
            salt: STANDARD.encode(&salt),
            iterations: self.iterations,
            encrypted_key_data: STANDARD.encode(&sealed),
            key_id: key.key_id().to_string(),
            checksum: package::checksum(&sealed),
        };

        let path = self.backup_dir.join(format!(
            "{}{}.{}",
            PACKAGE_PREFIX,
            file_timestamp(&now),
            PACKAGE_EXT
        ));
        private_fs::write_private(&path, &serde_json::to_vec_pretty(&package)?)?;

        info!(
            path = %path.display(),
            key_id = %package.key_id,
            iterations = self.iterations,
            "encrypted master key backup created"
        );
        Ok(path)
    }

    /// Decrypt a package, checking its checksum first.
    fn open_package(&self, path: &Path, passphrase: &str) -> Result<MasterKey> {
        let package: KeyBackupPackage = package::read_json("key backup package", path)?;
        package::check_version("key backup package", package.version)?;

        let sealed = package.sealed_bytes()?;
        if package::checksum(&sealed) != package.checksum {
            warn!(path = %path.display(), "key backup checksum mismatch");
            return Err(IntegrityError::ChecksumMismatch {
                path: path.to_path_buf(),
            }
            .into());
        }

        let salt = package.salt_bytes()?;
        let derived = cipher::derive_with(passphrase.as_bytes(), &salt, package.iterations)?;
        let plaintext = Zeroizing::new(cipher::open(&derived[..], &sealed).map_err(|_| {
            CipherError::DecryptionFailed("wrong passphrase for key backup".to_string())
        })?);

        let (key, _) = MasterKey::parse(&plaintext)?;
        if key.key_id() != package.key_id {
            return Err(IntegrityError::KeyIdMismatch {
                expected: package.key_id,
                actual: key.key_id().to_string(),
            }
            .into());
        }
        Ok(key)
    }

    /// Restore the master key from a passphrase package.
    ///
    /// With `verify_only`, reports validity without touching the key file.
    ///
    /// # Errors
    ///
    /// `IntegrityError::ChecksumMismatch` if the sealed data was altered
    /// (checked before any decryption), `CipherError::DecryptionFailed`
    /// for a wrong passphrase.
    pub fn restore_from_encrypted(
        &self,
        path: &Path,
        passphrase: &str,
        verify_only: bool,
    ) -> Result<RestoreOutcome> {
        let key = self.open_package(path, passphrase)?;
        debug!(path = %path.display(), key_id = %key.key_id(), "key backup decrypted");
        self.finish_restore(key, verify_only)
    }

    /// Split the active key file into `num_shares` share files.
    ///
    /// Returns the share file paths in share order.
    pub fn create_split_backup(&self, num_shares: u8, threshold: u8) -> Result<Vec<PathBuf>> {
        let key = self.active_key()?;
        let serialized = key.to_json()?;
        let shares = sharing::split(serialized.as_bytes(), threshold, num_shares)?;

        let now = Utc::now();
        let dir = self
            .backup_dir
            .join(format!("{}{}", SHARE_DIR_PREFIX, file_timestamp(&now)));
        private_fs::create_private_dir(&dir)?;

        let mut paths = Vec::with_capacity(shares.len());
        for share in &shares {
            let file = ShareFile {
                version: FORMAT_VERSION,
                share_number: share.index,
                total_shares: num_shares,
                threshold,
                created_at: now,
                share_data: STANDARD.encode(&share.data[..]),
                key_id: Some(key.key_id().to_string()),
            };
            let json = Zeroizing::new(serde_json::to_vec_pretty(&file)?);
            let path = dir.join(format!("share_{}_of_{}.json", share.index, num_shares));
            private_fs::write_private(&path, &json)?;
            paths.push(path);
        }

        info!(
            dir = %dir.display(),
            key_id = %key.key_id(),
            threshold,
            num_shares,
            "split master key backup created"
        );
        Ok(paths)
    }

    /// Rebuild the master key from share files.
    ///
    /// Shares must agree on threshold, total and key id. Duplicate share
    /// numbers are ignored.
    ///
    /// # Errors
    ///
    /// `RecoveryError::InsufficientShares` when fewer than `threshold`
    /// distinct shares are given, `IntegrityError::ShareMismatch` when
    /// shares disagree.
    pub fn restore_from_shares(
        &self,
        paths: &[PathBuf],
        verify_only: bool,
    ) -> Result<RestoreOutcome> {
        if paths.is_empty() {
            return Err(RecoveryError::InsufficientShares {
                needed: 2,
                provided: 0,
            }
            .into());
        }

        let mut files: BTreeMap<u8, ShareFile> = BTreeMap::new();
        for path in paths {
            let file: ShareFile = package::read_json("key share", path)?;
            file.check()?;
            if files.contains_key(&file.share_number) {
                warn!(
                    path = %path.display(),
                    share_number = file.share_number,
                    "duplicate share ignored"
                );
                continue;
            }
            files.insert(file.share_number, file);
        }

        let mut iter = files.values();
        let first = iter.next().ok_or(RecoveryError::InsufficientShares {
            needed: 2,
            provided: 0,
        })?;
        for other in iter {
            let ids_differ = matches!(
                (&first.key_id, &other.key_id),
                (Some(a), Some(b)) if a != b
            );
            let field = if other.threshold != first.threshold {
                Some("threshold")
            } else if other.total_shares != first.total_shares {
                Some("total_shares")
            } else if ids_differ {
                Some("key_id")
            } else {
                None
            };
            if let Some(field) = field {
                warn!(field, "key shares disagree, refusing to combine");
                return Err(IntegrityError::ShareMismatch { field }.into());
            }
        }

        let threshold = first.threshold;
        let expected_id = files.values().find_map(|f| f.key_id.clone());
        if files.len() < usize::from(threshold) {
            return Err(RecoveryError::InsufficientShares {
                needed: usize::from(threshold),
                provided: files.len(),
            }
            .into());
        }

        let shares = files
            .values()
            .map(|file| {
                Ok(Share {
                    index: file.share_number,
                    data: file.payload()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let serialized = sharing::combine(&shares, threshold)?;

        let (key, _) = MasterKey::parse(&serialized)?;
        if let Some(expected) = expected_id {
            if key.key_id() != expected {
                return Err(IntegrityError::KeyIdMismatch {
                    expected,
                    actual: key.key_id().to_string(),
                }
                .into());
            }
        }

        debug!(key_id = %key.key_id(), shares = shares.len(), "master key reconstructed");
        self.finish_restore(key, verify_only)
    }

    fn finish_restore(&self, key: MasterKey, verify_only: bool) -> Result<RestoreOutcome> {
        let key_id = key.key_id().to_string();
        if verify_only {
            info!(key_id = %key_id, "key backup verified, not installed");
            return Ok(RestoreOutcome {
                key_id,
                installed: false,
                pre_restore: None,
            });
        }

        let pre_restore = self.snapshot_current(PRE_RESTORE_PREFIX)?;
        key.save(&self.key_file)?;
        info!(
            key_id = %key_id,
            path = %self.key_file.display(),
            "master key restored"
        );

        Ok(RestoreOutcome {
            key_id,
            installed: true,
            pre_restore,
        })
    }

    /// Copy the installed key file aside before it is replaced.
    fn snapshot_current(&self, prefix: &str) -> Result<Option<PathBuf>> {
        if !self.key_file.exists() {
            return Ok(None);
        }
        let contents = Zeroizing::new(fs::read(&self.key_file)?);
        let path = self
            .backup_dir
            .join(format!("{}{}.key", prefix, file_timestamp(&Utc::now())));
        private_fs::write_private(&path, &contents)?;
        info!(path = %path.display(), "current master key saved");
        Ok(Some(path))
    }

    /// Save the installed key before a master key rotation replaces it.
    ///
    /// The snapshot is the only copy of the old key on disk until every
    /// store and backup record has been re-encrypted.
    pub fn snapshot_before_rotation(&self) -> Result<Option<PathBuf>> {
        let snapshot = self.snapshot_current(PRE_ROTATE_PREFIX)?;
        if snapshot.is_none() {
            warn!(path = %self.key_file.display(), "no master key to snapshot before rotation");
        }
        Ok(snapshot)
    }

    /// Reinstall a key file saved by a rotation or an earlier restore.
    pub fn restore_from_snapshot(&self, path: &Path, verify_only: bool) -> Result<RestoreOutcome> {
        let (key, _) = MasterKey::load(path)?;
        debug!(path = %path.display(), key_id = %key.key_id(), "key snapshot loaded");
        self.finish_restore(key, verify_only)
    }

    /// Inventory of the backup directory, newest first.
    pub fn list_backups(&self) -> Result<Vec<KeyBackupInfo>> {
        let mut backups = Vec::new();
        if !self.backup_dir.exists() {
            return Ok(backups);
        }

        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            let info = if path.is_dir() && name.starts_with(SHARE_DIR_PREFIX) {
                share_set_info(&path)
            } else if name.starts_with(PACKAGE_PREFIX) && name.ends_with(PACKAGE_EXT) {
                match package::read_json::<KeyBackupPackage>("key backup package", &path) {
                    Ok(package) => KeyBackupInfo {
                        kind: KeyBackupKind::Encrypted,
                        path,
                        created_at: Some(package.created_at),
                        key_id: Some(package.key_id),
                        shares: None,
                    },
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "unreadable key backup");
                        continue;
                    }
                }
            } else if let Some(kind) = snapshot_kind(&name) {
                KeyBackupInfo {
                    kind,
                    created_at: modified(&path),
                    key_id: MasterKey::load(&path).ok().map(|(k, _)| k.key_id().to_string()),
                    shares: None,
                    path,
                }
            } else {
                continue;
            };
            backups.push(info);
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.path.cmp(&b.path)));
        Ok(backups)
    }

    /// Check one backup file.
    ///
    /// Share files get a structural check. Packages always get a checksum
    /// check, plus a full decryption when `passphrase` is given.
    pub fn verify(&self, path: &Path, passphrase: Option<&str>) -> Result<VerifyOutcome> {
        if let Ok(share) = package::read_json::<ShareFile>("key share", path) {
            share.check()?;
            return Ok(VerifyOutcome::ShareValid {
                share_number: share.share_number,
                total_shares: share.total_shares,
                threshold: share.threshold,
            });
        }

        match passphrase {
            Some(passphrase) => {
                let key = self.open_package(path, passphrase)?;
                Ok(VerifyOutcome::Decrypts {
                    key_id: key.key_id().to_string(),
                })
            }
            None => {
                let package: KeyBackupPackage = package::read_json("key backup package", path)?;
                package::check_version("key backup package", package.version)?;
                if package::checksum(&package.sealed_bytes()?) != package.checksum {
                    return Err(IntegrityError::ChecksumMismatch {
                        path: path.to_path_buf(),
                    }
                    .into());
                }
                Ok(VerifyOutcome::ChecksumValid {
                    key_id: package.key_id,
                })
            }
        }
    }
}

fn snapshot_kind(name: &str) -> Option<KeyBackupKind> {
    if name.starts_with(PRE_RESTORE_PREFIX) {
        Some(KeyBackupKind::PreRestore)
    } else if name.starts_with(PRE_ROTATE_PREFIX) {
        Some(KeyBackupKind::PreRotate)
    } else {
        None
    }
}

/// Whether `path` holds a master key file rather than a package or share.
pub fn is_key_file(path: &Path) -> bool {
    path.is_file() && MasterKey::load(path).is_ok()
}

fn modified(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Expand restore arguments into share file paths.
///
/// Directories contribute every share file they contain. Returns `None`
/// when `paths` is a single non-share file, i.e. an encrypted package.
pub fn share_paths(paths: &[PathBuf]) -> Result<Option<Vec<PathBuf>>> {
    let mut shares = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| is_share_file(p))
                .collect();
            found.sort();
            shares.extend(found);
        } else if paths.len() == 1 && !is_share_file(path) {
            return Ok(None);
        } else {
            shares.push(path.clone());
        }
    }
    Ok(Some(shares))
}

fn is_share_file(path: &Path) -> bool {
    path.is_file() && package::read_json::<ShareFile>("key share", path).is_ok()
}

fn share_set_info(dir: &Path) -> KeyBackupInfo {
    let first = fs::read_dir(dir).ok().and_then(|entries| {
        entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .find_map(|p| package::read_json::<ShareFile>("key share", &p).ok())
    });

    KeyBackupInfo {
        kind: KeyBackupKind::ShareSet,
        path: dir.to_path_buf(),
        created_at: first.as_ref().map(|s| s.created_at).or_else(|| modified(dir)),
        key_id: first.as_ref().and_then(|s| s.key_id.clone()),
        shares: first.as_ref().map(|s| (s.threshold, s.total_shares)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cipher::CipherService;
    use tempfile::TempDir;

    const ITERATIONS: u32 = 1_000;

    fn setup() -> (TempDir, KeyRecovery, String) {
        let tmp = TempDir::new().unwrap();
        let key_file = tmp.path().join(".master.key");
        let service = CipherService::open(&key_file).unwrap();
        let key_id = service.current().key_id().to_string();
        let recovery = KeyRecovery::new(&key_file, tmp.path().join("key_backups"))
            .unwrap()
            .with_iterations(ITERATIONS);
        (tmp, recovery, key_id)
    }

    #[test]
    fn test_encrypted_roundtrip_installs_with_snapshot() {
        let (_tmp, recovery, key_id) = setup();
        let package = recovery.create_encrypted_backup("correct horse").unwrap();

        MasterKey::generate().unwrap().save(recovery.key_file()).unwrap();

        let outcome = recovery
            .restore_from_encrypted(&package, "correct horse", false)
            .unwrap();
        assert!(outcome.installed);
        assert_eq!(outcome.key_id, key_id);

        let (restored, _) = MasterKey::load(recovery.key_file()).unwrap();
        assert_eq!(restored.key_id(), key_id);

        let snapshot = outcome.pre_restore.unwrap();
        assert!(snapshot
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(PRE_RESTORE_PREFIX));
        let (replaced, _) = MasterKey::load(&snapshot).unwrap();
        assert_ne!(replaced.key_id(), key_id);
    }

    #[test]
    fn test_verify_only_leaves_key_file() {
        let (_tmp, recovery, _) = setup();
        let package = recovery.create_encrypted_backup("pass").unwrap();
        let before = fs::read(recovery.key_file()).unwrap();

        let outcome = recovery.restore_from_encrypted(&package, "pass", true).unwrap();

        assert!(!outcome.installed);
        assert!(outcome.pre_restore.is_none());
        assert_eq!(fs::read(recovery.key_file()).unwrap(), before);
    }

    #[test]
    fn test_wrong_passphrase_is_decryption_error() {
        let (_tmp, recovery, _) = setup();
        let package = recovery.create_encrypted_backup("right").unwrap();

        let err = recovery.restore_from_encrypted(&package, "wrong", true).unwrap_err();
        assert!(matches!(err, Error::Cipher(CipherError::DecryptionFailed(_))));
    }

    #[test]
    fn test_corrupted_blob_fails_checksum() {
        let (_tmp, recovery, _) = setup();
        let path = recovery.create_encrypted_backup("right").unwrap();

        let mut package: KeyBackupPackage =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let mut sealed = STANDARD.decode(&package.encrypted_key_data).unwrap();
        sealed[20] ^= 0xff;
        package.encrypted_key_data = STANDARD.encode(&sealed);
        fs::write(&path, serde_json::to_string(&package).unwrap()).unwrap();

        let err = recovery.restore_from_encrypted(&path, "right", true).unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let (_tmp, recovery, _) = setup();
        assert!(recovery.create_encrypted_backup("").is_err());
    }

    #[test]
    fn test_missing_key_file() {
        let tmp = TempDir::new().unwrap();
        let recovery =
            KeyRecovery::new(tmp.path().join("absent.key"), tmp.path().join("b")).unwrap();
        let err = recovery.create_split_backup(3, 2).unwrap_err();
        assert!(matches!(err, Error::Recovery(RecoveryError::NoActiveKey(_))));
    }

    #[test]
    fn test_split_and_restore() {
        let (_tmp, recovery, key_id) = setup();
        let paths = recovery.create_split_backup(5, 3).unwrap();
        assert_eq!(paths.len(), 5);
        assert!(paths[0].ends_with("share_1_of_5.json"));

        let subset = vec![paths[4].clone(), paths[0].clone(), paths[2].clone()];
        let outcome = recovery.restore_from_shares(&subset, true).unwrap();
        assert_eq!(outcome.key_id, key_id);

        let err = recovery.restore_from_shares(&paths[..2], true).unwrap_err();
        assert!(matches!(
            err,
            Error::Recovery(RecoveryError::InsufficientShares {
                needed: 3,
                provided: 2
            })
        ));
    }

    #[test]
    fn test_duplicate_shares_do_not_count_twice() {
        let (_tmp, recovery, _) = setup();
        let paths = recovery.create_split_backup(3, 2).unwrap();

        let dupes = vec![paths[0].clone(), paths[0].clone()];
        let err = recovery.restore_from_shares(&dupes, true).unwrap_err();
        assert!(matches!(
            err,
            Error::Recovery(RecoveryError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_mismatched_share_sets_rejected() {
        let (_tmp, recovery, _) = setup();
        let first = recovery.create_split_backup(3, 2).unwrap();
        let second = recovery.create_split_backup(4, 3).unwrap();

        let mixed = vec![first[0].clone(), second[1].clone(), second[2].clone()];
        let err = recovery.restore_from_shares(&mixed, true).unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity(IntegrityError::ShareMismatch { .. })
        ));
    }

    #[test]
    fn test_list_and_verify() {
        let (_tmp, recovery, key_id) = setup();
        let package = recovery.create_encrypted_backup("pass").unwrap();
        let shares = recovery.create_split_backup(3, 2).unwrap();

        let backups = recovery.list_backups().unwrap();
        assert_eq!(backups.len(), 2);
        assert!(backups.iter().any(|b| b.kind == KeyBackupKind::Encrypted));
        assert!(backups
            .iter()
            .any(|b| b.kind == KeyBackupKind::ShareSet && b.shares == Some((2, 3))));

        assert_eq!(
            recovery.verify(&package, None).unwrap(),
            VerifyOutcome::ChecksumValid {
                key_id: key_id.clone()
            }
        );
        assert_eq!(
            recovery.verify(&package, Some("pass")).unwrap(),
            VerifyOutcome::Decrypts { key_id }
        );
        assert!(matches!(
            recovery.verify(&shares[1], None).unwrap(),
            VerifyOutcome::ShareValid { share_number: 2, .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_backup_files_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, recovery, _) = setup();
        let package = recovery.create_encrypted_backup("pass").unwrap();
        let shares = recovery.create_split_backup(2, 2).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&package), 0o600);
        assert_eq!(mode(&shares[0]), 0o600);
        assert_eq!(mode(shares[0].parent().unwrap()), 0o700);
        assert_eq!(mode(recovery.backup_dir()), 0o700);
    }

    #[test]
    fn test_rotation_snapshot_restores_old_key() {
        let (_tmp, recovery, key_id) = setup();
        let snapshot = recovery.snapshot_before_rotation().unwrap().unwrap();
        assert!(snapshot
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(PRE_ROTATE_PREFIX));
        assert!(is_key_file(&snapshot));

        MasterKey::generate().unwrap().save(recovery.key_file()).unwrap();

        let outcome = recovery.restore_from_snapshot(&snapshot, false).unwrap();
        assert!(outcome.installed);
        assert_eq!(outcome.key_id, key_id);
        let (restored, _) = MasterKey::load(recovery.key_file()).unwrap();
        assert_eq!(restored.key_id(), key_id);

        let kinds: Vec<_> = recovery
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|b| b.kind)
            .collect();
        assert!(kinds.contains(&KeyBackupKind::PreRotate));
        assert!(kinds.contains(&KeyBackupKind::PreRestore));
    }

    #[test]
    fn test_rotation_snapshot_without_key_file() {
        let tmp = TempDir::new().unwrap();
        let recovery =
            KeyRecovery::new(tmp.path().join(".master.key"), tmp.path().join("key_backups"))
                .unwrap();
        assert_eq!(recovery.snapshot_before_rotation().unwrap(), None);
    }

    #[test]
    fn test_share_paths_expands_directories() {
        let (_tmp, recovery, _) = setup();
        let package = recovery.create_encrypted_backup("pass").unwrap();
        let shares = recovery.create_split_backup(3, 2).unwrap();
        let dir = shares[0].parent().unwrap().to_path_buf();

        assert_eq!(share_paths(&[package]).unwrap(), None);
        assert_eq!(share_paths(&[dir]).unwrap(), Some(shares.clone()));
        assert_eq!(
            share_paths(&shares[..2]).unwrap(),
            Some(shares[..2].to_vec())
        );
    }
}
