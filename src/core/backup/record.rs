//! Backup record types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::SecretId;

/// Format of the sortable record timestamp (nanosecond resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%9f";

/// Fields a record file must carry to be considered intact.
pub const REQUIRED_FIELDS: [&str; 4] = ["secret_id", "timestamp", "old_value", "new_value"];

/// Render a creation instant as a record timestamp.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// One (old, new) value pair captured after a rotation.
///
/// `encrypted` describes the values held in this struct: `true` means
/// `old_value` and `new_value` are ciphertext tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub secret_id: SecretId,
    pub timestamp: String,
    pub old_value: String,
    pub new_value: String,
    pub backup_created: DateTime<Utc>,
    #[serde(default)]
    pub encrypted: bool,
    /// File the record was read from.
    #[serde(skip)]
    pub path: PathBuf,
}

/// A record prepared for display: values masked, raw fields dropped.
#[derive(Debug, Clone, Serialize)]
pub struct BackupEntry {
    pub secret_id: SecretId,
    pub timestamp: String,
    pub backup_created: DateTime<Utc>,
    pub encrypted: bool,
    pub old_value_masked: String,
    pub new_value_masked: String,
    /// Comparison hash of the new value, `None` when it could not be decrypted.
    pub new_value_hash: Option<String>,
    pub path: PathBuf,
}

/// Aggregate view of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    pub total: usize,
    pub per_secret: BTreeMap<SecretId, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub encryption_enabled: bool,
}
