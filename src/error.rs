//! Error types.
//!
//! Each concern owns a small error enum; [`Error`] aggregates them so the
//! core can use a single `Result` alias with `?` conversions.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for all secret-rotator operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error("{kind} not found: {}", .path.display())]
    NotFound { kind: &'static str, path: PathBuf },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{failed} of {total} rotation jobs failed")]
    RotationFailed { failed: usize, total: usize },

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

impl Error {
    /// Shorthand for a missing file of the given kind.
    pub fn not_found(kind: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            kind,
            path: path.into(),
        }
    }
}

/// Configuration and wiring errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0} (run: secret-rotator init)")]
    NotInitialized(String),

    #[error("config file already exists: {0}")]
    AlreadyInitialized(String),

    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown {what} kind: {kind}")]
    UnknownKind { what: &'static str, kind: String },

    #[error("unknown {what}: {name}")]
    UnknownReference { what: &'static str, name: String },

    #[error("duplicate {what} name: {name}")]
    Duplicate { what: &'static str, name: String },
}

/// Secret store read/write failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read secret store {store}: {reason}")]
    ReadFailed { store: String, reason: String },

    #[error("failed to write secret store {store}: {reason}")]
    WriteFailed { store: String, reason: String },

    #[error("secret store {0} is not reachable")]
    Unavailable(String),
}

/// Secret generation failures.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generator {0} produced an empty value")]
    Empty(String),

    #[error("generator {0} produced a value that failed its own policy")]
    PolicyViolation(String),

    #[error("invalid generator policy: {0}")]
    InvalidPolicy(String),

    #[error("random source failure")]
    Random,
}

/// Encryption and decryption failures.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("encryption is not enabled")]
    Disabled,
}

/// Integrity violations on key material and backups.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("master key id mismatch: file says {expected}, key hashes to {actual}")]
    KeyIdMismatch { expected: String, actual: String },

    #[error("checksum mismatch for {}: backup is corrupted", .path.display())]
    ChecksumMismatch { path: PathBuf },

    #[error("key shares disagree on {field}")]
    ShareMismatch { field: &'static str },

    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },
}

/// Master key recovery errors.
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("insufficient shares: need {needed}, got {provided}")]
    InsufficientShares { needed: usize, provided: usize },

    #[error("invalid share parameters: {0}")]
    InvalidParameters(String),

    #[error("no master key installed at {}", .0.display())]
    NoActiveKey(PathBuf),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
