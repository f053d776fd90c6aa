//! Constants used throughout secret-rotator.
//!
//! Centralizes default paths, file modes and key-derivation parameters.

/// Default configuration file path.
pub const CONFIG_FILE: &str = "config/secret-rotator.toml";

/// Default master key file.
pub const MASTER_KEY_FILE: &str = "config/.master.key";

/// Default directory for rotation backup records.
pub const BACKUP_DIR: &str = "data/backup";

/// Default directory for master key backups and shares.
pub const KEY_BACKUP_DIR: &str = "config/key_backups";

/// Default secret store file.
pub const SECRETS_FILE: &str = "data/secrets.json";

/// Environment variable controlling the log filter.
pub const LOG_ENV: &str = "SECRET_ROTATOR_LOG";

/// Environment variable supplying a backup passphrase non-interactively.
pub const PASSPHRASE_ENV: &str = "SECRET_ROTATOR_PASSPHRASE";

/// Mode for key material, backups, shares and record files.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Mode for directories holding key material or backups.
pub const PRIVATE_DIR_MODE: u32 = 0o700;

/// Symmetric algorithm protecting secrets at rest.
pub const ALGORITHM: &str = "AES-256-GCM";

/// Master key length in bytes.
pub const KEY_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 rounds for `CipherService::derive_key`.
pub const DERIVE_ITERATIONS: u32 = 100_000;

/// Default PBKDF2 rounds for passphrase-protected key backups.
///
/// Recorded in each package, so raising it never breaks old backups.
pub const BACKUP_ITERATIONS: u32 = 600_000;

/// Lowest iteration count accepted from configuration.
pub const MIN_ITERATIONS: u32 = 1_000;

/// Salt length for passphrase derivation.
pub const SALT_LEN: usize = 16;

/// Salt length used by key backup packages.
pub const BACKUP_SALT_LEN: usize = 32;

/// Format version written into key files, packages and shares.
pub const FORMAT_VERSION: u32 = 1;

/// Symbols used by the password generator.
pub const PASSWORD_SYMBOLS: &str = "!@#$%^&*";
