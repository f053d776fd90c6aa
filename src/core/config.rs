//! Configuration file management.
//!
//! Handles reading, writing, and validating `secret-rotator.toml`. The
//! loaded [`Config`] is an explicit value handed to constructors; nothing
//! in the core reads configuration from ambient state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants;
use crate::core::retry::RetryPolicy;
use crate::core::rotation::RotationJob;
use crate::error::{ConfigError, Result};

/// Full application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "default_stores")]
    pub stores: Vec<ComponentConfig>,
    #[serde(default = "default_generators")]
    pub generators: Vec<ComponentConfig>,
    #[serde(default)]
    pub jobs: Vec<RotationJob>,
}

/// `[encryption]`: master key settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub enabled: bool,
    pub key_file: PathBuf,
    /// Age after which `key status` recommends rotation.
    pub max_key_age_days: u32,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_file: PathBuf::from(constants::MASTER_KEY_FILE),
            max_key_age_days: 90,
        }
    }
}

/// `[backup]`: rotation backup ledger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    /// Store backed-up values as ciphertext.
    pub encrypt: bool,
    pub retention_days: u32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(constants::BACKUP_DIR),
            encrypt: true,
            retention_days: 30,
        }
    }
}

/// `[recovery]`: master key backup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub backup_dir: PathBuf,
    /// PBKDF2 rounds for new passphrase packages.
    pub iterations: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from(constants::KEY_BACKUP_DIR),
            iterations: constants::BACKUP_ITERATIONS,
        }
    }
}

/// A `[[stores]]` or `[[generators]]` entry.
///
/// Keys other than `name` and `kind` are passed to the kind's factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(flatten)]
    pub options: toml::Table,
}

impl ComponentConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            options: toml::Table::new(),
        }
    }

    /// Add one kind-specific option.
    pub fn with_option(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// Deserialize the kind-specific options.
    pub fn options<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let value = toml::Value::Table(self.options.clone());
        let options: T = value.try_into().map_err(ConfigError::Parse)?;
        Ok(options)
    }
}

fn default_stores() -> Vec<ComponentConfig> {
    vec![ComponentConfig::new("file", "file")
        .with_option("path", constants::SECRETS_FILE)
        .with_option("encrypted", true)]
}

fn default_generators() -> Vec<ComponentConfig> {
    vec![ComponentConfig::new("password", "password")]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encryption: EncryptionConfig::default(),
            backup: BackupConfig::default(),
            recovery: RecoveryConfig::default(),
            retry: RetryPolicy::default(),
            stores: default_stores(),
            generators: default_generators(),
            jobs: Vec::new(),
        }
    }
}

impl Config {
    /// Default configuration file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from(constants::CONFIG_FILE)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotInitialized` if the file doesn't exist,
    /// or `ConfigError::Parse` if the TOML is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");

        if !path.exists() {
            return Err(ConfigError::NotInitialized(path.display().to_string()).into());
        }
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config = Self::from_toml(&contents)?;

        debug!(
            stores = config.stores.len(),
            generators = config.generators.len(),
            jobs = config.jobs.len(),
            "config loaded"
        );
        Ok(config)
    }

    /// Write configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "saving config");

        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate the configuration structure and contents
    ///
    /// Checks:
    /// - Retention, retry and iteration settings are in range
    /// - Backup encryption has a master key to use
    /// - Store and generator entries are named, typed and unique
    ///
    /// Jobs are not checked here; the orchestrator rejects incomplete jobs
    /// individually when they are added.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue`, `ConfigError::MissingField` or
    /// `ConfigError::Duplicate` on validation failure.
    pub fn validate(&self) -> Result<()> {
        debug!("validating config");

        if self.backup.retention_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backup.retention_days",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        if self.backup.enabled && self.backup.encrypt && !self.encryption.enabled {
            return Err(ConfigError::InvalidValue {
                field: "backup.encrypt",
                reason: "requires encryption.enabled = true".to_string(),
            }
            .into());
        }

        if self.encryption.max_key_age_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "encryption.max_key_age_days",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        if !(self.retry.multiplier >= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "retry.multiplier",
                reason: format!("must be >= 1.0, got {}", self.retry.multiplier),
            }
            .into());
        }

        if self.recovery.iterations < constants::MIN_ITERATIONS {
            return Err(ConfigError::InvalidValue {
                field: "recovery.iterations",
                reason: format!(
                    "{} is below the minimum of {}",
                    self.recovery.iterations,
                    constants::MIN_ITERATIONS
                ),
            }
            .into());
        }

        validate_components("store", &self.stores)?;
        validate_components("generator", &self.generators)?;

        Ok(())
    }
}

fn validate_components(what: &'static str, components: &[ComponentConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for component in components {
        if component.name.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "name" }.into());
        }
        if component.kind.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "kind" }.into());
        }
        if !seen.insert(component.name.as_str()) {
            return Err(ConfigError::Duplicate {
                what,
                name: component.name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[encryption]
key_file = "keys/.master.key"

[backup]
retention_days = 7

[retry]
max_attempts = 5

[[stores]]
name = "main"
kind = "file"
path = "data/main.json"
encrypted = false

[[generators]]
name = "pw"
kind = "password"
length = 24
use_symbols = false

[[jobs]]
name = "db"
store = "main"
generator = "pw"
secret_id = "db_password"
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();

        assert_eq!(config.encryption.key_file, PathBuf::from("keys/.master.key"));
        assert!(config.encryption.enabled);
        assert_eq!(config.backup.retention_days, 7);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 1_000);
        assert_eq!(config.stores.len(), 1);
        assert_eq!(
            config.stores[0].options.get("encrypted"),
            Some(&toml::Value::Boolean(false))
        );
        assert_eq!(config.jobs[0].secret_id, "db_password");
    }

    #[test]
    fn test_defaults_from_empty_file() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.stores[0].kind, "file");
        assert_eq!(config.generators[0].kind, "password");
        assert_eq!(config.recovery.iterations, constants::BACKUP_ITERATIONS);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config").join("secret-rotator.toml");

        let mut config = Config::default();
        config
            .jobs
            .push(RotationJob::new("db", "file", "password", "db_password"));
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_is_not_initialized() {
        let tmp = TempDir::new().unwrap();
        let err = Config::load(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotInitialized(_))));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let cases = [
            "[backup]\nretention_days = 0",
            "[retry]\nmax_attempts = 0",
            "[retry]\nmultiplier = 0.5",
            "[recovery]\niterations = 10",
            "[encryption]\nenabled = false",
        ];
        for case in cases {
            let err = Config::from_toml(case).unwrap_err();
            assert!(
                matches!(err, Error::Config(ConfigError::InvalidValue { .. })),
                "{} should be rejected",
                case
            );
        }
    }

    #[test]
    fn test_plaintext_setup_is_valid() {
        let config =
            Config::from_toml("[encryption]\nenabled = false\n[backup]\nencrypt = false").unwrap();
        assert!(!config.encryption.enabled);
    }

    #[test]
    fn test_rejects_duplicate_and_unnamed_components() {
        let duplicate = r#"
[[stores]]
name = "a"
kind = "file"

[[stores]]
name = "a"
kind = "memory"
"#;
        let err = Config::from_toml(duplicate).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::Duplicate { .. })));

        let unnamed = "[[generators]]\nkind = \"password\"";
        let err = Config::from_toml(unnamed).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField { field: "name" })
        ));
    }

    #[test]
    fn test_incomplete_jobs_are_not_a_config_error() {
        let config = Config::from_toml("[[jobs]]\nname = \"half\"").unwrap();
        assert_eq!(config.jobs[0].secret_id, "");
    }

    #[test]
    fn test_component_options() {
        #[derive(Deserialize)]
        struct Opts {
            length: usize,
        }
        let component = ComponentConfig::new("pw", "password").with_option("length", 20);
        let opts: Opts = component.options().unwrap();
        assert_eq!(opts.length, 20);
    }
}
