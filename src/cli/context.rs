//! Per-invocation setup shared by commands.

use std::path::Path;
use std::sync::Arc;

use dialoguer::Password;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::backup::BackupLedger;
use crate::core::cipher::{self, CipherService};
use crate::core::config::Config;
use crate::core::constants;
use crate::core::recovery::KeyRecovery;
use crate::core::registry;
use crate::error::{CipherError, ConfigError, Result};

/// Loaded configuration plus lazily opened services.
pub struct Context {
    pub config: Config,
}

impl Context {
    pub fn load(path: &Path) -> Result<Self> {
        let config = Config::load(path)?;
        Ok(Self { config })
    }

    /// Open the cipher if encryption is enabled.
    pub fn cipher(&self) -> Result<Option<Arc<CipherService>>> {
        let encryption = &self.config.encryption;
        cipher::open_if(encryption.enabled, &encryption.key_file)
    }

    /// Open the cipher, failing when encryption is disabled.
    pub fn require_cipher(&self) -> Result<Arc<CipherService>> {
        self.cipher()?.ok_or_else(|| CipherError::Disabled.into())
    }

    /// Open the backup ledger, failing when backups are disabled.
    pub fn ledger(&self) -> Result<Arc<BackupLedger>> {
        let cipher = if self.config.backup.encrypt {
            self.cipher()?
        } else {
            None
        };
        registry::build_ledger(&self.config, cipher.as_ref())?.ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "backup.enabled",
                reason: "backups are disabled".to_string(),
            }
            .into()
        })
    }

    pub fn recovery(&self) -> Result<KeyRecovery> {
        let recovery = &self.config.recovery;
        Ok(KeyRecovery::new(&self.config.encryption.key_file, &recovery.backup_dir)?
            .with_iterations(recovery.iterations))
    }
}

/// Read a passphrase from the environment or prompt for one.
///
/// `confirm` asks twice, for passphrases that protect new backups.
pub fn passphrase(confirm: bool) -> Result<Zeroizing<String>> {
    if let Ok(value) = std::env::var(constants::PASSPHRASE_ENV) {
        debug!("passphrase taken from environment");
        return Ok(Zeroizing::new(value));
    }

    let prompt = Password::new().with_prompt("Backup passphrase");
    let prompt = if confirm {
        prompt.with_confirmation("Confirm passphrase", "passphrases do not match")
    } else {
        prompt
    };
    Ok(Zeroizing::new(prompt.interact()?))
}
