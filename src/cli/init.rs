//! Init command.

use std::path::Path;

use tracing::info;

use crate::cli::output;
use crate::core::cipher;
use crate::core::config::Config;
use crate::error::{ConfigError, Result};

/// Write a default configuration and create the master key.
pub fn execute(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(ConfigError::AlreadyInitialized(config_path.display().to_string()).into());
    }

    let config = Config::default();
    config.save(config_path)?;
    info!(path = %config_path.display(), "config written");
    output::success(&format!("wrote {}", output::path(config_path.display())));

    let encryption = &config.encryption;
    if let Some(cipher) = cipher::open_if(encryption.enabled, &encryption.key_file)? {
        let metadata = cipher.metadata();
        output::kv("master key", output::path(cipher.key_file().display()));
        output::kv("key id", &metadata.key_id);
        output::warn("back up the master key: secret-rotator keys create-encrypted");
    }

    println!();
    println!(
        "Next: add [[jobs]] to the config, then {}",
        output::cmd("secret-rotator rotate")
    );
    Ok(())
}
