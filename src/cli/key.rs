//! Master key commands.

use std::path::Path;

use chrono::Utc;
use tracing::{error, info};

use crate::cli::context::Context;
use crate::cli::output;
use crate::core::registry;
use crate::error::Result;

/// Show the active key's metadata and whether it is due for rotation.
pub fn status(config_path: &Path) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let cipher = ctx.require_cipher()?;
    let metadata = cipher.metadata();
    let max_age = i64::from(ctx.config.encryption.max_key_age_days);

    output::section("Master key");
    output::kv("file", output::path(cipher.key_file().display()));
    output::kv("key id", &metadata.key_id);
    output::kv("version", metadata.version);
    output::kv("algorithm", &metadata.algorithm);
    match metadata.created_at {
        Some(created_at) => {
            let age = Utc::now().signed_duration_since(created_at).num_days();
            output::kv("created", created_at.format("%Y-%m-%d %H:%M:%S"));
            output::kv("age", format!("{} days", age));
        }
        None => output::kv("created", "unknown"),
    }

    if cipher.should_rotate(max_age) {
        output::warn(&format!("key is due for rotation (max age {} days)", max_age));
        output::hint("run: secret-rotator key rotate");
    }
    Ok(())
}

/// Install a new master key, then re-encrypt stores and backups.
///
/// The current key file is copied into the key backup directory first, so
/// a failed re-encryption can be undone with `keys restore <snapshot>`.
pub fn rotate(config_path: &Path) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let cipher = ctx.require_cipher()?;

    // open everything that needs re-encrypting before the key changes
    let stores = registry::encrypted_file_stores(&ctx.config, &cipher)?;
    let ledger = if ctx.config.backup.enabled && ctx.config.backup.encrypt {
        registry::build_ledger(&ctx.config, Some(&cipher))?
    } else {
        None
    };
    let snapshot = ctx.recovery()?.snapshot_before_rotation()?;

    let old = cipher.rotate(None)?;
    let new_id = cipher.metadata().key_id;
    output::success(&format!(
        "master key rotated {} -> {}",
        output::id(old.key_id()),
        output::id(&new_id)
    ));

    let reencrypted = (|| -> Result<()> {
        for store in &stores {
            let count = store.reencrypt(&old)?;
            let label = format!("{} secret{}", count, output::plural(count));
            output::kv("store", format!("{}: {}", store.path().display(), label));
        }
        if let Some(ledger) = &ledger {
            let count = ledger.reencrypt(&old)?;
            output::kv("backups", format!("{} record{}", count, output::plural(count)));
        }
        Ok(())
    })();

    if let Err(e) = reencrypted {
        error!(old_key_id = %old.key_id(), error = %e, "re-encryption after key rotation failed");
        if let Some(snapshot) = &snapshot {
            output::warn(&format!(
                "previous key {} saved to {}",
                output::id(old.key_id()),
                output::path(snapshot.display())
            ));
            output::hint(&format!(
                "undo with: secret-rotator keys restore {}",
                snapshot.display()
            ));
        }
        return Err(e);
    }

    info!(old_key_id = %old.key_id(), new_key_id = %new_id, "key rotation complete");
    if let Some(snapshot) = &snapshot {
        output::kv("previous", output::path(snapshot.display()));
    }
    output::hint("key backups made before this rotation restore the old key; create new ones");
    Ok(())
}
