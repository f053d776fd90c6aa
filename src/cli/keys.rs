//! Master key backup commands.

use std::path::{Path, PathBuf};

use crate::cli::context::{self, Context};
use crate::cli::output;
use crate::core::recovery::{self, VerifyOutcome};
use crate::error::Result;

/// Seal the master key under a passphrase.
pub fn create_encrypted(config_path: &Path) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let recovery = ctx.recovery()?;
    let passphrase = context::passphrase(true)?;

    let path = recovery.create_encrypted_backup(&passphrase)?;
    output::success(&format!("key backup written to {}", output::path(path.display())));
    output::hint("store the passphrase separately from the backup file");
    Ok(())
}

/// Split the master key into share files.
pub fn create_split(config_path: &Path, shares: u8, threshold: u8) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let paths = ctx.recovery()?.create_split_backup(shares, threshold)?;

    output::success(&format!(
        "split master key into {} shares, {} needed to restore",
        paths.len(),
        threshold
    ));
    for path in &paths {
        output::list_item(&output::path(path.display()));
    }
    output::hint("give each share to a different custodian");
    Ok(())
}

/// List key backups, newest first.
pub fn list(config_path: &Path, json: bool) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let backups = ctx.recovery()?.list_backups()?;

    if json {
        return output::json(&backups);
    }
    if backups.is_empty() {
        output::dimmed("no key backups");
        output::hint("run: secret-rotator keys create-encrypted");
        return Ok(());
    }

    output::section("Key backups");
    for backup in &backups {
        let created = backup
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let shares = backup
            .shares
            .map(|(threshold, total)| format!("  {}-of-{}", threshold, total))
            .unwrap_or_default();
        println!(
            "  {:<11} {}  {}{}",
            backup.kind.to_string(),
            created,
            output::path(backup.path.display()),
            shares
        );
    }
    Ok(())
}

/// Verify a package or share file.
pub fn verify(config_path: &Path, file: &Path, decrypt: bool) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let recovery = ctx.recovery()?;

    let passphrase = if decrypt {
        Some(context::passphrase(false)?)
    } else {
        None
    };

    match recovery.verify(file, passphrase.as_deref().map(String::as_str))? {
        VerifyOutcome::ChecksumValid { key_id } => {
            output::success(&format!("checksum valid (key {})", output::id(&key_id)));
            output::hint("pass --decrypt to test the passphrase too");
        }
        VerifyOutcome::Decrypts { key_id } => {
            output::success(&format!("backup decrypts to key {}", output::id(&key_id)));
        }
        VerifyOutcome::ShareValid {
            share_number,
            total_shares,
            threshold,
        } => {
            output::success(&format!(
                "share {} of {} is well formed ({} needed)",
                share_number, total_shares, threshold
            ));
        }
    }
    Ok(())
}

/// Restore from a package, a key snapshot, or share files.
pub fn restore(config_path: &Path, files: &[PathBuf], verify_only: bool) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let recovery = ctx.recovery()?;

    let outcome = match recovery::share_paths(files)? {
        Some(shares) => recovery.restore_from_shares(&shares, verify_only)?,
        None if recovery::is_key_file(&files[0]) => {
            recovery.restore_from_snapshot(&files[0], verify_only)?
        }
        None => {
            let passphrase = context::passphrase(false)?;
            recovery.restore_from_encrypted(&files[0], &passphrase, verify_only)?
        }
    };

    if !outcome.installed {
        output::success(&format!(
            "backup is valid (key {}); nothing installed",
            output::id(&outcome.key_id)
        ));
        return Ok(());
    }

    output::success(&format!("restored master key {}", output::id(&outcome.key_id)));
    if let Some(previous) = &outcome.pre_restore {
        output::kv("previous", output::path(previous.display()));
    }
    Ok(())
}
