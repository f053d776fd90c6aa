//! Rotation backup commands.

use std::path::Path;

use crate::cli::context::Context;
use crate::cli::output;
use crate::error::{IntegrityError, Result};

/// List backups with masked values.
pub fn list(config_path: &Path, secret: Option<&str>, json: bool) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let entries = ctx.ledger()?.list_for_display(secret)?;

    if json {
        return output::json(&entries);
    }

    if entries.is_empty() {
        output::dimmed("no backups");
        return Ok(());
    }

    output::header(&format!("{} backup{}", entries.len(), output::plural(entries.len())));
    output::rule();
    for entry in &entries {
        println!(
            "  {}  {}  {} -> {}{}",
            entry.backup_created.format("%Y-%m-%d %H:%M:%S"),
            output::id(&entry.secret_id),
            entry.old_value_masked,
            entry.new_value_masked,
            if entry.encrypted { "  (encrypted)" } else { "" }
        );
    }
    Ok(())
}

/// Verify one backup record file.
pub fn verify(config_path: &Path, file: &Path) -> Result<()> {
    let ctx = Context::load(config_path)?;
    if ctx.ledger()?.verify(file) {
        output::success(&format!("{} is valid", output::path(file.display())));
        Ok(())
    } else {
        Err(IntegrityError::Malformed {
            what: "backup record",
            reason: format!("{} failed verification", file.display()),
        }
        .into())
    }
}

/// Remove backups past retention.
pub fn cleanup(config_path: &Path, days: Option<u32>) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let days = days.unwrap_or(ctx.config.backup.retention_days);
    let removed = ctx.ledger()?.cleanup(days)?;
    output::success(&format!(
        "removed {} backup{} older than {} days",
        removed,
        output::plural(removed),
        days
    ));
    Ok(())
}

/// Print counts per secret and the age range.
pub fn summary(config_path: &Path, json: bool) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let summary = ctx.ledger()?.export_summary()?;

    if json {
        return output::json(&summary);
    }

    output::header("Backups");
    output::rule();
    output::kv("total", summary.total);
    output::kv(
        "encrypted",
        if summary.encryption_enabled { "yes" } else { "no" },
    );
    if let Some(oldest) = summary.oldest {
        output::kv("oldest", oldest.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(newest) = summary.newest {
        output::kv("newest", newest.format("%Y-%m-%d %H:%M:%S"));
    }
    if !summary.per_secret.is_empty() {
        println!();
        for (secret_id, count) in &summary.per_secret {
            output::list_item(&format!("{}  {}", output::id(secret_id), count));
        }
    }
    Ok(())
}
