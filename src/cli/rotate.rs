//! Rotate command.

use std::path::Path;

use crate::cli::context::Context;
use crate::cli::output;
use crate::core::registry;
use crate::error::{ConfigError, Error, Result};

/// Rotate all jobs, or only `job`.
///
/// Every job runs even when an earlier one fails; the command fails at the
/// end if any job did.
pub fn execute(config_path: &Path, job: Option<&str>) -> Result<()> {
    let ctx = Context::load(config_path)?;
    let orchestrator = registry::build(&ctx.config, ctx.cipher()?)?;

    let results: Vec<(String, bool)> = match job {
        Some(name) => {
            let job = orchestrator
                .job(name)
                .ok_or_else(|| ConfigError::UnknownReference {
                    what: "job",
                    name: name.to_string(),
                })?;
            vec![(job.name.clone(), orchestrator.rotate(job))]
        }
        None => {
            if orchestrator.jobs().is_empty() {
                output::warn("no rotation jobs configured");
                output::hint(&format!("add [[jobs]] to {}", config_path.display()));
                return Ok(());
            }
            let mut results = orchestrator.rotate_all();
            // report in configuration order
            orchestrator
                .jobs()
                .iter()
                .filter_map(|j| results.remove_entry(&j.name))
                .collect()
        }
    };

    let total = results.len();
    let mut failed = 0;
    for (name, ok) in &results {
        if *ok {
            output::success(&format!("rotated {}", output::id(name)));
        } else {
            failed += 1;
            output::error(&format!("failed {}", output::id(name)));
        }
    }

    if failed > 0 {
        output::hint("run with --verbose for details");
        return Err(Error::RotationFailed { failed, total });
    }
    Ok(())
}
