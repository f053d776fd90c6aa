//! Rotation orchestration.
//!
//! [`Orchestrator`] resolves a job's store and generator by name, writes a
//! freshly generated value, then records the (old, new) pair in the backup
//! ledger. One job failing never stops the others.
//!
//! ## Ordering
//!
//! The store write happens before the backup record. If the record fails
//! the new value stays committed and the failure is logged at error level;
//! there is no compensation across store and ledger.
//!
//! ## Concurrency
//!
//! `rotate` and `rotate_all` take `&self` and serialize on a run lock, so a
//! scheduled run and an on-demand rotation can share one `Arc<Orchestrator>`
//! without interleaving writes. Jobs within a run execute sequentially.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::core::backup::BackupLedger;
use crate::core::cipher::hash_for_comparison;
use crate::core::generator::SecretGenerator;
use crate::core::retry::RetryPolicy;
use crate::core::store::SecretStore;
use crate::core::types::{GeneratorName, JobName, SecretId, StoreName};
use crate::error::{ConfigError, GenerationError, Result};

/// Times a generator is asked again when it repeats the current value.
const MAX_GENERATE_ATTEMPTS: usize = 3;

/// One secret to rotate: which store holds it and which generator renews it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationJob {
    pub name: JobName,
    pub store: StoreName,
    pub generator: GeneratorName,
    pub secret_id: SecretId,
}

impl RotationJob {
    pub fn new(
        name: impl Into<JobName>,
        store: impl Into<StoreName>,
        generator: impl Into<GeneratorName>,
        secret_id: impl Into<SecretId>,
    ) -> Self {
        Self {
            name: name.into(),
            store: store.into(),
            generator: generator.into(),
            secret_id: secret_id.into(),
        }
    }

    /// Reject jobs with an empty required field.
    pub fn check(&self) -> Result<()> {
        let fields = [
            ("name", &self.name),
            ("store", &self.store),
            ("generator", &self.generator),
            ("secret_id", &self.secret_id),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField { field }.into());
            }
        }
        Ok(())
    }
}

/// Coordinates stores, generators and the backup ledger.
pub struct Orchestrator {
    stores: HashMap<StoreName, Arc<dyn SecretStore>>,
    generators: HashMap<GeneratorName, Arc<dyn SecretGenerator>>,
    jobs: Vec<RotationJob>,
    ledger: Option<Arc<BackupLedger>>,
    retry: RetryPolicy,
    run_lock: Mutex<()>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut stores: Vec<_> = self.stores.keys().collect();
        stores.sort();
        let mut generators: Vec<_> = self.generators.keys().collect();
        generators.sort();
        f.debug_struct("Orchestrator")
            .field("stores", &stores)
            .field("generators", &generators)
            .field("jobs", &self.jobs.len())
            .field("backups", &self.ledger.is_some())
            .finish()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// An orchestrator with no backups and no retries.
    pub fn new() -> Self {
        Self {
            stores: HashMap::new(),
            generators: HashMap::new(),
            jobs: Vec::new(),
            ledger: None,
            retry: RetryPolicy::none(),
            run_lock: Mutex::new(()),
        }
    }

    /// Record every successful rotation in `ledger`.
    pub fn with_ledger(mut self, ledger: Arc<BackupLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Retry store reads and writes with `policy`.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn register_store(&mut self, store: Arc<dyn SecretStore>) {
        let name = store.name().to_string();
        if self.stores.insert(name.clone(), store).is_some() {
            warn!(store = %name, "store re-registered, previous instance replaced");
        } else {
            info!(store = %name, "registered store");
        }
    }

    pub fn register_generator(&mut self, generator: Arc<dyn SecretGenerator>) {
        let name = generator.name().to_string();
        let kind = generator.kind();
        if self.generators.insert(name.clone(), generator).is_some() {
            warn!(generator = %name, "generator re-registered, previous instance replaced");
        } else {
            info!(generator = %name, kind, "registered generator");
        }
    }

    /// Queue a job. Returns `false` (and logs) when a field is missing.
    pub fn add_job(&mut self, job: RotationJob) -> bool {
        if let Err(e) = job.check() {
            error!(job = %job.name, error = %e, "rejected rotation job");
            return false;
        }
        info!(job = %job.name, secret_id = %job.secret_id, "added rotation job");
        self.jobs.push(job);
        true
    }

    /// Jobs in registration order.
    pub fn jobs(&self) -> &[RotationJob] {
        &self.jobs
    }

    /// Look up a queued job by name.
    pub fn job(&self, name: &str) -> Option<&RotationJob> {
        self.jobs.iter().find(|job| job.name == name)
    }

    pub fn store(&self, name: &str) -> Option<&Arc<dyn SecretStore>> {
        self.stores.get(name)
    }

    pub fn ledger(&self) -> Option<&Arc<BackupLedger>> {
        self.ledger.as_ref()
    }

    /// Rotate one secret. Failures are logged and reported as `false`.
    pub fn rotate(&self, job: &RotationJob) -> bool {
        let _run = self.run_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.rotate_locked(job)
    }

    /// Rotate every queued job in order, one result per job name.
    pub fn rotate_all(&self) -> HashMap<JobName, bool> {
        let _run = self.run_lock.lock().unwrap_or_else(|e| e.into_inner());

        info!(jobs = self.jobs.len(), "starting rotation run");
        let mut results = HashMap::with_capacity(self.jobs.len());
        for job in &self.jobs {
            results.insert(job.name.clone(), self.rotate_locked(job));
        }

        let failed = results.values().filter(|ok| !**ok).count();
        if failed > 0 {
            warn!(total = results.len(), failed, "rotation run finished with failures");
        } else {
            info!(total = results.len(), "rotation run finished");
        }
        results
    }

    fn rotate_locked(&self, job: &RotationJob) -> bool {
        match self.try_rotate(job) {
            Ok(()) => true,
            Err(e) => {
                error!(job = %job.name, secret_id = %job.secret_id, error = %e, "rotation failed");
                false
            }
        }
    }

    fn try_rotate(&self, job: &RotationJob) -> Result<()> {
        job.check()?;

        let store = self
            .stores
            .get(&job.store)
            .ok_or_else(|| ConfigError::UnknownReference {
                what: "store",
                name: job.store.clone(),
            })?;
        let generator =
            self.generators
                .get(&job.generator)
                .ok_or_else(|| ConfigError::UnknownReference {
                    what: "generator",
                    name: job.generator.clone(),
                })?;

        debug!(job = %job.name, store = %job.store, generator = %job.generator, "rotating");

        let old_value = Zeroizing::new(
            self.retry
                .run("store.get", || store.get(&job.secret_id))?
                .unwrap_or_default(),
        );

        let new_value = self.candidate(generator.as_ref(), &old_value)?;

        self.retry
            .run("store.set", || store.set(&job.secret_id, &new_value))?;

        info!(
            job = %job.name,
            secret_id = %job.secret_id,
            fingerprint = %hash_for_comparison(&new_value),
            "secret rotated"
        );

        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.record(&job.secret_id, &old_value, &new_value) {
                error!(
                    job = %job.name,
                    secret_id = %job.secret_id,
                    error = %e,
                    "backup failed after store commit; new value is live without a backup record"
                );
            }
        }

        Ok(())
    }

    /// Generate and validate a value that differs from `current`.
    fn candidate(
        &self,
        generator: &dyn SecretGenerator,
        current: &str,
    ) -> Result<Zeroizing<String>> {
        for _ in 0..MAX_GENERATE_ATTEMPTS {
            let candidate = Zeroizing::new(generator.generate()?);
            if candidate.is_empty() {
                return Err(GenerationError::Empty(generator.name().to_string()).into());
            }
            if !generator.validate(&candidate) {
                return Err(GenerationError::PolicyViolation(generator.name().to_string()).into());
            }
            if candidate.as_str() != current {
                return Ok(candidate);
            }
            debug!(generator = %generator.name(), "candidate equals current value, regenerating");
        }
        Err(GenerationError::PolicyViolation(generator.name().to_string()).into())
    }
}
