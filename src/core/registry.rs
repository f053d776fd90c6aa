//! Static component registry.
//!
//! Store and generator kinds are looked up in fixed `(kind, factory)`
//! tables. Adding a kind means adding a row here; nothing is discovered at
//! runtime.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::backup::BackupLedger;
use crate::core::cipher::CipherService;
use crate::core::config::{ComponentConfig, Config};
use crate::core::constants;
use crate::core::generator::{
    ApiKeyGenerator, ApiKeyPolicy, DatabasePasswordGenerator, DatabasePasswordPolicy,
    PasswordGenerator, PasswordPolicy, SecretGenerator, SigningKeyGenerator, SigningKeyPolicy,
};
use crate::core::rotation::Orchestrator;
use crate::core::store::{FileStore, MemoryStore, SecretStore};
use crate::error::{CipherError, ConfigError, Result};

/// Builds a store from its config entry and the optional cipher.
pub type StoreFactory =
    fn(&ComponentConfig, Option<&Arc<CipherService>>) -> Result<Arc<dyn SecretStore>>;

/// Builds a generator from its config entry.
pub type GeneratorFactory = fn(&ComponentConfig) -> Result<Arc<dyn SecretGenerator>>;

/// Known store kinds.
pub const STORE_KINDS: &[(&str, StoreFactory)] = &[("file", file_store), ("memory", memory_store)];

/// Known generator kinds.
pub const GENERATOR_KINDS: &[(&str, GeneratorFactory)] = &[
    ("password", password_generator),
    ("api_key", api_key_generator),
    ("signing_key", signing_key_generator),
    ("database_password", database_password_generator),
];

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FileStoreOptions {
    path: PathBuf,
    encrypted: bool,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::SECRETS_FILE),
            encrypted: true,
        }
    }
}

fn file_store(
    component: &ComponentConfig,
    cipher: Option<&Arc<CipherService>>,
) -> Result<Arc<dyn SecretStore>> {
    let options: FileStoreOptions = component.options()?;
    let store = FileStore::new(&component.name, options.path);
    let store = match (options.encrypted, cipher) {
        (true, Some(cipher)) => store.with_cipher(Arc::clone(cipher)),
        (true, None) => return Err(CipherError::Disabled.into()),
        (false, _) => store,
    };
    Ok(Arc::new(store))
}

fn memory_store(
    component: &ComponentConfig,
    _cipher: Option<&Arc<CipherService>>,
) -> Result<Arc<dyn SecretStore>> {
    Ok(Arc::new(MemoryStore::new(&component.name)))
}

fn password_generator(component: &ComponentConfig) -> Result<Arc<dyn SecretGenerator>> {
    let policy: PasswordPolicy = component.options()?;
    Ok(Arc::new(PasswordGenerator::new(&component.name, policy)?))
}

fn api_key_generator(component: &ComponentConfig) -> Result<Arc<dyn SecretGenerator>> {
    let policy: ApiKeyPolicy = component.options()?;
    Ok(Arc::new(ApiKeyGenerator::new(&component.name, policy)?))
}

fn signing_key_generator(component: &ComponentConfig) -> Result<Arc<dyn SecretGenerator>> {
    let policy: SigningKeyPolicy = component.options()?;
    Ok(Arc::new(SigningKeyGenerator::new(&component.name, policy)?))
}

fn database_password_generator(component: &ComponentConfig) -> Result<Arc<dyn SecretGenerator>> {
    let policy: DatabasePasswordPolicy = component.options()?;
    Ok(Arc::new(DatabasePasswordGenerator::new(
        &component.name,
        policy,
    )?))
}

fn lookup<F: Copy>(what: &'static str, table: &[(&str, F)], kind: &str) -> Result<F> {
    table
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, factory)| *factory)
        .ok_or_else(|| {
            ConfigError::UnknownKind {
                what,
                kind: kind.to_string(),
            }
            .into()
        })
}

/// Build one store.
pub fn build_store(
    component: &ComponentConfig,
    cipher: Option<&Arc<CipherService>>,
) -> Result<Arc<dyn SecretStore>> {
    let factory = lookup("store", STORE_KINDS, &component.kind)?;
    factory(component, cipher)
}

/// Build one generator.
pub fn build_generator(component: &ComponentConfig) -> Result<Arc<dyn SecretGenerator>> {
    let factory = lookup("generator", GENERATOR_KINDS, &component.kind)?;
    factory(component)
}

/// Concrete handles to the encrypted file stores in `config`.
///
/// Master key rotation needs these to re-encrypt store contents, which the
/// `SecretStore` trait does not expose.
pub fn encrypted_file_stores(
    config: &Config,
    cipher: &Arc<CipherService>,
) -> Result<Vec<FileStore>> {
    let mut stores = Vec::new();
    for component in config.stores.iter().filter(|c| c.kind == "file") {
        let options: FileStoreOptions = component.options()?;
        if options.encrypted {
            let store = FileStore::new(&component.name, options.path);
            stores.push(store.with_cipher(Arc::clone(cipher)));
        }
    }
    Ok(stores)
}

/// Open the backup ledger described by `config`, if backups are enabled.
pub fn build_ledger(
    config: &Config,
    cipher: Option<&Arc<CipherService>>,
) -> Result<Option<Arc<BackupLedger>>> {
    if !config.backup.enabled {
        return Ok(None);
    }
    let cipher = match (config.backup.encrypt, cipher) {
        (true, Some(cipher)) => Some(Arc::clone(cipher)),
        (true, None) => return Err(CipherError::Disabled.into()),
        (false, _) => None,
    };
    let ledger = BackupLedger::open(&config.backup.dir, cipher)?;
    Ok(Some(Arc::new(ledger)))
}

/// Wire an [`Orchestrator`] from configuration.
///
/// Jobs that reference unknown stores or generators are kept; they fail
/// closed when rotated.
pub fn build(config: &Config, cipher: Option<Arc<CipherService>>) -> Result<Orchestrator> {
    let mut orchestrator = Orchestrator::new().with_retry(config.retry.clone());
    if let Some(ledger) = build_ledger(config, cipher.as_ref())? {
        orchestrator = orchestrator.with_ledger(ledger);
    }

    for component in &config.stores {
        orchestrator.register_store(build_store(component, cipher.as_ref())?);
    }
    for component in &config.generators {
        orchestrator.register_generator(build_generator(component)?);
    }

    for job in &config.jobs {
        let known_store = config.stores.iter().any(|s| s.name == job.store);
        let known_generator = config.generators.iter().any(|g| g.name == job.generator);
        if !known_store || !known_generator {
            warn!(
                job = %job.name,
                store = %job.store,
                generator = %job.generator,
                "job references an unknown store or generator"
            );
        }
        orchestrator.add_job(job.clone());
    }

    debug!(?orchestrator, "orchestrator built");
    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rotation::RotationJob;
    use crate::error::Error;
    use tempfile::TempDir;

    fn plaintext_config(tmp: &TempDir) -> Config {
        let mut config = Config::default();
        config.encryption.enabled = false;
        config.backup.encrypt = false;
        config.backup.dir = tmp.path().join("backup");
        config.stores = vec![ComponentConfig::new("file", "file")
            .with_option("path", tmp.path().join("secrets.json").display().to_string())
            .with_option("encrypted", false)];
        config
    }

    #[test]
    fn test_every_generator_kind_builds() {
        for (kind, _) in GENERATOR_KINDS {
            let generator = build_generator(&ComponentConfig::new("g", *kind)).unwrap();
            assert_eq!(generator.kind(), *kind);
            let value = generator.generate().unwrap();
            assert!(generator.validate(&value), "{} rejected its own output", kind);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let err = build_generator(&ComponentConfig::new("g", "quantum")).err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::UnknownKind { .. })));
        let err = build_store(&ComponentConfig::new("s", "cloud"), None).err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::UnknownKind { .. })));
    }

    #[test]
    fn test_bad_options_are_config_errors() {
        let component = ComponentConfig::new("pw", "password").with_option("length", "long");
        let err = build_generator(&component).err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_encrypted_store_needs_cipher() {
        let component = ComponentConfig::new("file", "file");
        let err = build_store(&component, None).err().unwrap();
        assert!(matches!(err, Error::Cipher(CipherError::Disabled)));
    }

    #[test]
    fn test_build_and_rotate() {
        let tmp = TempDir::new().unwrap();
        let mut config = plaintext_config(&tmp);
        config
            .jobs
            .push(RotationJob::new("db", "file", "password", "db_password"));
        config.jobs.push(RotationJob::new("", "file", "password", "x"));

        let orchestrator = build(&config, None).unwrap();
        assert_eq!(orchestrator.jobs().len(), 1);

        let results = orchestrator.rotate_all();
        assert_eq!(results.get("db"), Some(&true));

        let store = orchestrator.store("file").unwrap();
        assert!(store.get("db_password").unwrap().is_some());
        let ledger = orchestrator.ledger().unwrap();
        assert_eq!(ledger.list(Some("db_password"), false).unwrap().len(), 1);
    }

    #[test]
    fn test_build_encrypted() {
        let tmp = TempDir::new().unwrap();
        let cipher = Arc::new(CipherService::open(tmp.path().join(".master.key")).unwrap());
        let mut config = Config::default();
        config.backup.dir = tmp.path().join("backup");
        config.stores = vec![ComponentConfig::new("file", "file")
            .with_option("path", tmp.path().join("secrets.json").display().to_string())];

        let orchestrator = build(&config, Some(Arc::clone(&cipher))).unwrap();
        assert!(orchestrator.ledger().unwrap().encryption_enabled());

        let stores = encrypted_file_stores(&config, &cipher).unwrap();
        assert_eq!(stores.len(), 1);
        assert!(stores[0].is_encrypted());
    }
}
