//! secret-rotator - secret rotation with encrypted backups and master key recovery.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── rotate        # Run rotation jobs
//! │   ├── backups       # Inspect and prune rotation backups
//! │   ├── key           # Master key status and rotation
//! │   └── keys          # Master key backup and restore
//! └── core/             # Core library components
//!     ├── config        # TOML configuration
//!     ├── cipher/       # AES-256-GCM master key cipher, KDF, masking
//!     ├── store/        # SecretStore trait, file and memory stores
//!     ├── generator/    # SecretGenerator trait and built-in kinds
//!     ├── registry      # (kind, factory) tables, config -> orchestrator
//!     ├── rotation      # Rotation jobs and the orchestrator
//!     ├── backup/       # Backup ledger of (old, new) pairs
//!     └── recovery/     # Passphrase packages and Shamir key shares
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use secret_rotator::core::config::Config;
//! use secret_rotator::core::{cipher, registry};
//!
//! # fn main() -> secret_rotator::error::Result<()> {
//! let config = Config::load(&Config::default_path())?;
//! let cipher = cipher::open_if(config.encryption.enabled, &config.encryption.key_file)?;
//! let orchestrator = Arc::new(registry::build(&config, cipher)?);
//! for (job, ok) in orchestrator.rotate_all() {
//!     println!("{job}: {ok}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod error;
