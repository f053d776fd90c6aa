//! Command-line interface.

pub mod backups;
pub mod completions;
pub mod context;
pub mod init;
pub mod key;
pub mod keys;
pub mod output;
pub mod rotate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::constants;
use crate::error::Result;

/// Secret rotation with encrypted backups and master key recovery.
#[derive(Parser)]
#[command(
    name = "secret-rotator",
    about = "Rotate secrets, keep an encrypted trail, and recover the master key",
    version
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "SECRET_ROTATOR_CONFIG",
        default_value = constants::CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Write a default configuration and create the master key
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Rotate every configured job, or a single one
    Rotate {
        /// Only rotate this job
        #[arg(short, long)]
        job: Option<String>,
    },

    /// Inspect and maintain rotation backups
    Backups {
        #[command(subcommand)]
        action: BackupsAction,
    },

    /// Inspect or rotate the master key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Back up and restore the master key
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Rotation backup subcommands.
#[derive(Subcommand)]
pub enum BackupsAction {
    /// List backups, newest first (values masked)
    List {
        /// Only backups for this secret id
        #[arg(short, long)]
        secret: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a backup record is readable and complete
    Verify {
        /// Backup record file
        file: PathBuf,
    },

    /// Delete backups older than the retention period
    Cleanup {
        /// Retention in days (defaults to backup.retention_days)
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Show backup counts and age range
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Master key subcommands.
#[derive(Subcommand)]
pub enum KeyAction {
    /// Show key id, version and age
    Status,

    /// Install a new master key and re-encrypt stores and backups
    Rotate,
}

/// Master key backup subcommands.
#[derive(Subcommand)]
pub enum KeysAction {
    /// Create a passphrase-encrypted key backup
    CreateEncrypted,

    /// Split the key into shares for separate custodians
    CreateSplit {
        /// Number of shares to create
        #[arg(short = 'n', long, default_value_t = 5)]
        shares: u8,
        /// Shares needed to restore
        #[arg(short, long, default_value_t = 3)]
        threshold: u8,
    },

    /// List key backups
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a key backup or share file
    Verify {
        /// Backup package or share file
        file: PathBuf,
        /// Also test the passphrase by decrypting
        #[arg(long)]
        decrypt: bool,
    },

    /// Restore the master key from a package, a key snapshot, or share files
    Restore {
        /// An encrypted package, a saved key file, share files, or a share directory
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Check the backup without installing it
        #[arg(long)]
        verify_only: bool,
    },
}

/// Run a parsed command.
pub fn execute(cli: Cli) -> Result<()> {
    let config = cli.config;
    match cli.command {
        Command::Init { force } => init::execute(&config, force),
        Command::Rotate { job } => rotate::execute(&config, job.as_deref()),
        Command::Backups { action } => match action {
            BackupsAction::List { secret, json } => {
                backups::list(&config, secret.as_deref(), json)
            }
            BackupsAction::Verify { file } => backups::verify(&config, &file),
            BackupsAction::Cleanup { days } => backups::cleanup(&config, days),
            BackupsAction::Summary { json } => backups::summary(&config, json),
        },
        Command::Key { action } => match action {
            KeyAction::Status => key::status(&config),
            KeyAction::Rotate => key::rotate(&config),
        },
        Command::Keys { action } => match action {
            KeysAction::CreateEncrypted => keys::create_encrypted(&config),
            KeysAction::CreateSplit { shares, threshold } => {
                keys::create_split(&config, shares, threshold)
            }
            KeysAction::List { json } => keys::list(&config, json),
            KeysAction::Verify { file, decrypt } => keys::verify(&config, &file, decrypt),
            KeysAction::Restore { files, verify_only } => {
                keys::restore(&config, &files, verify_only)
            }
        },
        Command::Completions { shell } => completions::execute(shell),
    }
}
