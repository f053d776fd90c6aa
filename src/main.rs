//! secret-rotator: rotate secrets, keep an encrypted trail, recover the master key.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use secret_rotator::cli::output;
use secret_rotator::cli::{execute, Cli};
use secret_rotator::core::constants::LOG_ENV;
use secret_rotator::error::{CipherError, ConfigError, Error, IntegrityError, RecoveryError};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("secret_rotator=debug")
        } else {
            EnvFilter::new("secret_rotator=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    if let Err(e) = execute(cli) {
        let suggestion = match &e {
            Error::Config(ConfigError::NotInitialized(_)) => Some("run: secret-rotator init"),
            Error::Config(ConfigError::AlreadyInitialized(_)) => {
                Some("pass --force to overwrite it")
            }
            Error::Cipher(CipherError::Disabled) => {
                Some("set encryption.enabled = true in the config")
            }
            Error::Cipher(CipherError::DecryptionFailed(_)) => {
                Some("check the passphrase or master key")
            }
            Error::Integrity(IntegrityError::KeyIdMismatch { .. }) => {
                Some("restore the master key: secret-rotator keys restore <backup>")
            }
            Error::Recovery(RecoveryError::NoActiveKey(_)) => Some("run: secret-rotator init"),
            Error::Recovery(RecoveryError::InsufficientShares { .. }) => {
                Some("collect more share files from their custodians")
            }
            _ => None,
        };

        output::error(&e.to_string());
        if let Some(hint) = suggestion {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}
