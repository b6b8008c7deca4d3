//! Homestack - homelab service management over docker compose.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use homestack::cli::output;
use homestack::cli::{execute, Cli};
use homestack::error::{BackupError, ConfigError, Error, HealthError};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("HOMESTACK_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("homestack=debug")
        } else {
            EnvFilter::new("homestack=info")
        }
    });

    // Logs go to stderr; stdout carries only command output.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = execute(cli.command) {
        let suggestion = match &e {
            Error::Config(ConfigError::NotFound(_)) => {
                Some("add a YAML config under config/ for this service")
            }
            Error::Config(ConfigError::NotEnabled(_)) => {
                Some("set service.enable: true in the service config")
            }
            Error::Config(ConfigError::MissingCredential(_)) => {
                Some("add the credential to the project .env")
            }
            Error::Backup(BackupError::NoPassphrase) => {
                Some("set BACKUP_PASSWORD in the environment or the project .env")
            }
            Error::Health(HealthError::VaultUnreachable { .. }) => {
                Some("run: homestack install vault")
            }
            Error::MissingTool(tool) => {
                if *tool == "docker" {
                    Some("install docker and make sure the daemon is running")
                } else {
                    Some("install the missing tool with your package manager")
                }
            }
            Error::ServiceLocked { .. } => {
                Some("wait for the other invocation, or remove the lock file if stale")
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
