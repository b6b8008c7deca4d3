//! Command-line interface.

pub mod backup;
pub mod cert;
pub mod check;
pub mod clean;
pub mod completions;
pub mod cron;
pub mod install;
pub mod output;
pub mod restore;
pub mod rootca_windows;
pub mod vault;

use clap::{Parser, Subcommand};

use crate::core::context::Context;

/// Install order for `all`: infrastructure services before their
/// dependents.
pub const SERVICE_PRIORITY: &[&str] = &["vault", "postgres", "ldap"];

/// Homestack - homelab service management over docker compose.
#[derive(Parser)]
#[command(
    name = "homestack",
    about = "Install, back up and certify homelab services",
    version
)]
pub struct Cli {
    /// Verbose logging (same as HOMESTACK_LOG=homestack=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Install or reinstall a service (or `all`)
    Install {
        /// Service name, or `all` for every enabled service
        #[arg(default_value = "all")]
        service: String,
        /// Delete the service directory and reinstall from scratch
        #[arg(long, conflicts_with = "backup")]
        reset: bool,
        /// Back up data, reinstall, then restore the data
        #[arg(long)]
        backup: bool,
        /// Skip the confirmation prompt for destructive modes
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Create an encrypted backup of a service (or `all`)
    Backup {
        service: String,
        /// Stop the container during the backup even for hot methods
        #[arg(long)]
        cold: bool,
    },

    /// Restore a service from a backup artifact
    Restore {
        service: String,
        /// Artifact path; the newest backup is used when omitted
        artifact: Option<String>,
    },

    /// Generate or renew service certificates
    Cert {
        /// One or more service names
        #[arg(required = true)]
        services: Vec<String>,
        /// Leaf validity in days
        #[arg(long)]
        days: Option<u32>,
        /// Regenerate even if key and certificate already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Initialize Vault (prints unseal keys exactly once)
    InitVault,

    /// Check seal state and walk through manual unsealing
    UnsealVault,

    /// Enable the baseline Vault mounts (KV v2 engine, file audit device)
    SetupVaultBase,

    /// Delete old backup artifacts, keeping the newest N per service
    CleanBackups {
        /// How many artifacts to keep per service
        #[arg(long, default_value_t = 5)]
        keep: usize,
    },

    /// Install backup schedules into the crontab
    SetupCron {
        /// Print the crontab lines instead of installing them
        #[arg(long)]
        print: bool,
    },

    /// Install the root CA into the Windows trust store (WSL2 only)
    InstallRootcaWindows,

    /// Report tool, service and certificate status
    Check {
        /// Service name, or `all` for every enabled service
        #[arg(default_value = "all")]
        service: String,
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

/// Expand `all` into the enabled services in priority order.
pub fn resolve_services(ctx: &Context, service: &str) -> crate::error::Result<Vec<String>> {
    if service != "all" {
        crate::core::context::validate_service_name(service)?;
        return Ok(vec![service.to_string()]);
    }

    let enabled = crate::core::discovery::discover(ctx)?;
    let mut ordered: Vec<String> = SERVICE_PRIORITY
        .iter()
        .filter(|s| enabled.iter().any(|e| e == *s))
        .map(|s| s.to_string())
        .collect();
    for svc in enabled {
        if !ordered.contains(&svc) {
            ordered.push(svc);
        }
    }
    Ok(ordered)
}

/// Execute a command.
pub fn execute(command: Command) -> crate::error::Result<()> {
    use Command::*;

    match command {
        Install {
            service,
            reset,
            backup,
            yes,
        } => install::execute(&service, reset, backup, yes),
        Backup { service, cold } => backup::execute(&service, cold),
        Restore { service, artifact } => restore::execute(&service, artifact.as_deref()),
        Cert {
            services,
            days,
            overwrite,
        } => cert::execute(&services, days, overwrite),
        InitVault => vault::init(),
        UnsealVault => vault::unseal(),
        SetupVaultBase => vault::setup_base(),
        CleanBackups { keep } => clean::execute(keep),
        SetupCron { print } => cron::execute(print),
        InstallRootcaWindows => rootca_windows::execute(),
        Check { service } => check::execute(&service),
        Completions { shell } => completions::execute(shell),
    }
}
