//! Install or reinstall services.
//!
//! Three modes per service:
//! - default: idempotent, existing data and config are kept
//! - `--reset`: delete the service directory and start clean
//! - `--backup`: back up data, delete the directory, reinstall, restore
//!
//! `--reset` and `--backup` are mutually exclusive (clap enforces it)
//! and both prompt for confirmation unless `--yes` is given.
//!
//! Services with deferred template files get a second phase: after the
//! first healthcheck passes and certificates exist, the container is
//! stopped, the deferred files (TLS overrides) are applied and the
//! service is restarted and checked again.

use std::path::PathBuf;

use dialoguer::Confirm;
use tracing::info;

use crate::cli::{output, resolve_services};
use crate::core::backup;
use crate::core::certs;
use crate::core::config::ServiceConfig;
use crate::core::context::Context;
use crate::core::detect;
use crate::core::docker;
use crate::core::envfile;
use crate::core::health;
use crate::core::lock::LockGuard;
use crate::core::perms;
use crate::core::template;
use crate::error::{ConfigError, Result};

pub fn execute(service: &str, reset: bool, backup: bool, yes: bool) -> Result<()> {
    if service != "all" {
        crate::core::context::validate_service_name(service)?;
    }
    detect::require_tools(detect::BASE_TOOLS)?;
    if backup {
        detect::require_tools(detect::BACKUP_TOOLS)?;
    }

    let ctx = Context::load()?;
    let services = resolve_services(&ctx, service)?;
    if services.is_empty() {
        output::warn("no enabled services found");
        return Ok(());
    }

    if (reset || backup) && !yes && !confirm_destructive(&services, reset)? {
        output::dimmed("aborted");
        return Ok(());
    }

    // One broken service must not block the rest of the batch.
    let mut first_err = None;
    for svc in &services {
        match install_one(&ctx, svc, reset, backup) {
            Ok(()) => output::success(&format!("{svc} installed and healthy")),
            Err(e) => {
                output::error(&format!("{svc}: {e}"));
                first_err.get_or_insert(e);
            }
        }
    }
    match first_err {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

fn confirm_destructive(services: &[String], reset: bool) -> Result<bool> {
    let action = if reset {
        "DELETE the service directory of"
    } else {
        "back up, delete and reinstall"
    };
    Confirm::new()
        .with_prompt(format!("This will {action}: {}. Continue?", services.join(", ")))
        .default(false)
        .interact()
        .map_err(Into::into)
}

fn install_one(ctx: &Context, service: &str, reset: bool, backup: bool) -> Result<()> {
    let _lock = LockGuard::acquire(ctx, service)?;

    let cfg = ServiceConfig::load(ctx, service)?;
    if !cfg.service.enable {
        return Err(ConfigError::NotEnabled(service.to_string()).into());
    }

    output::section(&format!("install {service}"));
    docker::stop_service(ctx, service)?;

    let mut restore_from: Option<PathBuf> = None;
    let service_dir = ctx.service_dir(service);

    if reset {
        info!(service, dir = %service_dir.display(), "reset mode, deleting service directory");
        remove_dir(&service_dir)?;
    } else if backup {
        output::dimmed("backing up before reinstall...");
        let artifact = backup::backup_data(ctx, service, &cfg)?;
        output::kv("backup", artifact.display());
        restore_from = Some(artifact);
        remove_dir(&service_dir)?;
    } else {
        info!(service, "idempotent mode, keeping existing data");
    }

    let report = template::copy_template(ctx, service, &cfg)?;
    output::kv("templates", format!("{} written, {} unchanged", report.written, report.unchanged));

    certs::provision(ctx, service, &cfg, None, false)?;
    perms::apply(ctx, service, &cfg)?;

    // File-copy restores happen on the stopped tree; dump and snapshot
    // restores need the container running and wait until after the check.
    let method = backup::BackupMethod::from_config(service, &cfg)?;
    if !method.requires_running() {
        if let Some(artifact) = restore_from.take() {
            output::dimmed("restoring data...");
            backup::restore_data(ctx, service, &cfg, &artifact)?;
        }
    }

    if let Some(env_path) = envfile::generate_env(ctx, service, &cfg)? {
        output::kv(".env", env_path.display());
    }

    docker::start_service(ctx, service)?;
    health::check_container(ctx, service, health::default_probe(service))?;

    if let Some(artifact) = restore_from {
        output::dimmed("restoring data into the running container...");
        backup::restore_data(ctx, service, &cfg, &artifact)?;
    }

    if !cfg.template.deferred.is_empty() {
        apply_deferred_phase(ctx, service, &cfg)?;
    }
    Ok(())
}

/// Second phase for services with TLS overrides: the override references
/// certificates that only exist after the first phase, so it is applied
/// on a stopped container and verified with a fresh healthcheck.
fn apply_deferred_phase(ctx: &Context, service: &str, cfg: &ServiceConfig) -> Result<()> {
    output::dimmed("applying deferred configuration...");
    docker::stop_service(ctx, service)?;

    let report = template::apply_deferred(ctx, service, cfg)?;
    info!(service, written = report.written, "deferred files applied");
    perms::apply(ctx, service, cfg)?;

    docker::start_service(ctx, service)?;
    health::check_container(ctx, service, health::default_probe(service))?;
    output::success(&format!("{service} reconfigured with deferred overrides"));
    Ok(())
}

fn remove_dir(dir: &PathBuf) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
        info!(dir = %dir.display(), "removed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn disabled_service_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config_dir = tmp.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("ldap.yml"), "service:\n  enable: false\n").unwrap();

        let ctx = Context::at(tmp.path().to_path_buf(), tmp.path().join("base")).unwrap();
        let err = install_one(&ctx, "ldap", false, false).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotEnabled(_))));
    }

    #[test]
    fn missing_config_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ctx = Context::at(tmp.path().to_path_buf(), tmp.path().join("base")).unwrap();
        let err = install_one(&ctx, "ghost", false, false).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotFound(_))));
    }
}
