//! Back up one service or all enabled services.

use std::path::PathBuf;

use tracing::warn;

use crate::cli::{output, resolve_services};
use crate::core::backup::{self, BackupMethod};
use crate::core::config::ServiceConfig;
use crate::core::context::Context;
use crate::core::detect;
use crate::core::docker;
use crate::core::lock::LockGuard;
use crate::error::Result;

pub fn execute(service: &str, cold: bool) -> Result<()> {
    if service != "all" {
        crate::core::context::validate_service_name(service)?;
    }
    detect::require_tools(detect::BASE_TOOLS)?;
    detect::require_tools(detect::BACKUP_TOOLS)?;

    let ctx = Context::load()?;
    let services = resolve_services(&ctx, service)?;

    // One broken service must not block the rest of the batch.
    let mut backed_up = 0;
    let mut first_err = None;
    for svc in &services {
        match backup_one(&ctx, svc, cold) {
            Ok(artifact) => {
                output::success(&format!("{svc} backed up"));
                output::kv("artifact", artifact.display());
                backed_up += 1;
            }
            Err(e) => {
                output::error(&format!("{svc}: {e}"));
                first_err.get_or_insert(e);
            }
        }
    }

    if backed_up == 0 && first_err.is_none() {
        output::dimmed("nothing to back up");
    }
    match first_err {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

fn backup_one(ctx: &Context, svc: &str, cold: bool) -> Result<PathBuf> {
    let _lock = LockGuard::acquire(ctx, svc)?;
    let cfg = ServiceConfig::load_or_default(ctx, svc)?;
    let method = BackupMethod::from_config(svc, &cfg)?;

    // Dump and snapshot methods talk to the running container; a file
    // copy wants the container quiet unless the config marks it hot.
    let stop_first = if method.requires_running() {
        if cold {
            warn!(service = %svc, "--cold ignored: {method:?} needs a running container");
        }
        false
    } else {
        cold || !cfg.backup.is_hot()
    };

    let was_running = !docker::running_containers(&ctx.container_name(svc))?.is_empty();
    if stop_first && was_running {
        docker::stop_service(ctx, svc)?;
    }

    let result = backup::backup_data(ctx, svc, &cfg);

    if stop_first && was_running {
        docker::start_service(ctx, svc)?;
    }

    result
}
