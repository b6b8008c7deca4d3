//! Ownership and mode application.
//!
//! Container volumes usually need numeric uid/gid ownership matching the
//! in-container user (e.g. postgres runs as 999). Specs come from the
//! `permissions` list in the service config; relative paths resolve
//! against the service directory. A spec whose path does not exist yet
//! is skipped, since install order creates some files after this step.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::core::config::{PermissionSpec, ServiceConfig};
use crate::core::context::Context;
use crate::error::{Error, Result};

/// Apply every permission spec for a service. Returns how many applied.
pub fn apply(ctx: &Context, service: &str, cfg: &ServiceConfig) -> Result<usize> {
    let service_dir = ctx.service_dir(service);
    let mut applied = 0;

    for spec in &cfg.permissions {
        let target = resolve(&service_dir, &spec.path);
        if !target.exists() {
            debug!(service, path = %target.display(), "permission target absent, skipping");
            continue;
        }
        apply_one(&target, spec)?;
        applied += 1;
    }

    if applied > 0 {
        info!(service, applied, "permissions applied");
    }
    Ok(applied)
}

fn apply_one(target: &Path, spec: &PermissionSpec) -> Result<()> {
    if let Some(owner) = owner_arg(spec) {
        run("chown", &["-R", &owner, &target.display().to_string()])?;
    }
    if let Some(mode) = spec.mode.as_deref() {
        run("chmod", &["-R", mode, &target.display().to_string()])?;
    }
    debug!(path = %target.display(), owner = ?spec.owner, mode = ?spec.mode, "applied");
    Ok(())
}

/// `owner`, `owner:group` or `:group` for chown; `None` when neither set.
pub fn owner_arg(spec: &PermissionSpec) -> Option<String> {
    match (spec.owner.as_deref(), spec.group.as_deref()) {
        (None, None) => None,
        (Some(o), None) => Some(o.to_string()),
        (None, Some(g)) => Some(format!(":{g}")),
        (Some(o), Some(g)) => Some(format!("{o}:{g}")),
    }
}

pub fn resolve(service_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        service_dir.join(p)
    }
}

fn run(tool: &'static str, args: &[&str]) -> Result<()> {
    let output = Command::new(tool)
        .args(args)
        .output()
        .map_err(|source| Error::HostSpawn { tool, source })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::HostCommand {
            command: format!("{tool} {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(owner: Option<&str>, group: Option<&str>) -> PermissionSpec {
        PermissionSpec {
            path: "data".to_string(),
            owner: owner.map(str::to_string),
            group: group.map(str::to_string),
            mode: None,
        }
    }

    #[test]
    fn owner_argument_forms() {
        assert_eq!(owner_arg(&spec(None, None)), None);
        assert_eq!(owner_arg(&spec(Some("999"), None)).unwrap(), "999");
        assert_eq!(owner_arg(&spec(None, Some("999"))).unwrap(), ":999");
        assert_eq!(owner_arg(&spec(Some("999"), Some("999"))).unwrap(), "999:999");
    }

    #[test]
    fn relative_paths_resolve_against_service_dir() {
        let dir = Path::new("/opt/homestack/postgres");
        assert_eq!(
            resolve(dir, "certs/postgres.key"),
            PathBuf::from("/opt/homestack/postgres/certs/postgres.key")
        );
        assert_eq!(resolve(dir, "/etc/custom"), PathBuf::from("/etc/custom"));
    }

    #[test]
    fn absent_targets_are_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ctx = Context::at(tmp.path().to_path_buf(), tmp.path().join("base")).unwrap();
        let mut cfg = ServiceConfig::default();
        cfg.permissions.push(PermissionSpec {
            path: "does/not/exist".to_string(),
            owner: Some("999".to_string()),
            group: None,
            mode: Some("600".to_string()),
        });
        assert_eq!(apply(&ctx, "postgres", &cfg).unwrap(), 0);
    }

    #[test]
    fn chmod_failure_surfaces_host_command_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ctx = Context::at(tmp.path().to_path_buf(), tmp.path().join("base")).unwrap();
        std::fs::create_dir_all(ctx.service_dir("postgres").join("data")).unwrap();

        let mut cfg = ServiceConfig::default();
        cfg.permissions.push(PermissionSpec {
            path: "data".to_string(),
            owner: None,
            group: None,
            mode: Some("not-a-mode".to_string()),
        });
        let err = apply(&ctx, "postgres", &cfg).unwrap_err();
        assert!(matches!(err, Error::HostCommand { .. }));
    }
}
