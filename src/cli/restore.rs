//! Restore a service from an encrypted backup artifact.

use std::path::{Path, PathBuf};

use crate::cli::output;
use crate::core::backup::{self, BackupMethod};
use crate::core::config::ServiceConfig;
use crate::core::context::{self, Context};
use crate::core::detect;
use crate::core::docker;
use crate::core::envfile;
use crate::core::health;
use crate::core::lock::LockGuard;
use crate::core::perms;
use crate::error::Result;

pub fn execute(service: &str, artifact: Option<&str>) -> Result<()> {
    context::validate_service_name(service)?;
    detect::require_tools(detect::BASE_TOOLS)?;
    detect::require_tools(detect::BACKUP_TOOLS)?;

    let ctx = Context::load()?;
    let _lock = LockGuard::acquire(&ctx, service)?;
    let cfg = ServiceConfig::load_or_default(&ctx, service)?;

    let artifact = match artifact {
        Some(path) => PathBuf::from(path),
        None => {
            let latest = backup::latest_artifact(&ctx, service)?;
            output::kv("latest backup", latest.display());
            latest
        }
    };

    let method = BackupMethod::from_config(service, &cfg)?;
    if method.requires_running() {
        // The container ingests the dump/snapshot itself.
        docker::start_service(&ctx, service)?;
        health::check_container(&ctx, service, health::default_probe(service))?;
        backup::restore_data(&ctx, service, &cfg, &artifact)?;
    } else {
        docker::stop_service(&ctx, service)?;
        restore_stopped(&ctx, service, &cfg, &artifact)?;
        docker::start_service(&ctx, service)?;
        health::check_container(&ctx, service, health::default_probe(service))?;
    }

    output::success(&format!("{service} restored"));
    Ok(())
}

/// Data restore onto the stopped tree: unpack, reset ownership and
/// modes, regenerate the `.env`.
fn restore_stopped(
    ctx: &Context,
    service: &str,
    cfg: &ServiceConfig,
    artifact: &Path,
) -> Result<()> {
    backup::restore_data(ctx, service, cfg, artifact)?;
    // rsync recreates the tree with the caller's ownership.
    perms::apply(ctx, service, cfg)?;

    if let Some(env_path) = envfile::generate_env(ctx, service, cfg)? {
        output::kv(".env", env_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PermissionSpec;
    use crate::core::detect;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn stopped_restore_reapplies_permissions() {
        for tool in ["tar", "gpg", "rsync"] {
            if !detect::tool_available(tool) {
                eprintln!("SKIPPED: {tool} not available");
                return;
            }
        }

        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join(".env"), "BACKUP_PASSWORD=pw\n").unwrap();
        let ctx = Context::at(tmp.path().to_path_buf(), tmp.path().join("base")).unwrap();

        let data = ctx.service_dir("ldap").join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("app.db"), b"bytes").unwrap();

        let mut cfg = ServiceConfig::default();
        cfg.permissions.push(PermissionSpec {
            path: "data".to_string(),
            owner: None,
            group: None,
            mode: Some("700".to_string()),
        });

        let artifact = backup::backup_data(&ctx, "ldap", &cfg).unwrap();
        std::fs::remove_dir_all(ctx.service_dir("ldap")).unwrap();

        restore_stopped(&ctx, "ldap", &cfg, &artifact).unwrap();

        assert_eq!(std::fs::read(data.join("app.db")).unwrap(), b"bytes");
        let mode = std::fs::metadata(&data).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }
}
