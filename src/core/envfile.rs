//! Per-service `.env` generation.
//!
//! Four layers merge with strictly increasing priority:
//! project `.env` section < `compose_vars` < `env_vars` < `entry_vars`.
//! Standard path variables are injected on top, and the result is written
//! atomically with mode 600. An empty merge writes nothing.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::core::config::ServiceConfig;
use crate::core::context::Context;
use crate::error::Result;

/// Extract `key=value` pairs from the section of a dotenv file introduced
/// by a `# SECTION` comment. The header matches by prefix, so
/// `# POSTGRES` and `# POSTGRES compose vars` both open the `postgres`
/// section. A blank line closes it.
pub fn extract_section(env_path: &Path, section: &str) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    if !env_path.exists() {
        return Ok(vars);
    }

    let prefix = format!("# {}", section.to_uppercase());
    let mut in_section = false;

    let contents = std::fs::read_to_string(env_path)?;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            in_section = false;
            continue;
        }
        if line.starts_with('#') {
            in_section = line.starts_with(&prefix);
            continue;
        }
        if in_section {
            if let Some((k, v)) = line.split_once('=') {
                vars.insert(k.trim().to_string(), v.trim().to_string());
            }
        }
    }
    Ok(vars)
}

/// Merge the four variable layers plus the injected path variables.
/// Later layers win on key collision.
pub fn merged_vars(
    ctx: &Context,
    service: &str,
    cfg: &ServiceConfig,
) -> Result<BTreeMap<String, String>> {
    let mut merged = extract_section(&ctx.dotenv_path(), service)?;
    for (k, v) in &cfg.compose_vars {
        merged.insert(k.clone(), v.clone());
    }
    for (k, v) in &cfg.env_vars {
        merged.insert(k.clone(), v.clone());
    }
    for (k, v) in &cfg.entry_vars {
        merged.insert(k.clone(), v.clone());
    }

    // Standard paths are forced regardless of YAML overrides so compose
    // files can rely on a single convention.
    let home = ctx.service_dir(service);
    merged.insert("DATA_DIR".into(), home.join("data").display().to_string());
    merged.insert("CONF_DIR".into(), home.join("config").display().to_string());
    merged.insert("CERTS_DIR".into(), home.join("certs").display().to_string());

    Ok(merged)
}

/// Materialize `{base}/{service}/.env`.
///
/// Returns `None` when there is nothing to write: either the merge is
/// empty apart from variables no compose file will read, or the service
/// directory does not exist yet. The write goes through a temp file in
/// the target directory and a rename, so a crash never leaves a partial
/// `.env` behind.
pub fn generate_env(ctx: &Context, service: &str, cfg: &ServiceConfig) -> Result<Option<PathBuf>> {
    let service_dir = ctx.service_dir(service);
    if !service_dir.is_dir() {
        info!(service, dir = %service_dir.display(), "service directory missing, skipping .env");
        return Ok(None);
    }

    // The injected path vars alone do not justify a file; only write when
    // the service actually declared variables somewhere.
    let declared = !extract_section(&ctx.dotenv_path(), service)?.is_empty()
        || !cfg.compose_vars.is_empty()
        || !cfg.env_vars.is_empty()
        || !cfg.entry_vars.is_empty();
    if !declared {
        info!(service, "no variables declared, skipping .env");
        return Ok(None);
    }

    let merged = merged_vars(ctx, service, cfg)?;
    let output = service_dir.join(".env");

    let mut tmp = NamedTempFile::new_in(&service_dir)?;
    for (k, v) in &merged {
        writeln!(tmp, "{k}={v}")?;
    }
    tmp.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(&output).map_err(|e| e.error)?;
    debug!(service, path = %output.display(), vars = merged.len(), ".env written");
    Ok(Some(output))
}
