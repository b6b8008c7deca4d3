//! Template provisioning.
//!
//! Mirrors `{project_root}/template/{service}` into the live service
//! directory, substituting `${VAR}` and `${VAR:-default}` tokens from the
//! context, the project `.env` and the service config. Writes only happen
//! when the rendered content differs from what is on disk, so repeated
//! installs do not churn timestamps or permissions.
//!
//! Files listed in `template.deferred` are skipped here and rendered by
//! [`apply_deferred`] once certificates exist; applying a TLS override
//! before its certificate is on disk crashes the dependent container.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::config::ServiceConfig;
use crate::core::context::Context;
use crate::error::Result;

/// Outcome of one template pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub written: usize,
    pub unchanged: usize,
    pub deferred: usize,
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid regex"))
}

/// Substitute `${VAR}` / `${VAR:-default}` tokens.
///
/// Unknown variables without a default are left verbatim so compose-time
/// interpolation can still pick them up from the generated `.env`.
pub fn substitute(content: &str, vars: &BTreeMap<String, String>) -> String {
    token_re()
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match vars.get(key) {
                Some(v) => v.clone(),
                None => match caps.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => caps[0].to_string(),
                },
            }
        })
        .into_owned()
}

/// Variables available to template substitution.
pub fn template_vars(
    ctx: &Context,
    service: &str,
    cfg: &ServiceConfig,
) -> BTreeMap<String, String> {
    let mut vars: BTreeMap<String, String> = ctx.dotenv().clone();
    for layer in [&cfg.compose_vars, &cfg.env_vars, &cfg.entry_vars] {
        for (k, v) in layer {
            vars.insert(k.clone(), v.clone());
        }
    }

    let home = ctx.service_dir(service);
    vars.insert("PROJECT_ROOT".into(), ctx.project_root.display().to_string());
    vars.insert("BASE_DIR".into(), ctx.base_dir.display().to_string());
    vars.insert("SERVICE".into(), service.to_string());
    vars.insert("DATA_DIR".into(), home.join("data").display().to_string());
    vars.insert("CONF_DIR".into(), home.join("config").display().to_string());
    vars.insert("CERTS_DIR".into(), home.join("certs").display().to_string());
    vars
}

/// First template pass: everything except the deferred files.
pub fn copy_template(ctx: &Context, service: &str, cfg: &ServiceConfig) -> Result<CopyReport> {
    render_tree(ctx, service, cfg, Pass::Initial)
}

/// Second pass: only the deferred files. Call after certificates exist.
pub fn apply_deferred(ctx: &Context, service: &str, cfg: &ServiceConfig) -> Result<CopyReport> {
    if cfg.template.deferred.is_empty() {
        return Ok(CopyReport::default());
    }
    render_tree(ctx, service, cfg, Pass::DeferredOnly)
}

#[derive(Clone, Copy, PartialEq)]
enum Pass {
    Initial,
    DeferredOnly,
}

fn render_tree(ctx: &Context, service: &str, cfg: &ServiceConfig, pass: Pass) -> Result<CopyReport> {
    let template_dir = ctx.template_dir(service);
    let target_dir = ctx.service_dir(service);
    let mut report = CopyReport::default();

    if !template_dir.is_dir() {
        warn!(service, dir = %template_dir.display(), "no template directory");
        return Ok(report);
    }

    let vars = template_vars(ctx, service, cfg);

    for entry in WalkDir::new(&template_dir).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&template_dir)
            .expect("walkdir stays under its root");
        let rel_str = rel.to_string_lossy();

        let is_deferred = cfg.template.deferred.iter().any(|d| d == rel_str.as_ref());
        match pass {
            Pass::Initial if is_deferred => {
                debug!(service, file = %rel_str, "deferred to second pass");
                report.deferred += 1;
                continue;
            }
            Pass::DeferredOnly if !is_deferred => continue,
            _ => {}
        }

        // Binary assets (keystores, images) carry no tokens and are
        // copied verbatim.
        let raw = std::fs::read(entry.path())?;
        let rendered = match std::str::from_utf8(&raw) {
            Ok(text) => substitute(text, &vars).into_bytes(),
            Err(_) => {
                debug!(service, file = %rel_str, "non-text asset, copying verbatim");
                raw
            }
        };
        let target = target_dir.join(rel);

        if file_matches(&target, &rendered)? {
            report.unchanged += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, rendered)?;
        debug!(service, file = %rel_str, "rendered");
        report.written += 1;
    }

    info!(
        service,
        written = report.written,
        unchanged = report.unchanged,
        deferred = report.deferred,
        "template pass complete"
    );
    Ok(report)
}

/// Content comparison only; timestamps and ownership are irrelevant.
fn file_matches(path: &Path, rendered: &[u8]) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    Ok(std::fs::read(path)? == rendered)
}
