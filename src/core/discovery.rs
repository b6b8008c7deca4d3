//! Service discovery.
//!
//! The active service set is whatever `config/*.yml` declares with
//! `service.enable: true`. Malformed YAML is logged and skipped so one
//! broken file cannot take the whole toolkit down.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::context::Context;
use crate::error::Result;

#[derive(Deserialize, Default)]
#[serde(default)]
struct EnableProbe {
    service: EnableSection,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct EnableSection {
    enable: bool,
}

/// Return the names of all enabled services, sorted by name.
///
/// No priority ordering here; the CLI layer applies the core-first
/// ordering when expanding `all`.
pub fn discover(ctx: &Context) -> Result<Vec<String>> {
    let mut services = Vec::new();
    let config_dir = ctx.config_dir();
    if !config_dir.is_dir() {
        warn!(dir = %config_dir.display(), "config directory missing; no services discovered");
        return Ok(services);
    }

    for entry in std::fs::read_dir(&config_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yml") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let contents = std::fs::read_to_string(&path)?;
        let probe: EnableProbe = match serde_yaml::from_str(&contents) {
            Ok(p) => p,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping malformed service config");
                continue;
            }
        };

        if probe.service.enable {
            services.push(name.to_string());
        } else {
            debug!(service = name, "disabled, skipping");
        }
    }

    services.sort();
    Ok(services)
}
