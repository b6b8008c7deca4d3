//! Per-service YAML configuration.
//!
//! One file per service under `config/`, e.g. `config/postgres.yml`:
//!
//! ```yaml
//! service:
//!   enable: true
//! backup:
//!   method: pg_dump
//!   mode: hot
//!   schedule: "0 3 * * *"
//! permissions:
//!   - path: certs/postgres.key
//!     owner: "999"
//!     group: "999"
//!     mode: "600"
//! template:
//!   deferred:
//!     - docker-compose.override.yml
//! compose_vars:
//!   POSTGRES_PORT: "5432"
//! env_vars:
//!   POSTGRES_DB: homestack
//! entry_vars: {}
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::core::context::Context;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    pub path: PathSection,
    pub backup: BackupSection,
    pub cert: CertSection,
    pub template: TemplateSection,
    pub permissions: Vec<PermissionSpec>,
    /// Variables for docker-compose interpolation (ports, image tags).
    pub compose_vars: BTreeMap<String, String>,
    /// Variables injected into the container environment.
    pub env_vars: BTreeMap<String, String>,
    /// Variables consumed by entrypoint scripts.
    pub entry_vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub enable: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathSection {
    pub directories: DirectoryOverrides,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryOverrides {
    pub data: Option<String>,
    pub certs: Option<String>,
    pub config: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackupSection {
    /// `copy` (default), `pg_dump` or `raft_snapshot`.
    pub method: Option<String>,
    /// `hot` or `cold` (default).
    pub mode: Option<String>,
    /// Cron expression consumed by `setup-cron`.
    pub schedule: Option<String>,
}

impl BackupSection {
    pub fn is_hot(&self) -> bool {
        self.mode.as_deref().is_some_and(|m| m.eq_ignore_ascii_case("hot"))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CertSection {
    /// SAN entries overriding the default convention, e.g. `DNS:db.lan`.
    pub san: Option<Vec<String>>,
    /// Leaf validity in days, overriding the CLI default.
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplateSection {
    /// Relative paths excluded from the first template pass and applied
    /// explicitly after certificates exist (TLS overrides crash their
    /// container when applied before the certs are on disk).
    pub deferred: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionSpec {
    /// Path relative to the service directory (absolute paths allowed).
    pub path: String,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<String>,
}

impl ServiceConfig {
    /// Load `config/{service}.yml`. A missing file is an error here;
    /// discovery treats it as "not enabled" instead.
    pub fn load(ctx: &Context, service: &str) -> Result<Self> {
        let path = config_path(ctx, service);
        if !path.exists() {
            return Err(ConfigError::NotFound(path).into());
        }
        let contents = std::fs::read_to_string(&path)?;
        let cfg: ServiceConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        debug!(service, path = %path.display(), "service config loaded");
        Ok(cfg)
    }

    /// Load the config if the file exists, otherwise fall back to defaults.
    /// Used by steps that must work for services without a config file.
    pub fn load_or_default(ctx: &Context, service: &str) -> Result<Self> {
        let path = config_path(ctx, service);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(ctx, service)
    }
}

pub fn config_path(ctx: &Context, service: &str) -> PathBuf {
    ctx.config_dir().join(format!("{service}.yml"))
}
