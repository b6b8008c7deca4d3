//! Execution context.
//!
//! `PROJECT_ROOT`/`BASE_DIR` and the project `.env` are collected once at
//! startup into an explicit [`Context`] and passed by reference, so no
//! component depends on hidden process state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::config::ServiceConfig;
use crate::error::{Error, Result};

/// Default runtime root when `BASE_DIR` is unset.
pub const DEFAULT_BASE_DIR: &str = "/opt/homestack";

/// Container name prefix shared by every managed service.
pub const CONTAINER_PREFIX: &str = "homestack";

/// Internal DNS suffix used in certificate SAN lists.
pub const INTERNAL_DOMAIN: &str = "homestack.internal";

/// Process-wide configuration, constructed once at startup.
#[derive(Debug, Clone)]
pub struct Context {
    /// Where `config/`, `template/` and the project `.env` live.
    pub project_root: PathBuf,
    /// Runtime root holding one directory per service plus `certs/ca` and `backups/`.
    pub base_dir: PathBuf,
    /// Key=value pairs parsed from the project `.env` (credentials, overrides).
    dotenv: BTreeMap<String, String>,
}

impl Context {
    /// Build the context from `PROJECT_ROOT`/`BASE_DIR` and the project `.env`.
    ///
    /// `.env` values are kept in the context rather than exported into the
    /// process environment; explicit environment variables still win.
    pub fn load() -> Result<Self> {
        let project_root = std::env::var_os("PROJECT_ROOT")
            .map(PathBuf::from)
            .map(Ok)
            .unwrap_or_else(std::env::current_dir)?;
        let base_dir = std::env::var_os("BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR));

        Self::at(project_root, base_dir)
    }

    /// Build a context rooted at explicit paths, reading `.env` from the
    /// project root.
    pub fn at(project_root: PathBuf, base_dir: PathBuf) -> Result<Self> {
        let dotenv = parse_dotenv(&project_root.join(".env"))?;
        debug!(
            project_root = %project_root.display(),
            base_dir = %base_dir.display(),
            dotenv_keys = dotenv.len(),
            "context loaded"
        );

        Ok(Self {
            project_root,
            base_dir,
            dotenv,
        })
    }

    /// Look up a credential: process environment first, then the project `.env`.
    pub fn credential(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.dotenv.get(key).cloned())
    }

    /// All `.env` pairs, for template substitution.
    pub fn dotenv(&self) -> &BTreeMap<String, String> {
        &self.dotenv
    }

    /// Path to the project `.env` file.
    pub fn dotenv_path(&self) -> PathBuf {
        self.project_root.join(".env")
    }

    /// Directory holding the per-service YAML configs.
    pub fn config_dir(&self) -> PathBuf {
        self.project_root.join("config")
    }

    /// Template tree for one service.
    pub fn template_dir(&self, service: &str) -> PathBuf {
        self.project_root.join("template").join(service)
    }

    /// Live directory of one service under the runtime root.
    pub fn service_dir(&self, service: &str) -> PathBuf {
        self.base_dir.join(service)
    }

    /// Data directory, honoring a `path.directories.data` override.
    pub fn data_dir(&self, service: &str, cfg: &ServiceConfig) -> PathBuf {
        match cfg.path.directories.data.as_deref() {
            Some(p) => PathBuf::from(p),
            None => self.service_dir(service).join("data"),
        }
    }

    /// Certificate directory, honoring a `path.directories.certs` override.
    /// One bundled service keeps its own TLS layout, which is exactly what
    /// the override exists for.
    pub fn certs_dir(&self, service: &str, cfg: &ServiceConfig) -> PathBuf {
        match cfg.path.directories.certs.as_deref() {
            Some(p) => PathBuf::from(p),
            None => self.service_dir(service).join("certs"),
        }
    }

    /// Config directory inside the service tree (mounted into the container).
    pub fn conf_dir(&self, service: &str) -> PathBuf {
        self.service_dir(service).join("config")
    }

    /// Backup artifact directory for one service.
    pub fn backups_dir(&self, service: &str) -> PathBuf {
        self.base_dir.join("backups").join(service)
    }

    /// Lock file directory.
    pub fn locks_dir(&self) -> PathBuf {
        self.base_dir.join(".locks")
    }

    /// Global root CA paths: `{base}/certs/ca/rootCA.{key,pem}`.
    pub fn ca_dir(&self) -> PathBuf {
        self.base_dir.join("certs").join("ca")
    }

    pub fn ca_key(&self) -> PathBuf {
        self.ca_dir().join("rootCA.key")
    }

    pub fn ca_cert(&self) -> PathBuf {
        self.ca_dir().join("rootCA.pem")
    }

    /// Container name for a service, e.g. `homestack-postgres`.
    pub fn container_name(&self, service: &str) -> String {
        format!("{CONTAINER_PREFIX}-{service}")
    }
}

/// Validate a service name against the identifier allow-list.
///
/// Service names end up in container names, file paths and certificate
/// subjects, so anything outside the allow-list is rejected up front
/// instead of being escaped downstream.
pub fn validate_service_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let head_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let tail_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(Error::InvalidServiceName(name.to_string()))
    }
}

/// Parse a flat dotenv file into a map. Missing file yields an empty map;
/// comments and blank lines are skipped, surrounding quotes are stripped.
fn parse_dotenv(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    if !path.exists() {
        return Ok(map);
    }
    let contents = std::fs::read_to_string(path)?;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            map.insert(key.trim().to_string(), value.to_string());
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ServiceConfig;

    fn ctx(project: &Path, base: &Path) -> Context {
        Context::at(project.to_path_buf(), base.to_path_buf()).unwrap()
    }

    #[test]
    fn standard_paths_derive_from_base_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let c = ctx(tmp.path(), Path::new("/opt/homestack"));
        let cfg = ServiceConfig::default();

        assert_eq!(
            c.data_dir("postgres", &cfg),
            PathBuf::from("/opt/homestack/postgres/data")
        );
        assert_eq!(
            c.certs_dir("postgres", &cfg),
            PathBuf::from("/opt/homestack/postgres/certs")
        );
        assert_eq!(c.ca_cert(), PathBuf::from("/opt/homestack/certs/ca/rootCA.pem"));
        assert_eq!(c.container_name("vault"), "homestack-vault");
    }

    #[test]
    fn path_overrides_win() {
        let tmp = tempfile::TempDir::new().unwrap();
        let c = ctx(tmp.path(), Path::new("/opt/homestack"));
        let mut cfg = ServiceConfig::default();
        cfg.path.directories.data = Some("/srv/pg-data".into());

        assert_eq!(c.data_dir("postgres", &cfg), PathBuf::from("/srv/pg-data"));
    }

    #[test]
    fn dotenv_parsing_skips_comments_and_strips_quotes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        std::fs::write(&path, "# comment\nA=1\nB=\"two\"\n\nC='three'\n").unwrap();

        let map = parse_dotenv(&path).unwrap();
        assert_eq!(map.get("A").unwrap(), "1");
        assert_eq!(map.get("B").unwrap(), "two");
        assert_eq!(map.get("C").unwrap(), "three");
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn service_name_allow_list() {
        assert!(validate_service_name("postgres").is_ok());
        assert!(validate_service_name("elk-stack").is_ok());
        assert!(validate_service_name("Vault").is_err());
        assert!(validate_service_name("pg; rm -rf /").is_err());
        assert!(validate_service_name("").is_err());
        assert!(validate_service_name("1abc").is_err());
    }
}
