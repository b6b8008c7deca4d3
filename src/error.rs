//! Error types for homestack.
//!
//! One top-level [`Error`] composed of per-domain sub-enums, so the CLI
//! layer can match on the failure class and print an actionable hint.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cert(#[from] CertError),

    #[error(transparent)]
    Docker(#[from] DockerError),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("service `{service}` is locked by another invocation (pid {pid}); remove {path} if stale", path = .path.display())]
    ServiceLocked {
        service: String,
        pid: String,
        path: PathBuf,
    },

    #[error("invalid service name `{0}`: must match ^[a-z][a-z0-9_-]*$")]
    InvalidServiceName(String),

    #[error("required tool not found on PATH: {0}")]
    MissingTool(&'static str),

    #[error("`{command}` failed: {stderr}")]
    HostCommand { command: String, stderr: String },

    #[error("failed to run `{tool}`: {source}")]
    HostSpawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Errors loading the context or a per-service YAML config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to parse {path}: {source}", path = .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown backup method `{method}` for service `{service}` (expected copy, pg_dump or raft_snapshot)")]
    UnknownBackupMethod { service: String, method: String },

    #[error("service `{0}` is not enabled (service.enable is false or missing)")]
    NotEnabled(String),

    #[error("credential `{0}` is not set (in the environment or the project .env)")]
    MissingCredential(&'static str),
}

/// Certificate pipeline failures. All fatal: no retries, no rollback.
#[derive(Error, Debug)]
pub enum CertError {
    #[error("root CA not found at {path}; it must be generated before signing", path = .0.display())]
    RootCaMissing(PathBuf),

    #[error("openssl {step} failed: {stderr}")]
    OpensslFailed { step: &'static str, stderr: String },

    #[error("certificate for `{service}` does not verify against the root CA: {stderr}")]
    VerifyFailed { service: String, stderr: String },
}

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("docker {action} failed: {stderr}")]
    CommandFailed { action: String, stderr: String },

    #[error("compose file not found: {path}", path = .0.display())]
    ComposeFileMissing(PathBuf),

    #[error("failed to spawn docker: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("container for `{service}` did not become ready within {attempts} attempts")]
    Timeout { service: String, attempts: u32 },

    #[error("container for `{service}` reported unhealthy")]
    Unhealthy { service: String },

    #[error("vault health API gave no response after {attempts} attempts")]
    VaultUnreachable { attempts: u32 },

    #[error("vault health request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse health response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("postgres TLS diagnostics failed: {0}")]
    TlsDiagnostics(String),
}

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("BACKUP_PASSWORD is not set (in the environment or the project .env)")]
    NoPassphrase,

    #[error("nothing to back up for `{0}`: no data directory and no hook output")]
    NothingToBackUp(String),

    #[error("no backups found for `{service}` under {dir}", dir = .dir.display())]
    NoBackupsFound { service: String, dir: PathBuf },

    #[error("backup artifact not found: {path}", path = .0.display())]
    ArtifactMissing(PathBuf),

    #[error("{tool} failed during {step}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        step: &'static str,
        stderr: String,
    },
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("gpg encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("gpg decryption failed: {0} (wrong passphrase?)")]
    DecryptionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Path-carrying variants render the path through Display.
    #[test]
    fn path_variants_render_the_path() {
        let p = PathBuf::from("/opt/homestack/certs/ca/rootCA.pem");
        assert_eq!(
            CertError::RootCaMissing(p.clone()).to_string(),
            "root CA not found at /opt/homestack/certs/ca/rootCA.pem; it must be generated before signing"
        );
        assert!(DockerError::ComposeFileMissing(p.clone())
            .to_string()
            .contains("/opt/homestack/certs/ca/rootCA.pem"));
        assert!(BackupError::ArtifactMissing(p)
            .to_string()
            .contains("/opt/homestack/certs/ca/rootCA.pem"));
    }
}
