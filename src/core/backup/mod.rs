//! Encrypted service backups.
//!
//! One artifact per run: collect into a staging directory (plain file
//! copy, `pg_dump`, or a Vault raft snapshot depending on the service),
//! tar the staging tree, then gpg-encrypt the tarball into
//! `{base}/backups/{service}/{service}_{timestamp}.tar.gz.gpg`.
//!
//! The timestamp format sorts lexicographically in chronological order,
//! so "latest" is always the maximum filename. Restore relies on this.

pub mod crypto;

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::core::config::ServiceConfig;
use crate::core::context::{self, Context};
use crate::core::docker;
use crate::error::{BackupError, ConfigError, Result};

use crypto::Passphrase;

/// Artifact timestamp; lexicographic order equals chronological order.
pub const TIMESTAMP_FMT: &str = "%Y%m%d_%H%M%S";

/// How a service's data is collected for backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupMethod {
    /// Copy the data directory as-is. Only safe while the service is
    /// stopped (or for services that tolerate live file copies).
    #[default]
    Copy,
    /// `pg_dump` inside the running postgres container.
    PgDump,
    /// `vault operator raft snapshot save` inside the running container.
    RaftSnapshot,
}

impl FromStr for BackupMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "copy" => Ok(Self::Copy),
            "pg_dump" => Ok(Self::PgDump),
            "raft_snapshot" => Ok(Self::RaftSnapshot),
            other => Err(other.to_string()),
        }
    }
}

impl BackupMethod {
    /// Resolve the configured method, defaulting to `copy`.
    pub fn from_config(service: &str, cfg: &ServiceConfig) -> Result<Self> {
        match cfg.backup.method.as_deref() {
            None => Ok(Self::default()),
            Some(raw) => raw.parse().map_err(|method| {
                ConfigError::UnknownBackupMethod {
                    service: service.to_string(),
                    method,
                }
                .into()
            }),
        }
    }

    /// Hot methods talk to a running container; `copy` wants it stopped.
    pub fn requires_running(self) -> bool {
        !matches!(self, Self::Copy)
    }
}

/// Create one encrypted artifact for a service. Returns its path.
pub fn backup_data(ctx: &Context, service: &str, cfg: &ServiceConfig) -> Result<PathBuf> {
    context::validate_service_name(service)?;
    let passphrase = Passphrase::from_context(ctx)?;
    let method = BackupMethod::from_config(service, cfg)?;
    debug!(service, ?method, "collecting backup data");

    let staging = tempfile::TempDir::new()?;
    let collected = match method {
        BackupMethod::Copy => collect_copy(ctx, service, cfg, staging.path())?,
        BackupMethod::PgDump => collect_pg_dump(ctx, service, staging.path())?,
        BackupMethod::RaftSnapshot => collect_raft_snapshot(ctx, service, staging.path())?,
    };
    if !collected {
        return Err(BackupError::NothingToBackUp(service.to_string()).into());
    }

    let timestamp = Local::now().format(TIMESTAMP_FMT).to_string();
    let tar_dir = tempfile::TempDir::new()?;
    let tar_file = tar_dir.path().join(format!("{service}_{timestamp}.tar.gz"));
    tar_create(staging.path(), &tar_file)?;

    let backup_dir = ctx.backups_dir(service);
    std::fs::create_dir_all(&backup_dir)?;
    let artifact = backup_dir.join(format!("{service}_{timestamp}.tar.gz.gpg"));
    crypto::encrypt_file(&tar_file, &artifact, &passphrase)?;

    info!(service, artifact = %artifact.display(), "backup complete");
    Ok(artifact)
}

/// Decrypt, unpack and reinstate one artifact.
pub fn restore_data(ctx: &Context, service: &str, cfg: &ServiceConfig, artifact: &Path) -> Result<()> {
    context::validate_service_name(service)?;
    if !artifact.exists() {
        return Err(BackupError::ArtifactMissing(artifact.to_path_buf()).into());
    }
    let passphrase = Passphrase::from_context(ctx)?;
    let method = BackupMethod::from_config(service, cfg)?;
    info!(service, artifact = %artifact.display(), ?method, "restoring");

    let work = tempfile::TempDir::new()?;
    let tar_file = work.path().join("restore.tar.gz");
    crypto::decrypt_file(artifact, &tar_file, &passphrase)?;

    let extract_dir = work.path().join("extract");
    std::fs::create_dir_all(&extract_dir)?;
    tar_extract(&tar_file, &extract_dir)?;

    match method {
        BackupMethod::Copy => restore_copy(ctx, service, cfg, &extract_dir),
        BackupMethod::PgDump => restore_pg_dump(ctx, service, &extract_dir),
        BackupMethod::RaftSnapshot => restore_raft_snapshot(ctx, service, &extract_dir),
    }
}

/// All artifacts for a service, oldest first.
pub fn list_artifacts(ctx: &Context, service: &str) -> Result<Vec<PathBuf>> {
    let dir = ctx.backups_dir(service);
    let mut artifacts = Vec::new();
    if dir.is_dir() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if path.is_file()
                && name.starts_with(&format!("{service}_"))
                && name.ends_with(".tar.gz.gpg")
            {
                artifacts.push(path);
            }
        }
    }
    // Filename order is chronological by the timestamp invariant.
    artifacts.sort();
    Ok(artifacts)
}

/// The newest artifact for a service.
pub fn latest_artifact(ctx: &Context, service: &str) -> Result<PathBuf> {
    list_artifacts(ctx, service)?
        .pop()
        .ok_or_else(|| {
            BackupError::NoBackupsFound {
                service: service.to_string(),
                dir: ctx.backups_dir(service),
            }
            .into()
        })
}

/// Delete all but the `keep` newest artifacts. Returns how many were removed.
pub fn clean(ctx: &Context, service: &str, keep: usize) -> Result<usize> {
    let artifacts = list_artifacts(ctx, service)?;
    if artifacts.len() <= keep {
        debug!(service, count = artifacts.len(), keep, "nothing to clean");
        return Ok(0);
    }
    let excess = artifacts.len() - keep;
    for old in &artifacts[..excess] {
        std::fs::remove_file(old)?;
        info!(service, artifact = %old.display(), "removed old backup");
    }
    Ok(excess)
}

fn collect_copy(ctx: &Context, service: &str, cfg: &ServiceConfig, staging: &Path) -> Result<bool> {
    let src = ctx.data_dir(service, cfg);
    if !src.is_dir() {
        info!(service, dir = %src.display(), "no data directory, nothing to copy");
        return Ok(false);
    }
    // -a preserves ownership and modes, which matter for container volumes.
    run_tool(
        "cp",
        "collect",
        &[
            "-a",
            &src.display().to_string(),
            &staging.join("data").display().to_string(),
        ],
    )?;
    Ok(true)
}

fn collect_pg_dump(ctx: &Context, service: &str, staging: &Path) -> Result<bool> {
    let container = ctx.container_name("postgres");
    let output = docker::exec(&container, &["pg_dump", "-U", "postgres", "postgres"])?;
    std::fs::write(staging.join(format!("{service}_dump.sql")), &output.stdout)?;
    Ok(true)
}

fn collect_raft_snapshot(ctx: &Context, service: &str, staging: &Path) -> Result<bool> {
    let container = ctx.container_name("vault");
    docker::exec_env(
        &container,
        &[("VAULT_ADDR", "https://127.0.0.1:8200")],
        &["vault", "operator", "raft", "snapshot", "save", "/tmp/vault.snap"],
    )?;
    let dst = staging.join(format!("{service}_raft.snap"));
    docker::cp(&format!("{container}:/tmp/vault.snap"), &dst.display().to_string())?;
    Ok(true)
}

fn restore_copy(ctx: &Context, service: &str, cfg: &ServiceConfig, extract_dir: &Path) -> Result<()> {
    let src = extract_dir.join("data");
    if !src.is_dir() {
        return Err(BackupError::ArtifactMissing(src).into());
    }
    let dst = ctx.data_dir(service, cfg);
    std::fs::create_dir_all(&dst)?;
    // Trailing slashes: sync contents, not the directory itself.
    run_tool(
        "rsync",
        "restore",
        &["-a", &format!("{}/", src.display()), &format!("{}/", dst.display())],
    )?;
    info!(service, dst = %dst.display(), "data directory restored");
    Ok(())
}

fn restore_pg_dump(ctx: &Context, service: &str, extract_dir: &Path) -> Result<()> {
    let dump = extract_dir.join(format!("{service}_dump.sql"));
    if !dump.exists() {
        return Err(BackupError::ArtifactMissing(dump).into());
    }
    let container = ctx.container_name("postgres");
    docker::exec_with_stdin(&container, &["psql", "-U", "postgres", "postgres"], &dump)?;
    info!(service, "postgres dump restored");
    Ok(())
}

fn restore_raft_snapshot(ctx: &Context, service: &str, extract_dir: &Path) -> Result<()> {
    let snapshot = extract_dir.join(format!("{service}_raft.snap"));
    if !snapshot.exists() {
        return Err(BackupError::ArtifactMissing(snapshot).into());
    }
    let container = ctx.container_name("vault");
    docker::cp(&snapshot.display().to_string(), &format!("{container}:/tmp/restore.snap"))?;
    docker::exec(
        &container,
        &["vault", "operator", "raft", "snapshot", "restore", "-force", "/tmp/restore.snap"],
    )?;
    warn!(service, "raft snapshot restored; vault may need a restart and unseal");
    Ok(())
}

fn tar_create(src_dir: &Path, tar_file: &Path) -> Result<()> {
    run_tool(
        "tar",
        "compress",
        &[
            "-czf",
            &tar_file.display().to_string(),
            "-C",
            &src_dir.display().to_string(),
            ".",
        ],
    )
}

fn tar_extract(tar_file: &Path, dst_dir: &Path) -> Result<()> {
    run_tool(
        "tar",
        "extract",
        &[
            "-xzf",
            &tar_file.display().to_string(),
            "-C",
            &dst_dir.display().to_string(),
        ],
    )
}

fn run_tool(tool: &'static str, step: &'static str, args: &[&str]) -> Result<()> {
    debug!(tool, step, args = ?args, "running");
    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| BackupError::ToolFailed {
            tool,
            step,
            stderr: e.to_string(),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(BackupError::ToolFailed {
            tool,
            step,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into())
    }
}
