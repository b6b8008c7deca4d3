//! Vault operator helpers.
//!
//! Initialization is deliberately interactive-adjacent: the unseal keys
//! and root token print exactly once, so `operator init` runs with
//! inherited stdio and nothing is captured or persisted here. Unsealing
//! itself stays manual; this module only checks state and guides.

use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{info, warn};

use crate::core::context::Context;
use crate::core::docker;
use crate::error::{DockerError, HealthError, Result};

pub const KEY_SHARES: u32 = 5;
pub const KEY_THRESHOLD: u32 = 3;

/// Parsed `vault status -format=json`.
#[derive(Debug, Deserialize)]
pub struct VaultStatus {
    #[serde(default)]
    pub initialized: bool,
    #[serde(default = "default_sealed")]
    pub sealed: bool,
    #[serde(default = "default_threshold", alias = "threshold")]
    pub t: u32,
}

fn default_sealed() -> bool {
    true
}

fn default_threshold() -> u32 {
    KEY_THRESHOLD
}

/// Whether the vault container is currently running.
pub fn container_running(ctx: &Context) -> Result<bool> {
    let container = ctx.container_name("vault");
    let names = docker::running_containers(&container)?;
    Ok(names.iter().any(|n| n == &container))
}

/// `vault status -format=json` inside the container.
///
/// `vault status` exits non-zero while sealed, so the JSON is parsed
/// from whatever came back; an unparseable answer is treated as a
/// sealed-but-initialized node, which is the safe guess for guidance.
pub fn status(ctx: &Context) -> Result<VaultStatus> {
    let container = ctx.container_name("vault");
    let output = docker::exec_unchecked(&container, &["vault", "status", "-format=json"])?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    match serde_json::from_str::<VaultStatus>(&stdout) {
        Ok(status) => Ok(status),
        Err(e) => {
            warn!(error = %e, "could not parse vault status, assuming sealed");
            Ok(VaultStatus {
                initialized: true,
                sealed: true,
                t: KEY_THRESHOLD,
            })
        }
    }
}

/// `vault operator init` with inherited stdio.
///
/// Returns `Ok(false)` when Vault was already initialized, `Ok(true)`
/// after a fresh initialization whose output went straight to the
/// terminal.
pub fn operator_init(ctx: &Context) -> Result<bool> {
    let container = ctx.container_name("vault");

    // stdout/stderr inherit so the one-time key material is never
    // buffered or logged by this process.
    let status = Command::new("docker")
        .args([
            "exec",
            "-i",
            &container,
            "vault",
            "operator",
            "init",
            &format!("-key-shares={KEY_SHARES}"),
            &format!("-key-threshold={KEY_THRESHOLD}"),
            "-format=json",
        ])
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(DockerError::Spawn)?
        .wait_with_output()
        .map_err(DockerError::Spawn)?;

    if status.status.success() {
        info!("vault initialized");
        return Ok(true);
    }

    let stderr = String::from_utf8_lossy(&status.stderr);
    if docker::is_already_exists(&stderr) {
        info!("vault is already initialized");
        Ok(false)
    } else {
        Err(DockerError::CommandFailed {
            action: "vault operator init".to_string(),
            stderr: stderr.trim().to_string(),
        }
        .into())
    }
}

/// Verify the health API answers at all; used by `check`.
pub fn reachable(ctx: &Context) -> Result<()> {
    if !container_running(ctx)? {
        return Err(HealthError::VaultUnreachable { attempts: 0 }.into());
    }
    Ok(())
}

/// Baseline mounts for a freshly unsealed Vault: a KV v2 secrets engine
/// at `secret/` and a file audit device. Both are idempotent; re-enabling
/// an existing mount downgrades to info. Returns how many were newly
/// enabled.
pub fn setup_base(ctx: &Context, token: &str) -> Result<usize> {
    let mut applied = 0;
    if enable(
        ctx,
        token,
        &["vault", "secrets", "enable", "-path=secret", "kv-v2"],
        "secrets enable kv-v2",
    )? {
        applied += 1;
    }
    if enable(
        ctx,
        token,
        &[
            "vault",
            "audit",
            "enable",
            "file",
            "file_path=/vault/logs/audit.log",
        ],
        "audit enable file",
    )? {
        applied += 1;
    }
    Ok(applied)
}

fn enable(ctx: &Context, token: &str, cmd: &[&str], action: &str) -> Result<bool> {
    let container = ctx.container_name("vault");
    let output = docker::exec_env_unchecked(
        &container,
        &[
            ("VAULT_ADDR", "https://127.0.0.1:8200"),
            ("VAULT_SKIP_VERIFY", "true"),
            ("VAULT_TOKEN", token),
        ],
        cmd,
    )?;
    if output.status.success() {
        info!(action, "enabled");
        return Ok(true);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if is_already_enabled(&stderr) {
        info!(action, "already enabled");
        Ok(false)
    } else {
        Err(DockerError::CommandFailed {
            action: action.to_string(),
            stderr: stderr.trim().to_string(),
        }
        .into())
    }
}

/// Vault reports a re-enabled mount as "path is already in use".
fn is_already_enabled(stderr: &str) -> bool {
    let low = stderr.to_lowercase();
    docker::is_already_exists(&low) || low.contains("already in use") || low.contains("already enabled")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_threshold_alias() {
        let s: VaultStatus =
            serde_json::from_str(r#"{"initialized":true,"sealed":false,"t":3}"#).unwrap();
        assert!(s.initialized);
        assert!(!s.sealed);
        assert_eq!(s.t, 3);

        let s: VaultStatus =
            serde_json::from_str(r#"{"initialized":true,"sealed":true,"threshold":2}"#).unwrap();
        assert_eq!(s.t, 2);
    }

    #[test]
    fn status_defaults_are_conservative() {
        let s: VaultStatus = serde_json::from_str("{}").unwrap();
        assert!(!s.initialized);
        assert!(s.sealed);
        assert_eq!(s.t, KEY_THRESHOLD);
    }

    #[test]
    fn re_enabled_mounts_are_not_failures() {
        assert!(is_already_enabled(
            "Error enabling: path is already in use at secret/"
        ));
        assert!(is_already_enabled("audit device is already enabled"));
        assert!(!is_already_enabled("permission denied"));
    }
}
