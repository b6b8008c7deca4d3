//! Docker CLI wrappers.
//!
//! Thin argument-vector wrappers over `docker`; nothing here goes through
//! a shell, and container names are always derived from the validated
//! service name plus the fixed prefix.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::{debug, info, warn};

use crate::core::context::{self, Context};
use crate::error::{DockerError, Result};

/// Shared bridge network joining every managed container.
pub const NETWORK: &str = "homestack-net";

/// Run docker with captured output, surfacing non-zero exit as an error.
fn docker_ok(action: &str, args: &[&str]) -> Result<Output> {
    let output = docker_raw(args)?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(DockerError::CommandFailed {
            action: action.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into())
    }
}

fn docker_raw(args: &[&str]) -> Result<Output> {
    debug!(args = ?args, "docker");
    Command::new("docker")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| DockerError::Spawn(e).into())
}

/// Names of running containers whose name matches the filter.
pub fn running_containers(name_filter: &str) -> Result<Vec<String>> {
    let output = docker_ok(
        "ps",
        &[
            "ps",
            "--filter",
            &format!("name={name_filter}"),
            "--format",
            "{{.Names}}",
        ],
    )?;
    Ok(lines(&output.stdout))
}

/// Status strings (`Up 3 seconds (healthy)` etc.) of matching containers.
pub fn container_statuses(name_filter: &str) -> Result<Vec<String>> {
    let output = docker_ok(
        "ps",
        &[
            "ps",
            "--filter",
            &format!("name={name_filter}"),
            "--format",
            "{{.Status}}",
        ],
    )?;
    Ok(lines(&output.stdout))
}

/// Stop every running container matching the service, then verify none
/// are left. Nothing running is not an error.
pub fn stop_service(ctx: &Context, service: &str) -> Result<()> {
    context::validate_service_name(service)?;
    let filter = ctx.container_name(service);

    let containers = running_containers(&filter)?;
    if containers.is_empty() {
        info!(service, "no running containers");
        return Ok(());
    }

    debug!(service, containers = ?containers, "stopping");
    for container in &containers {
        docker_ok("stop", &["stop", container])?;
    }

    let remaining = running_containers(&filter)?;
    if remaining.is_empty() {
        info!(service, stopped = containers.len(), "containers stopped");
        Ok(())
    } else {
        Err(DockerError::CommandFailed {
            action: format!("stop {service}"),
            stderr: format!("still running: {}", remaining.join(", ")),
        }
        .into())
    }
}

/// `docker compose up -d` for one service. The compose file must exist
/// and the shared network is created on demand.
pub fn start_service(ctx: &Context, service: &str) -> Result<()> {
    context::validate_service_name(service)?;
    let service_dir = ctx.service_dir(service);
    let compose = service_dir.join("docker-compose.yml");
    if !compose.exists() {
        return Err(DockerError::ComposeFileMissing(compose).into());
    }

    ensure_network()?;

    docker_ok(
        "compose up",
        &[
            "compose",
            "--project-directory",
            &service_dir.display().to_string(),
            "up",
            "-d",
        ],
    )?;
    info!(service, "containers started");
    Ok(())
}

/// Create the shared bridge network when absent. The expected conflict
/// on re-creation is informational, not a failure.
pub fn ensure_network() -> Result<()> {
    let output = docker_raw(&["network", "create", "--driver", "bridge", NETWORK])?;
    if output.status.success() {
        info!(network = NETWORK, "network created");
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if is_already_exists(&stderr) {
        debug!(network = NETWORK, "network already exists");
        Ok(())
    } else {
        Err(DockerError::CommandFailed {
            action: "network create".to_string(),
            stderr: stderr.trim().to_string(),
        }
        .into())
    }
}

/// Substring match used to downgrade expected idempotent conflicts.
pub fn is_already_exists(stderr: &str) -> bool {
    let low = stderr.to_lowercase();
    low.contains("already exists") || low.contains("already initialized")
}

/// `docker exec <container> <cmd...>` with captured output.
pub fn exec(container: &str, cmd: &[&str]) -> Result<Output> {
    let mut args = vec!["exec", container];
    args.extend_from_slice(cmd);
    docker_ok("exec", &args)
}

/// `docker exec -e K=V ... <container> <cmd...>`.
pub fn exec_env(container: &str, env: &[(&str, &str)], cmd: &[&str]) -> Result<Output> {
    let pairs: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let mut args = vec!["exec"];
    for pair in &pairs {
        args.push("-e");
        args.push(pair.as_str());
    }
    args.push(container);
    args.extend_from_slice(cmd);
    docker_ok("exec", &args)
}

/// `docker exec` that tolerates non-zero exit; callers inspect the output.
pub fn exec_unchecked(container: &str, cmd: &[&str]) -> Result<Output> {
    let mut args = vec!["exec", container];
    args.extend_from_slice(cmd);
    docker_raw(&args)
}

/// Env-carrying variant of [`exec_unchecked`].
pub fn exec_env_unchecked(container: &str, env: &[(&str, &str)], cmd: &[&str]) -> Result<Output> {
    let pairs: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let mut args = vec!["exec"];
    for pair in &pairs {
        args.push("-e");
        args.push(pair.as_str());
    }
    args.push(container);
    args.extend_from_slice(cmd);
    docker_raw(&args)
}

/// `docker exec -i` streaming a host file to the command's stdin.
pub fn exec_with_stdin(container: &str, cmd: &[&str], stdin_file: &Path) -> Result<()> {
    let file = std::fs::File::open(stdin_file)?;
    let mut args = vec!["exec", "-i", container];
    args.extend_from_slice(cmd);

    debug!(container, args = ?args, stdin = %stdin_file.display(), "docker exec -i");
    let output = Command::new("docker")
        .args(&args)
        .stdin(Stdio::from(file))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(DockerError::Spawn)?;

    if output.status.success() {
        Ok(())
    } else {
        Err(DockerError::CommandFailed {
            action: "exec -i".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into())
    }
}

/// `docker cp` in either direction; endpoints use docker's
/// `container:path` syntax.
pub fn cp(src: &str, dst: &str) -> Result<()> {
    docker_ok("cp", &["cp", src, dst])?;
    Ok(())
}

/// Combined stdout+stderr logs for a container name filter.
pub fn logs(container: &str) -> Result<String> {
    let output = docker_raw(&["logs", container])?;
    if !output.status.success() {
        warn!(container, "docker logs failed; treating as empty");
        return Ok(String::new());
    }
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(text)
}

fn lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
