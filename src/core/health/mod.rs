//! Container healthcheck.
//!
//! A bounded polling loop over `docker ps` status strings, followed by a
//! warn-only log scan and an optional service-specific probe. All waiting
//! is sleep-based with fixed iteration bounds; there is no cancellation.

pub mod postgres;
pub mod vault;

use std::thread::sleep;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::context::Context;
use crate::core::docker;
use crate::error::{HealthError, Result};

/// Generic status-poll bound: 120 attempts, one second apart.
pub const MAX_ATTEMPTS: u32 = 120;

/// Service-specific follow-up probe run after the generic status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    None,
    Vault,
    Postgres,
}

/// Map a service name to its follow-up probe.
pub fn default_probe(service: &str) -> Probe {
    match service {
        "vault" => Probe::Vault,
        "postgres" => Probe::Postgres,
        _ => Probe::None,
    }
}

/// One poll iteration's verdict over the matched status strings.
#[derive(Debug, PartialEq, Eq)]
pub enum Poll {
    Ready,
    Waiting,
    Failed,
}

/// Decide readiness from `docker ps` status lines.
///
/// Multi-container services (one compose stack, several containers) are
/// ready only when every container has left "starting" and none reports
/// "unhealthy"; any "unhealthy" is an immediate failure. A single
/// container is ready as soon as its status contains "up" or "healthy".
pub fn evaluate(statuses: &[String]) -> Poll {
    if statuses.is_empty() {
        return Poll::Waiting;
    }

    if statuses.len() > 1 {
        let joined = statuses.join("\n").to_lowercase();
        if joined.contains("unhealthy") {
            return Poll::Failed;
        }
        if joined.contains("starting") {
            return Poll::Waiting;
        }
        return Poll::Ready;
    }

    let status = statuses[0].to_lowercase();
    if status.contains("unhealthy") {
        Poll::Failed
    } else if status.contains("up") || status.contains("healthy") {
        Poll::Ready
    } else {
        Poll::Waiting
    }
}

/// Poll a service's containers until ready, scan logs, run the probe.
pub fn check_container(ctx: &Context, service: &str, probe: Probe) -> Result<()> {
    let filter = ctx.container_name(service);
    info!(service, filter = %filter, "healthcheck started");

    let mut ready = false;
    for attempt in 0..MAX_ATTEMPTS {
        let statuses = docker::container_statuses(&filter)?;
        match evaluate(&statuses) {
            Poll::Ready => {
                ready = true;
                break;
            }
            Poll::Failed => {
                return Err(HealthError::Unhealthy {
                    service: service.to_string(),
                }
                .into());
            }
            Poll::Waiting => {
                info!(service, attempt = attempt + 1, max = MAX_ATTEMPTS, "waiting for container");
                sleep(Duration::from_secs(1));
            }
        }
    }
    if !ready {
        return Err(HealthError::Timeout {
            service: service.to_string(),
            attempts: MAX_ATTEMPTS,
        }
        .into());
    }

    scan_logs(service, &filter)?;

    match probe {
        Probe::None => {
            info!(service, "healthcheck passed");
            Ok(())
        }
        Probe::Vault => vault::check(ctx),
        Probe::Postgres => postgres::check(ctx),
    }
}

/// Case-insensitive scan for "error"/"failed" in the container logs.
/// Matches are a soft signal: many services log benign errors at startup,
/// so this warns and never fails the check.
fn scan_logs(service: &str, container: &str) -> Result<()> {
    let logs = docker::logs(container)?;
    let low = logs.to_lowercase();
    if low.contains("error") || low.contains("failed") {
        warn!(service, "container logs mention error/failed (not fatal)");
    } else {
        info!(service, "container logs clean");
    }
    Ok(())
}
