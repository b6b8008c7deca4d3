//! Vault-specific health probe.
//!
//! Talks to the `/v1/sys/health` API on localhost rather than the docker
//! status line, because Vault reports its lifecycle state through HTTP
//! status codes. The listener presents the internal CA's certificate, so
//! certificate verification is disabled for this loopback request only.

use std::thread::sleep;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::core::context::Context;
use crate::error::{HealthError, Result};

const MAX_ATTEMPTS: u32 = 20;
const DEFAULT_PORT: u16 = 8200;

/// The subset of the health response worth reporting.
#[derive(Debug, Deserialize)]
pub struct VaultHealth {
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub sealed: bool,
    #[serde(default)]
    pub standby: bool,
    #[serde(default)]
    pub version: String,
}

/// Meaning of a `/v1/sys/health` status code.
pub fn describe(status: u16) -> &'static str {
    match status {
        200 => "OK (initialized, unsealed, active)",
        429 => "standby (initialized, unsealed, standby)",
        472 => "DR secondary",
        473 => "performance standby",
        474 => "standby but active node unreachable",
        501 => "not initialized",
        503 => "sealed (unseal required)",
        530 => "node removed from cluster",
        _ => "unknown status",
    }
}

/// Poll the health API until it answers, then report the node state.
///
/// Any answer counts as reachable: a sealed or uninitialized Vault is a
/// healthy container that simply has not been through `init-vault` yet,
/// so those states log a hint instead of failing the install.
pub fn check(ctx: &Context) -> Result<()> {
    let port = ctx
        .credential("VAULT_PORT")
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let url = format!("https://localhost:{port}/v1/sys/health");

    let client = reqwest::blocking::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(HealthError::Http)?;

    let mut answer = None;
    for attempt in 0..MAX_ATTEMPTS {
        match client.get(&url).send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().unwrap_or_default();
                if !body.is_empty() {
                    info!(attempt = attempt + 1, status, "vault health API reachable");
                    answer = Some((status, body));
                    break;
                }
            }
            Err(e) => debug!(attempt = attempt + 1, error = %e, "vault health request failed"),
        }
        warn!(attempt = attempt + 1, max = MAX_ATTEMPTS, "vault API not ready, retrying");
        sleep(Duration::from_secs(1));
    }

    let (status, body) = answer.ok_or(HealthError::VaultUnreachable {
        attempts: MAX_ATTEMPTS,
    })?;

    info!(status, meaning = describe(status), "vault status");

    let health: VaultHealth = serde_json::from_str(&body).map_err(HealthError::Json)?;
    info!(
        initialized = health.initialized,
        sealed = health.sealed,
        standby = health.standby,
        version = %health.version,
        "vault node state"
    );

    if !health.initialized {
        warn!("vault is not initialized; run `homestack init-vault`");
    } else if health.sealed {
        warn!("vault is sealed; run `homestack unseal-vault`");
    }
    Ok(())
}
