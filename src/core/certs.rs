//! Certificate manager.
//!
//! One self-signed root CA under `{base}/certs/ca/`, plus a per-service
//! key → CSR → CA-signed leaf pipeline with a conventional SAN list.
//! Every step is an `openssl` invocation with an argument vector; failure
//! at any step is fatal for the calling operation, never retried.
//!
//! Idempotence: an existing key+certificate pair is left untouched unless
//! `overwrite` is set, but the root CA copy is re-deployed on every run so
//! a rotated CA propagates without regenerating leaves.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::core::config::ServiceConfig;
use crate::core::context::{self, Context, CONTAINER_PREFIX, INTERNAL_DOMAIN};
use crate::error::{CertError, Result};

/// Root CA validity, ten years.
const CA_DAYS: u32 = 3650;
/// Default leaf validity.
pub const DEFAULT_LEAF_DAYS: u32 = 825;
const CA_KEY_BITS: u32 = 4096;
const LEAF_KEY_BITS: u32 = 2048;

/// What `provision` actually did for one service.
#[derive(Debug, PartialEq, Eq)]
pub enum CertOutcome {
    /// Key and certificate were generated (or regenerated) and verified.
    Generated,
    /// Existing key+certificate kept; only the root CA copy was refreshed.
    Skipped,
}

/// Filesystem layout of one service's certificate set.
#[derive(Debug)]
pub struct CertPaths {
    pub key: PathBuf,
    pub csr: PathBuf,
    pub cert: PathBuf,
    pub ca_copy: PathBuf,
}

impl CertPaths {
    pub fn new(ctx: &Context, service: &str, cfg: &ServiceConfig) -> Self {
        let dir = ctx.certs_dir(service, cfg);
        Self {
            key: dir.join(format!("{service}.key")),
            csr: dir.join(format!("{service}.csr")),
            cert: dir.join(format!("{service}.crt")),
            ca_copy: dir.join("rootCA.pem"),
        }
    }
}

/// The conventional SAN set for a service. Overridable via `cert.san`.
pub fn default_san(service: &str) -> Vec<String> {
    vec![
        format!("DNS:{service}"),
        format!("DNS:{CONTAINER_PREFIX}-{service}"),
        format!("DNS:{service}.{INTERNAL_DOMAIN}"),
        "DNS:localhost".to_string(),
        "IP:127.0.0.1".to_string(),
    ]
}

/// Render the `subjectAltName=` extension line passed to openssl.
pub fn san_extension(entries: &[String]) -> String {
    format!("subjectAltName={}", entries.join(","))
}

/// Generate the root CA key and self-signed certificate if absent.
pub fn ensure_root_ca(ctx: &Context, overwrite: bool) -> Result<()> {
    let key = ctx.ca_key();
    let cert = ctx.ca_cert();
    if key.exists() && cert.exists() && !overwrite {
        debug!(cert = %cert.display(), "root CA already present");
        return Ok(());
    }

    std::fs::create_dir_all(ctx.ca_dir())?;
    info!(dir = %ctx.ca_dir().display(), "generating root CA");

    run_openssl(
        "genrsa (root CA)",
        &["genrsa", "-out", &path_str(&key), &CA_KEY_BITS.to_string()],
    )?;
    restrict_key(&key)?;

    run_openssl(
        "req -x509 (root CA)",
        &[
            "req",
            "-x509",
            "-new",
            "-nodes",
            "-key",
            &path_str(&key),
            "-sha256",
            "-days",
            &CA_DAYS.to_string(),
            "-out",
            &path_str(&cert),
            "-subj",
            "/CN=Homestack-Root-CA",
        ],
    )?;

    info!(cert = %cert.display(), "root CA generated");
    Ok(())
}

/// Run the full per-service pipeline: key, CSR, signed leaf, verify,
/// root CA deploy. `days` of `None` falls back to the config value and
/// then to [`DEFAULT_LEAF_DAYS`].
pub fn provision(
    ctx: &Context,
    service: &str,
    cfg: &ServiceConfig,
    days: Option<u32>,
    overwrite: bool,
) -> Result<CertOutcome> {
    context::validate_service_name(service)?;
    ensure_root_ca(ctx, false)?;

    let paths = CertPaths::new(ctx, service, cfg);
    std::fs::create_dir_all(paths.key.parent().expect("certs dir has a parent"))?;

    let outcome = if paths.key.exists() && paths.cert.exists() && !overwrite {
        info!(service, cert = %paths.cert.display(), "certificate exists, skipping generation");
        CertOutcome::Skipped
    } else {
        let days = days.or(cfg.cert.days).unwrap_or(DEFAULT_LEAF_DAYS);
        let san = cfg
            .cert
            .san
            .clone()
            .unwrap_or_else(|| default_san(service));

        generate_key(&paths.key)?;
        generate_csr(service, &paths)?;
        sign(ctx, service, &paths, &san, days)?;
        verify(service, &paths.cert, &ctx.ca_cert())?;
        info!(service, cert = %paths.cert.display(), "certificate generated and verified");
        CertOutcome::Generated
    };

    // Root CA rotation must propagate even when the leaf was skipped.
    std::fs::copy(ctx.ca_cert(), &paths.ca_copy)?;
    debug!(service, ca = %paths.ca_copy.display(), "root CA deployed");
    Ok(outcome)
}

fn generate_key(key: &Path) -> Result<()> {
    run_openssl(
        "genrsa",
        &["genrsa", "-out", &path_str(key), &LEAF_KEY_BITS.to_string()],
    )?;
    restrict_key(key)
}

fn generate_csr(service: &str, paths: &CertPaths) -> Result<()> {
    run_openssl(
        "req -new",
        &[
            "req",
            "-new",
            "-key",
            &path_str(&paths.key),
            "-out",
            &path_str(&paths.csr),
            "-subj",
            &format!("/CN={service}"),
        ],
    )
}

fn sign(ctx: &Context, service: &str, paths: &CertPaths, san: &[String], days: u32) -> Result<()> {
    let ca_cert = ctx.ca_cert();
    let ca_key = ctx.ca_key();
    if !ca_cert.exists() || !ca_key.exists() {
        return Err(CertError::RootCaMissing(ca_cert).into());
    }

    // openssl reads the SAN extension from a file, not an argument.
    let mut extfile = tempfile::NamedTempFile::new()?;
    writeln!(extfile, "{}", san_extension(san))?;
    extfile.flush()?;

    debug!(service, san = %san.join(","), days, "signing CSR");
    run_openssl(
        "x509 -req (sign)",
        &[
            "x509",
            "-req",
            "-in",
            &path_str(&paths.csr),
            "-CA",
            &path_str(&ca_cert),
            "-CAkey",
            &path_str(&ca_key),
            "-CAcreateserial",
            "-out",
            &path_str(&paths.cert),
            "-days",
            &days.to_string(),
            "-sha256",
            "-extfile",
            &path_str(extfile.path()),
        ],
    )
}

/// `openssl verify -CAfile <ca> <cert>`. Failure is fatal.
pub fn verify(service: &str, cert: &Path, ca: &Path) -> Result<()> {
    let output = Command::new("openssl")
        .args(["verify", "-CAfile", &path_str(ca), &path_str(cert)])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| CertError::OpensslFailed {
            step: "verify",
            stderr: e.to_string(),
        })?;

    if output.status.success() {
        debug!(service, cert = %cert.display(), "chain verified");
        Ok(())
    } else {
        Err(CertError::VerifyFailed {
            service: service.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into())
    }
}

fn run_openssl(step: &'static str, args: &[&str]) -> Result<()> {
    let output = Command::new("openssl")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| CertError::OpensslFailed {
            step,
            stderr: e.to_string(),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(CertError::OpensslFailed {
            step,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into())
    }
}

fn restrict_key(key: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(key, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}
