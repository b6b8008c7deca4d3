//! Install the root CA into the Windows certificate store from WSL2.
//!
//! Copies `rootCA.pem` to a Windows-visible path and calls
//! `certutil.exe -addstore -f Root`, which triggers the UAC prompt on
//! the Windows side. Only meaningful inside WSL2.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::cli::output;
use crate::core::context::Context;
use crate::error::{CertError, Error, Result};

const WINDOWS_DROP_DIR: &str = "/mnt/c/Windows/Temp";

pub fn execute() -> Result<()> {
    let ctx = Context::load()?;
    let ca = ctx.ca_cert();
    if !ca.exists() {
        output::error("root CA not found");
        output::hint("run: homestack cert <service> (generates the CA first)");
        return Err(CertError::RootCaMissing(ca).into());
    }

    if !is_wsl() {
        output::error("not running under WSL2; this command manages the Windows trust store");
        return Ok(());
    }

    let drop_path = Path::new(WINDOWS_DROP_DIR).join("homestack-rootCA.pem");
    std::fs::copy(&ca, &drop_path)?;
    debug!(path = %drop_path.display(), "root CA staged for certutil");

    // certutil wants a Windows path for a file under /mnt/c.
    let win_path = r"C:\Windows\Temp\homestack-rootCA.pem";
    let status = Command::new("certutil.exe")
        .args(["-addstore", "-f", "Root", win_path])
        .status()
        .map_err(|source| Error::HostSpawn {
            tool: "certutil.exe",
            source,
        })?;

    std::fs::remove_file(&drop_path).ok();

    if status.success() {
        output::success("root CA installed into the Windows Root store");
        output::hint("restart your browser to pick up the new trust anchor");
        Ok(())
    } else {
        Err(Error::HostCommand {
            command: "certutil -addstore".to_string(),
            stderr: format!("certutil exited with {status}"),
        })
    }
}

/// WSL kernels identify themselves in /proc/version.
fn is_wsl() -> bool {
    std::fs::read_to_string("/proc/version")
        .map(|v| v.to_lowercase().contains("microsoft"))
        .unwrap_or(false)
}
