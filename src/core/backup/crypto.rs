//! Symmetric artifact encryption via gpg.
//!
//! The passphrase travels over stdin (`--passphrase-fd 0`) so it never
//! appears in the process list, and the in-memory copy is zeroized on
//! drop.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;
use zeroize::Zeroizing;

use crate::core::context::Context;
use crate::error::{BackupError, CryptoError, Result};

/// Backup passphrase, wiped from memory when dropped.
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    /// Resolve `BACKUP_PASSWORD` from the environment or the project `.env`.
    pub fn from_context(ctx: &Context) -> Result<Self> {
        ctx.credential("BACKUP_PASSWORD")
            .filter(|p| !p.is_empty())
            .map(|p| Self(Zeroizing::new(p)))
            .ok_or_else(|| BackupError::NoPassphrase.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// `gpg --symmetric --cipher-algo AES256` from `input` to `output`.
pub fn encrypt_file(input: &Path, output: &Path, passphrase: &Passphrase) -> Result<()> {
    debug!(input = %input.display(), output = %output.display(), "encrypting");
    run_gpg(
        &[
            "--batch",
            "--yes",
            "--passphrase-fd",
            "0",
            "--symmetric",
            "--cipher-algo",
            "AES256",
            "--output",
            &output.display().to_string(),
            &input.display().to_string(),
        ],
        passphrase,
    )
    .map_err(|stderr| CryptoError::EncryptionFailed(stderr).into())
}

/// `gpg --decrypt` from `input` to `output`.
pub fn decrypt_file(input: &Path, output: &Path, passphrase: &Passphrase) -> Result<()> {
    debug!(input = %input.display(), output = %output.display(), "decrypting");
    run_gpg(
        &[
            "--batch",
            "--yes",
            "--passphrase-fd",
            "0",
            "--decrypt",
            "--output",
            &output.display().to_string(),
            &input.display().to_string(),
        ],
        passphrase,
    )
    .map_err(|stderr| CryptoError::DecryptionFailed(stderr).into())
}

fn run_gpg(args: &[&str], passphrase: &Passphrase) -> std::result::Result<(), String> {
    let mut child = Command::new("gpg")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| e.to_string())?;

    // Writing can race a fast gpg failure; a broken pipe here just means
    // gpg already exited and the status below carries the real error.
    if let Some(stdin) = child.stdin.as_mut() {
        let _ = stdin.write_all(passphrase.as_bytes());
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().map_err(|e| e.to_string())?;
    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
    }
}
