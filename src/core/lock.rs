//! Per-service invocation locks.
//!
//! A lock is a file under `{base}/.locks/` created with `create_new` and
//! holding the owner's PID. Creation failing with `AlreadyExists` means
//! another invocation is mid-flight; the error carries that PID so the
//! operator can decide whether the lock is stale.

use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::core::context::Context;
use crate::error::{Error, Result};

/// Held lock; the file is removed on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    service: String,
}

impl LockGuard {
    /// Acquire the lock for a service, failing fast if it is held.
    pub fn acquire(ctx: &Context, service: &str) -> Result<Self> {
        let dir = ctx.locks_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{service}.lock"));

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                debug!(service, path = %path.display(), "lock acquired");
                Ok(Self {
                    path,
                    service: service.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let pid = std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                Err(Error::ServiceLocked {
                    service: service.to_string(),
                    pid,
                    path,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(service = %self.service, error = %e, "lock file already gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> (tempfile::TempDir, Context) {
        let tmp = tempfile::TempDir::new().unwrap();
        let ctx = Context::at(tmp.path().to_path_buf(), tmp.path().join("base")).unwrap();
        (tmp, ctx)
    }

    #[test]
    fn acquire_writes_pid_and_release_removes_file() {
        let (_tmp, ctx) = ctx();
        let lock_path = ctx.locks_dir().join("postgres.lock");

        {
            let _guard = LockGuard::acquire(&ctx, "postgres").unwrap();
            let pid: u32 = std::fs::read_to_string(&lock_path).unwrap().parse().unwrap();
            assert_eq!(pid, std::process::id());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn second_acquire_fails_with_holder_pid() {
        let (_tmp, ctx) = ctx();
        let _guard = LockGuard::acquire(&ctx, "vault").unwrap();

        let err = LockGuard::acquire(&ctx, "vault").unwrap_err();
        match err {
            Error::ServiceLocked { service, pid, .. } => {
                assert_eq!(service, "vault");
                assert_eq!(pid, std::process::id().to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn locks_are_per_service() {
        let (_tmp, ctx) = ctx();
        let _a = LockGuard::acquire(&ctx, "vault").unwrap();
        let _b = LockGuard::acquire(&ctx, "postgres").unwrap();
    }
}
