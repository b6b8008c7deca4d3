//! Test support utilities for homestack integration tests.
//!
//! Provides reusable test environment setup and helper commands.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod skip;

#[allow(unused_imports)]
pub use assertions::*;

use std::path::PathBuf;

use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// Each test gets its own project root (config/, template/, .env) and
/// base dir. No process-global state is mutated; child processes get
/// PROJECT_ROOT/BASE_DIR via env vars so tests can run in parallel.
pub struct Test {
    /// Temporary project root
    pub project: TempDir,
    /// Temporary runtime base dir
    pub base: TempDir,
}

impl Test {
    /// Create a new empty test environment.
    pub fn new() -> Self {
        let project = TempDir::new().expect("failed to create temp project dir");
        let base = TempDir::new().expect("failed to create temp base dir");
        Self { project, base }
    }

    /// Write `config/{service}.yml`.
    pub fn write_config(&self, service: &str, yaml: &str) {
        let dir = self.project.path().join("config");
        std::fs::create_dir_all(&dir).expect("mkdir config");
        std::fs::write(dir.join(format!("{service}.yml")), yaml).expect("write config");
    }

    /// Write a file under `template/{service}/`.
    pub fn write_template(&self, service: &str, rel: &str, content: &str) {
        let path = self.project.path().join("template").join(service).join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).expect("mkdir template");
        std::fs::write(path, content).expect("write template");
    }

    /// Write the project `.env`.
    pub fn write_dotenv(&self, content: &str) {
        std::fs::write(self.project.path().join(".env"), content).expect("write .env");
    }

    /// Path of a service directory under the base dir.
    pub fn service_dir(&self, service: &str) -> PathBuf {
        self.base.path().join(service)
    }

    /// Path of the backup directory of a service.
    pub fn backups_dir(&self, service: &str) -> PathBuf {
        self.base.path().join("backups").join(service)
    }

    /// Fabricate an empty backup artifact with a given timestamp.
    pub fn fake_artifact(&self, service: &str, timestamp: &str) -> PathBuf {
        let dir = self.backups_dir(service);
        std::fs::create_dir_all(&dir).expect("mkdir backups");
        let path = dir.join(format!("{service}_{timestamp}.tar.gz.gpg"));
        std::fs::write(&path, b"").expect("write artifact");
        path
    }
}
