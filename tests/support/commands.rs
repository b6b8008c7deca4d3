//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::process::Output;

impl Test {
    /// Create a homestack command with the test environment applied.
    ///
    /// Returns a Command configured with:
    /// - PROJECT_ROOT pointing at the temp project dir
    /// - BASE_DIR pointing at the temp base dir
    /// - Current directory set to the project dir
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("homestack").expect("failed to find homestack binary");
        cmd.env("PROJECT_ROOT", self.project.path());
        cmd.env("BASE_DIR", self.base.path());
        cmd.env_remove("BACKUP_PASSWORD");
        cmd.env_remove("HOMESTACK_LOG");
        cmd.current_dir(self.project.path());
        cmd
    }

    /// Shortcut for `homestack check`.
    pub fn check(&self) -> Output {
        self.cmd()
            .arg("check")
            .output()
            .expect("failed to run homestack check")
    }

    /// Shortcut for `homestack cert <service>`.
    pub fn cert(&self, service: &str) -> Output {
        self.cmd()
            .args(["cert", service])
            .output()
            .expect("failed to run homestack cert")
    }

    /// Shortcut for `homestack clean-backups --keep N`.
    pub fn clean_backups(&self, keep: usize) -> Output {
        self.cmd()
            .args(["clean-backups", "--keep", &keep.to_string()])
            .output()
            .expect("failed to run homestack clean-backups")
    }

    /// Shortcut for `homestack setup-cron --print`.
    pub fn setup_cron_print(&self) -> Output {
        self.cmd()
            .args(["setup-cron", "--print"])
            .output()
            .expect("failed to run homestack setup-cron")
    }
}
