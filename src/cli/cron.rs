//! Install backup schedules into the user's crontab.
//!
//! Every enabled service with a `backup.schedule` contributes one line.
//! The lines live between marker comments so repeated runs replace the
//! managed block instead of appending duplicates; everything outside the
//! markers is preserved byte for byte.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::cli::output;
use crate::core::config::ServiceConfig;
use crate::core::context::Context;
use crate::core::discovery;
use crate::error::{Error, Result};

const BEGIN_MARK: &str = "# BEGIN homestack backups";
const END_MARK: &str = "# END homestack backups";

pub fn execute(print: bool) -> Result<()> {
    let ctx = Context::load()?;
    let block = schedule_block(&ctx)?;

    if block.is_empty() {
        output::dimmed("no service has a backup.schedule configured");
        return Ok(());
    }

    if print {
        for line in &block {
            println!("{line}");
        }
        return Ok(());
    }

    let existing = current_crontab()?;
    let merged = merge(&existing, &block);
    install_crontab(&merged)?;

    output::success(&format!("{} schedule(s) installed", block.len()));
    output::hint("verify with: crontab -l");
    Ok(())
}

/// One crontab line per scheduled service.
fn schedule_block(ctx: &Context) -> Result<Vec<String>> {
    let exe = std::env::current_exe()?;
    let mut lines = Vec::new();
    for svc in discovery::discover(ctx)? {
        let cfg = ServiceConfig::load_or_default(ctx, &svc)?;
        if let Some(schedule) = cfg.backup.schedule.as_deref() {
            lines.push(format!(
                "{schedule} {} backup {svc} >> /var/log/homestack-backup.log 2>&1",
                exe.display()
            ));
        }
    }
    Ok(lines)
}

/// Replace the managed block, keeping foreign lines untouched.
fn merge(existing: &str, block: &[String]) -> String {
    let mut result: Vec<String> = Vec::new();
    let mut in_block = false;
    for line in existing.lines() {
        if line.trim() == BEGIN_MARK {
            in_block = true;
            continue;
        }
        if line.trim() == END_MARK {
            in_block = false;
            continue;
        }
        if !in_block {
            result.push(line.to_string());
        }
    }

    while result.last().is_some_and(|l| l.is_empty()) {
        result.pop();
    }
    if !result.is_empty() {
        result.push(String::new());
    }
    result.push(BEGIN_MARK.to_string());
    result.extend(block.iter().cloned());
    result.push(END_MARK.to_string());
    result.push(String::new());
    result.join("\n")
}

fn current_crontab() -> Result<String> {
    let output = Command::new("crontab")
        .arg("-l")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| Error::HostSpawn {
            tool: "crontab",
            source,
        })?;
    // Exit 1 with "no crontab" is a valid empty state.
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        debug!("no existing crontab");
        Ok(String::new())
    }
}

fn install_crontab(content: &str) -> Result<()> {
    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Error::HostSpawn {
            tool: "crontab",
            source,
        })?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin.write_all(content.as_bytes())?;
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().map_err(|source| Error::HostSpawn {
        tool: "crontab",
        source,
    })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::HostCommand {
            command: "crontab -".to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> Vec<String> {
        vec!["0 3 * * * /usr/bin/homestack backup postgres".to_string()]
    }

    #[test]
    fn merge_into_empty_crontab() {
        let merged = merge("", &block());
        assert_eq!(
            merged,
            "# BEGIN homestack backups\n0 3 * * * /usr/bin/homestack backup postgres\n# END homestack backups\n"
        );
    }

    #[test]
    fn merge_preserves_foreign_lines() {
        let existing = "MAILTO=ops@example.com\n0 1 * * * /usr/local/bin/other-job\n";
        let merged = merge(existing, &block());
        assert!(merged.starts_with("MAILTO=ops@example.com\n0 1 * * * /usr/local/bin/other-job\n"));
        assert!(merged.contains(BEGIN_MARK));
        assert!(merged.ends_with("# END homestack backups\n"));
    }

    #[test]
    fn merge_is_idempotent() {
        let once = merge("0 1 * * * /usr/local/bin/other-job\n", &block());
        let twice = merge(&once, &block());
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_replaces_stale_block() {
        let stale = format!(
            "{BEGIN_MARK}\n0 9 * * * /old/path backup ldap\n{END_MARK}\n"
        );
        let merged = merge(&stale, &block());
        assert!(!merged.contains("/old/path"));
        assert!(merged.contains("backup postgres"));
    }
}
