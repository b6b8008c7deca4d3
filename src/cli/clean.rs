//! Delete old backup artifacts.

use crate::cli::output;
use crate::core::backup;
use crate::core::context::Context;
use crate::core::discovery;
use crate::error::Result;

pub fn execute(keep: usize) -> Result<()> {
    let ctx = Context::load()?;

    // Sweep every service with a backup directory, not just the enabled
    // ones; disabled services accumulate artifacts too.
    let mut services = discovery::discover(&ctx)?;
    let backups_root = ctx.base_dir.join("backups");
    if backups_root.is_dir() {
        for entry in std::fs::read_dir(&backups_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !services.iter().any(|s| s == name) {
                    services.push(name.to_string());
                }
            }
        }
    }

    let mut total = 0;
    for svc in &services {
        let removed = backup::clean(&ctx, svc, keep)?;
        if removed > 0 {
            output::kv(svc, format!("{removed} removed"));
        }
        total += removed;
    }

    if total == 0 {
        output::dimmed(&format!("nothing to clean (keeping up to {keep} per service)"));
    } else {
        output::success(&format!("{total} old artifacts removed"));
    }
    Ok(())
}
