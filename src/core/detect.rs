//! Host tool detection.
//!
//! Every external tool is checked up front with `which`, so an operation
//! fails before it has touched anything rather than halfway through.

use tracing::debug;

use crate::error::{Error, Result};

/// Tools needed by install/check.
pub const BASE_TOOLS: &[&str] = &["docker", "openssl"];

/// Additional tools needed by backup/restore.
pub const BACKUP_TOOLS: &[&str] = &["tar", "gpg", "rsync"];

/// Fail with the first missing tool from the list.
pub fn require_tools(tools: &[&'static str]) -> Result<()> {
    for &tool in tools {
        let path = which::which(tool).map_err(|_| Error::MissingTool(tool))?;
        debug!(tool, path = %path.display(), "found");
    }
    Ok(())
}

/// Non-failing probe used by `check` to report tool availability.
pub fn tool_available(tool: &str) -> bool {
    which::which(tool).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn missing_tool_is_named() {
        let err = require_tools(&["definitely-not-a-real-tool-9x7"]).unwrap_err();
        assert!(matches!(err, Error::MissingTool("definitely-not-a-real-tool-9x7")));
    }

    #[test]
    fn empty_list_always_passes() {
        require_tools(&[]).unwrap();
    }
}
