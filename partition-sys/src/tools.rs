//! PATH availability checks for the external partitioning tools

use crate::error::{Result, SysError};

/// Tools the reconciliation stack shells out to
pub const REQUIRED_TOOLS: &[&str] = &[
    "parted",
    "sfdisk",
    "blockdev",
    "wipefs",
    "partprobe",
    "udevadm",
];

/// Verify that every required tool resolves on PATH
pub fn require_tools() -> Result<()> {
    for tool in REQUIRED_TOOLS {
        if which::which(tool).is_err() {
            return Err(SysError::ToolMissing((*tool).to_string()));
        }
    }
    Ok(())
}
