//! Raw block-device size probe

use std::sync::Arc;

use crate::error::{Result, SysError};
use crate::runner::CommandRunner;

/// Queries the byte size of a block device independent of any partition
/// table, via `blockdev --getsize64`.
pub struct DeviceSizeProbe {
    runner: Arc<dyn CommandRunner>,
}

impl DeviceSizeProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub fn size_in_bytes(&self, device_path: &str) -> Result<u64> {
        let output = self.runner.run("blockdev", &["--getsize64", device_path])?;
        let reported = output.stdout.trim();
        reported.parse().map_err(|_| {
            SysError::ParseFailed(format!(
                "blockdev --getsize64 on {device_path} returned {reported:?}"
            ))
        })
    }
}
