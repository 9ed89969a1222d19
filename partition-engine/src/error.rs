// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

use partition_sys::SysError;

/// Error types for device-role reconciliation
#[derive(Error, Debug)]
pub enum PartitionError {
    #[error(transparent)]
    Sys(#[from] SysError),

    #[error("Missing first partition on {device_path}")]
    MissingFirstPartition { device_path: String },

    #[error("Found {count} unexpected partitions on {device_path}")]
    UnexpectedPartitions { device_path: String, count: usize },
}

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, PartitionError>;
