// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for partitioning tool operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Unparseable tool output: {0}")]
    ParseFailed(String),

    #[error("GPT partition table present on {0}")]
    GptTableEncountered(String),

    #[error("Required tool not found in PATH: {0}")]
    ToolMissing(String),
}

/// Result type alias for tool operations
pub type Result<T> = std::result::Result<T, SysError>;
