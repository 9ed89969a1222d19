// SPDX-License-Identifier: GPL-3.0-only

//! Low-level partitioning tool operations
//!
//! This crate wraps the external tools the reconciliation engine drives:
//! parted for GPT-capable probing and mutation, sfdisk for legacy MBR
//! tables, blockdev for raw size probes, wipefs for clearing stale
//! filesystem signatures, and partprobe/udevadm for post-mutation rescans.
//! All tool output parsing lives here, behind the typed models from
//! `partition-types`.
//!
//! Nothing in this crate decides *what* a device's layout should be; that
//! policy sits in `partition-engine`.

pub mod error;
pub mod parted;
pub mod probe;
pub mod rescan;
pub mod retry;
pub mod runner;
pub mod sfdisk;
pub mod tools;

pub use error::{Result, SysError};
pub use parted::PartedBackend;
pub use probe::DeviceSizeProbe;
pub use rescan::rescan_device;
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper, retry};
pub use runner::{CommandOutput, CommandRunner, SystemRunner, render};
pub use sfdisk::SfdiskBackend;
pub use tools::{REQUIRED_TOOLS, require_tools};
