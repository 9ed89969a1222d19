// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles for the partitioning crates.
//!
//! [`ScriptedRunner`] stands in for the system command runner: tests queue
//! canned results per command line and assert on the calls that were made,
//! stdin included. [`RecordingSleeper`] captures retry delays instead of
//! sleeping through them, and the fixture helpers render tool output the
//! way parted and sfdisk actually print it.

pub mod fixtures;
pub mod runner;
pub mod sleeper;

pub use fixtures::{parted_print_output, sfdisk_dump_output};
pub use runner::{Invocation, ScriptedResult, ScriptedRunner};
pub use sleeper::RecordingSleeper;
