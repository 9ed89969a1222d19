// SPDX-License-Identifier: GPL-3.0-only

//! Device-role partition reconciliation.
//!
//! Three partitioners share one [`Partitioner`] contract and differ in what
//! they are willing to touch:
//!
//! - [`RootDevicePartitioner`] appends after the boot layout the image
//!   shipped with and refuses to disturb anything else.
//! - [`EphemeralDevicePartitioner`] rebuilds the whole disk whenever its
//!   partition labels stop matching the expected identity prefix.
//! - [`PersistentDevicePartitioner`] picks the sfdisk or parted path per
//!   call, based on the probed device size and on whether a GPT table is
//!   already present.
//!
//! Every call re-probes the device and either skips (already converged) or
//! mutates; nothing is cached, so interrupted runs are retried safely by
//! calling again.

pub mod ephemeral;
pub mod error;
pub mod partitioner;
pub mod persistent;
pub mod root;

pub use ephemeral::EphemeralDevicePartitioner;
pub use error::{PartitionError, Result};
pub use partitioner::Partitioner;
pub use persistent::PersistentDevicePartitioner;
pub use root::RootDevicePartitioner;
