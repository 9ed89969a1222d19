// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for block-device partition reconciliation
//!
//! This crate defines the single source of truth for the partitioning
//! domain types shared across the stack:
//!
//! - **partition-sys**: parses tool output into these types
//! - **partition-engine**: plans and applies layouts expressed in these types
//!
//! No I/O happens here; everything is plain data plus the byte arithmetic
//! (alignment, end clamping, tolerance compares) that partition planning
//! depends on.

pub mod backend;
pub mod geometry;
pub mod partition;

pub use backend::{BackendKind, choose_backend};
pub use geometry::{
    ALIGNMENT_BYTES, MBR_SIZE_CEILING_BYTES, SECTOR_SIZE_BYTES, align_up, clamped_end,
    within_tolerance,
};
pub use partition::{
    DesiredPartition, DeviceLayout, ExistingPartition, PartitionType, Reconciliation,
};
