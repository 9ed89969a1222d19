//! Desired and probed partition models - flat representations
//!
//! A reconciliation call carries a sequence of [`DesiredPartition`] values
//! describing what a device should look like, probes the device into a
//! [`DeviceLayout`] of [`ExistingPartition`] entries, and reports a
//! [`Reconciliation`] outcome. Both sequences are transient; they are
//! re-derived from the device on every call.

use serde::{Deserialize, Serialize};

/// Partition content classification shared by both probe formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionType {
    /// Linux data partition
    Linux,

    /// Swap partition
    Swap,

    /// Unused slot in an MBR table
    Empty,

    /// EFI system partition
    Efi,

    /// Anything the tools report that this engine does not manage
    Unknown,
}

impl PartitionType {
    /// Classify from the filesystem tag of a parted machine-readable listing
    pub fn from_fs_tag(tag: &str) -> Self {
        match tag {
            "ext4" | "xfs" => Self::Linux,
            "linux-swap(v1)" => Self::Swap,
            "fat16" => Self::Efi,
            _ => Self::Unknown,
        }
    }

    /// Classify from the Id field of an sfdisk dump entry
    pub fn from_mbr_id(id: &str) -> Self {
        match id {
            "82" => Self::Swap,
            "83" => Self::Linux,
            "0" => Self::Empty,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for PartitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Linux => "linux",
            Self::Swap => "swap",
            Self::Empty => "empty",
            Self::Efi => "efi",
            Self::Unknown => "unknown",
        };
        f.pad(label)
    }
}

/// One element of the layout a device should converge to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredPartition {
    /// Content classification (drives type codes and match checks)
    pub partition_type: PartitionType,

    /// Size in bytes; a backend may treat the last entry as "rest of the disk"
    pub size_in_bytes: u64,

    /// GPT label prefix, set only for layouts keyed to an agent identity
    pub name_prefix: Option<String>,
}

impl DesiredPartition {
    /// A Linux data partition of the given size
    pub fn linux(size_in_bytes: u64) -> Self {
        Self {
            partition_type: PartitionType::Linux,
            size_in_bytes,
            name_prefix: None,
        }
    }

    /// A swap partition of the given size
    pub fn swap(size_in_bytes: u64) -> Self {
        Self {
            partition_type: PartitionType::Swap,
            size_in_bytes,
            name_prefix: None,
        }
    }

    /// Attach the GPT label prefix used for identity matching
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }
}

/// One probed partition table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingPartition {
    /// Slot number assigned by the partitioning tool (1-based)
    pub index: u32,

    /// First byte of the partition
    pub start_in_bytes: u64,

    /// Last byte of the partition (inclusive)
    pub end_in_bytes: u64,

    /// Size in bytes (end - start + 1)
    pub size_in_bytes: u64,

    /// Content classification inferred from the filesystem signature or MBR id
    pub partition_type: PartitionType,

    /// GPT partition label (empty on MBR tables)
    pub name: String,
}

/// Structured result of one partition table probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLayout {
    /// Device path the probe ran against (e.g., "/dev/sdb")
    pub device_path: String,

    /// Device size in bytes as reported by the probing tool
    pub full_size_in_bytes: u64,

    /// Entries ordered by ascending start offset
    pub partitions: Vec<ExistingPartition>,
}

/// Outcome of one reconciliation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconciliation {
    /// The probed table already matched the desired layout; nothing was written
    Converged,

    /// The table was rewritten toward the desired layout
    Mutated,
}
