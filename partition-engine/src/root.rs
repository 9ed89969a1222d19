//! Root device: append after the boot layout

use std::sync::Arc;

use tracing::info;

use partition_sys::{CommandRunner, PartedBackend};
use partition_types::{
    ALIGNMENT_BYTES, DesiredPartition, DeviceLayout, ExistingPartition, PartitionType,
    Reconciliation, align_up, clamped_end, within_tolerance,
};

use crate::error::{PartitionError, Result};
use crate::partitioner::Partitioner;

/// Appends partitions strictly after the boot layout the image shipped
/// with.
///
/// The root disk arrives with its table already written: a root partition,
/// preceded on EFI images by the system partition. Those slots are never
/// touched; desired partitions land after them, each start rounded up to
/// the next MiB boundary. Any other pre-existing partition is refused
/// rather than overwritten.
pub struct RootDevicePartitioner {
    parted: PartedBackend,
    match_tolerance_in_bytes: u64,
}

impl RootDevicePartitioner {
    pub fn new(runner: Arc<dyn CommandRunner>, match_tolerance_in_bytes: u64) -> Self {
        Self {
            parted: PartedBackend::new(runner),
            match_tolerance_in_bytes,
        }
    }

    // EFI images carry the system partition ahead of the root partition
    fn boot_slots(partitions: &[ExistingPartition]) -> usize {
        match partitions.first() {
            Some(first) if first.partition_type == PartitionType::Efi => 2,
            _ => 1,
        }
    }
}

impl Partitioner for RootDevicePartitioner {
    fn partition(
        &self,
        device_path: &str,
        desired: &[DesiredPartition],
    ) -> Result<Reconciliation> {
        let layout = self.parted.get_partitions(device_path)?;
        if layout.partitions.is_empty() {
            return Err(PartitionError::MissingFirstPartition {
                device_path: device_path.to_string(),
            });
        }

        let boot_slots = Self::boot_slots(&layout.partitions);
        let appended = layout.partitions.get(boot_slots..).unwrap_or(&[]);

        if partitions_match(
            appended,
            desired,
            layout.full_size_in_bytes,
            self.match_tolerance_in_bytes,
        ) {
            info!(device = device_path, "partition layout already converged, skipping");
            return Ok(Reconciliation::Converged);
        }

        if !appended.is_empty() {
            return Err(PartitionError::UnexpectedPartitions {
                device_path: device_path.to_string(),
                count: appended.len(),
            });
        }

        let anchor = layout.partitions.get(boot_slots - 1).ok_or_else(|| {
            PartitionError::MissingFirstPartition {
                device_path: device_path.to_string(),
            }
        })?;

        let mut start = align_up(anchor.end_in_bytes + 1, ALIGNMENT_BYTES);
        for (index, partition) in desired.iter().enumerate() {
            let (end, truncated) =
                clamped_end(start, partition.size_in_bytes, layout.full_size_in_bytes);
            if truncated {
                info!(
                    device = device_path,
                    index,
                    size = end.saturating_sub(start) + 1,
                    "partition would pass the end of the device, truncating"
                );
            }

            info!(device = device_path, index, start, end, "creating partition");
            self.parted
                .create_partition(device_path, "primary", start, end)?;

            start = align_up(end + 1, ALIGNMENT_BYTES);
        }

        self.parted.rescan(device_path);
        Ok(Reconciliation::Mutated)
    }

    /// Space left on the device after the first partition, which is what
    /// callers size new layouts against
    fn get_device_size_in_bytes(&self, device_path: &str) -> Result<u64> {
        let layout = self.parted.get_partitions(device_path)?;
        let first = layout.partitions.first().ok_or_else(|| {
            PartitionError::MissingFirstPartition {
                device_path: device_path.to_string(),
            }
        })?;
        Ok(layout
            .full_size_in_bytes
            .saturating_sub(first.end_in_bytes)
            .saturating_sub(1))
    }

    fn get_partitions(&self, device_path: &str) -> Result<DeviceLayout> {
        Ok(self.parted.get_partitions(device_path)?)
    }

    fn remove_partitions(
        &self,
        partitions: &[ExistingPartition],
        device_path: &str,
    ) -> Result<()> {
        Ok(self.parted.remove_partitions(partitions, device_path)?)
    }
}

/// Comparison of the partitions after the boot layout against `desired`.
/// A desired size of zero stands for whatever space remains on the device.
fn partitions_match(
    existing: &[ExistingPartition],
    desired: &[DesiredPartition],
    full_size_in_bytes: u64,
    tolerance_in_bytes: u64,
) -> bool {
    if existing.len() < desired.len() {
        return false;
    }

    let mut remaining = full_size_in_bytes;
    for (index, want) in desired.iter().enumerate() {
        let have = &existing[index];

        let want_size = if want.size_in_bytes == 0 {
            remaining
        } else {
            want.size_in_bytes
        };

        if have.partition_type != want.partition_type {
            return false;
        }
        if !within_tolerance(have.size_in_bytes, want_size, tolerance_in_bytes) {
            return false;
        }

        remaining = remaining.saturating_sub(want_size);
    }

    true
}
