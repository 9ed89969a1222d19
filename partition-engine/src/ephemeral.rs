//! Ephemeral device: full rebuild on identity change

use std::sync::Arc;

use tracing::info;

use partition_sys::{CommandRunner, PartedBackend};
use partition_types::{DesiredPartition, DeviceLayout, ExistingPartition, Reconciliation};

use crate::error::Result;
use crate::partitioner::Partitioner;

/// Reprovisions the ephemeral disk whenever its partition labels no longer
/// carry the expected identity prefix.
///
/// Ephemeral contents do not survive an identity change, so a mismatch is
/// resolved by deleting every partition and rebuilding from scratch instead
/// of patching in place.
pub struct EphemeralDevicePartitioner {
    parted: PartedBackend,
}

impl EphemeralDevicePartitioner {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            parted: PartedBackend::new(runner),
        }
    }
}

impl Partitioner for EphemeralDevicePartitioner {
    fn partition(
        &self,
        device_path: &str,
        desired: &[DesiredPartition],
    ) -> Result<Reconciliation> {
        let layout = self.parted.get_partitions(device_path)?;

        if names_match(&layout.partitions, desired) {
            info!(device = device_path, "partition labels already match, skipping");
            return Ok(Reconciliation::Converged);
        }

        if !layout.partitions.is_empty() {
            info!(
                device = device_path,
                count = layout.partitions.len(),
                "partition labels do not match, rebuilding"
            );
            self.parted
                .remove_partitions(&layout.partitions, device_path)?;
        }

        self.parted.ensure_gpt_label(device_path)?;
        self.parted.partition(device_path, desired)?;
        Ok(Reconciliation::Mutated)
    }

    fn get_device_size_in_bytes(&self, device_path: &str) -> Result<u64> {
        Ok(self.parted.get_device_size_in_bytes(device_path)?)
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

/// Whether every desired slot is already backed by a partition whose label
/// starts with that slot's prefix. A desired entry without a prefix accepts
/// any label.
fn names_match(existing: &[ExistingPartition], desired: &[DesiredPartition]) -> bool {
    if existing.len() < desired.len() {
        return false;
    }

    for (index, want) in desired.iter().enumerate() {
        let prefix = want.name_prefix.as_deref().unwrap_or("");
        if !existing[index].name.starts_with(prefix) {
            return false;
        }
    }

    true
}
