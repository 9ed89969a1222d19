//! Shared contract of the device-role partitioners

use partition_types::{DesiredPartition, DeviceLayout, ExistingPartition, Reconciliation};

use crate::error::Result;

/// One device-role partitioning strategy.
///
/// Every call re-probes the device and reconciles from what it finds;
/// nothing is cached between calls, so a failed run can simply be retried.
/// Callers must serialize calls against the same device path.
pub trait Partitioner: Send + Sync {
    /// Converge the device's partition table toward `desired`
    fn partition(
        &self,
        device_path: &str,
        desired: &[DesiredPartition],
    ) -> Result<Reconciliation>;

    /// Size in bytes available to this role's partitions
    fn get_device_size_in_bytes(&self, device_path: &str) -> Result<u64>;

    /// Probe the current partition table
    fn get_partitions(&self, device_path: &str) -> Result<DeviceLayout>;

    /// Delete the given partitions from the device
    fn remove_partitions(
        &self,
        partitions: &[ExistingPartition],
        device_path: &str,
    ) -> Result<()>;
}
