//! Persistent device: backend chosen per call

use std::sync::Arc;

use tracing::{info, warn};

use partition_sys::{CommandRunner, DeviceSizeProbe, PartedBackend, SfdiskBackend, SysError};
use partition_types::{
    BackendKind, DesiredPartition, DeviceLayout, ExistingPartition, Reconciliation,
    choose_backend,
};

use crate::error::Result;
use crate::partitioner::Partitioner;

/// Dispatches each call to the sfdisk or parted backend.
///
/// Persistent disks attach in any size and with any history. Disks within
/// the MBR ceiling keep the legacy sfdisk path; larger disks and disks
/// already carrying a GPT table go through parted.
pub struct PersistentDevicePartitioner {
    sfdisk: SfdiskBackend,
    parted: PartedBackend,
    size_probe: DeviceSizeProbe,
}

impl PersistentDevicePartitioner {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            sfdisk: SfdiskBackend::new(runner.clone()),
            parted: PartedBackend::new(runner.clone()),
            size_probe: DeviceSizeProbe::new(runner),
        }
    }

    /// Assemble from preconfigured backends, mainly for tests that narrow
    /// the sfdisk retry policy
    pub fn with_backends(
        sfdisk: SfdiskBackend,
        parted: PartedBackend,
        size_probe: DeviceSizeProbe,
    ) -> Self {
        Self {
            sfdisk,
            parted,
            size_probe,
        }
    }
}

impl Partitioner for PersistentDevicePartitioner {
    fn partition(
        &self,
        device_path: &str,
        desired: &[DesiredPartition],
    ) -> Result<Reconciliation> {
        // An unprobeable size keeps the legacy path; older guest kernels
        // lacked --getsize64 and those disks are small.
        let probed_size = match self.size_probe.size_in_bytes(device_path) {
            Ok(size) => Some(size),
            Err(error) => {
                warn!(device = device_path, %error, "device size probe failed");
                None
            }
        };

        match choose_backend(probed_size) {
            BackendKind::Parted => Ok(self.parted.partition(device_path, desired)?),
            BackendKind::Sfdisk => match self.sfdisk.partition(device_path, desired) {
                Err(SysError::GptTableEncountered(_)) => {
                    info!(device = device_path, "gpt table found, switching to parted");
                    Ok(self.parted.partition(device_path, desired)?)
                }
                outcome => Ok(outcome?),
            },
        }
    }

    fn get_device_size_in_bytes(&self, device_path: &str) -> Result<u64> {
        Ok(self.sfdisk.get_device_size_in_bytes(device_path)?)
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
