//! sfdisk wrapper: MBR probing and mutation
//!
//! Probing runs `sfdisk -d <dev>` and parses the dump rows
//! (`<node> : start=<sectors>, size=<sectors>, Id=<id>`). Partition and
//! device sizes come from `sfdisk -s <path>`, which reports kilobytes.
//! Mutation pipes a partition script into `sfdisk -uM <dev>`, retried
//! because the kernel can hold the device busy right after attach.

use std::sync::Arc;

use tracing::{debug, info};

use partition_types::{
    DesiredPartition, DeviceLayout, ExistingPartition, PartitionType, Reconciliation,
    SECTOR_SIZE_BYTES, within_tolerance,
};

use crate::error::{Result, SysError};
use crate::rescan::rescan_device;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper, retry};
use crate::runner::CommandRunner;

/// Byte delta tolerated when comparing probed sizes to desired ones
const MATCH_TOLERANCE_BYTES: u64 = 20 * 1024 * 1024;

/// Probes and mutates partition tables through sfdisk
pub struct SfdiskBackend {
    runner: Arc<dyn CommandRunner>,
    retry_policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl SfdiskBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            retry_policy: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    /// Override how often and how long the table write is retried
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace the delay clock, mainly so tests run without sleeping
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Probe the device's partition table, including empty MBR slots
    pub fn get_partitions(&self, device_path: &str) -> Result<DeviceLayout> {
        let output = self.runner.run("sfdisk", &["-d", device_path])?;
        let rows = parse_dump(device_path, &output.stdout)?;
        let full_size_in_bytes = self.get_device_size_in_bytes(device_path)?;

        let mut partitions = Vec::new();
        for (ordinal, row) in rows.iter().enumerate() {
            let partition_type = PartitionType::from_mbr_id(&row.id);

            // Empty slots have no node to ask about. A probe failure on a
            // real node is not fatal either; the size comparison will then
            // force a rewrite.
            let size_in_bytes = if partition_type == PartitionType::Empty {
                0
            } else {
                match self.get_device_size_in_bytes(&row.node) {
                    Ok(size) => size,
                    Err(error) => {
                        debug!(node = row.node.as_str(), %error, "partition size probe failed");
                        0
                    }
                }
            };

            let start_in_bytes = row.start_sectors * SECTOR_SIZE_BYTES;
            partitions.push(ExistingPartition {
                index: node_index(&row.node, ordinal),
                start_in_bytes,
                end_in_bytes: (start_in_bytes + size_in_bytes).saturating_sub(1),
                size_in_bytes,
                partition_type,
                name: String::new(),
            });
        }

        Ok(DeviceLayout {
            device_path: device_path.to_string(),
            full_size_in_bytes,
            partitions,
        })
    }

    /// Size in bytes of a device or partition node, via `sfdisk -s`
    pub fn get_device_size_in_bytes(&self, path: &str) -> Result<u64> {
        let output = self.runner.run("sfdisk", &["-s", path])?;
        let kilobytes: u64 = output.stdout.trim().parse().map_err(|_| {
            SysError::ParseFailed(format!(
                "sfdisk -s on {path}: expected a size in kilobytes, got {:?}",
                output.stdout
            ))
        })?;
        Ok(kilobytes * 1024)
    }

    /// Converge the device toward `desired` by rewriting the whole table.
    /// A layout that already matches within tolerance is left untouched.
    pub fn partition(
        &self,
        device_path: &str,
        desired: &[DesiredPartition],
    ) -> Result<Reconciliation> {
        if self.is_converged(device_path, desired)? {
            info!(device = device_path, "partition layout already converged, skipping");
            return Ok(Reconciliation::Converged);
        }

        let script = render_script(desired);
        debug!(device = device_path, script = script.as_str(), "writing partition table");

        retry(self.retry_policy, self.sleeper.as_ref(), || {
            self.runner
                .run_with_stdin("sfdisk", &["-uM", device_path], &script)
        })?;

        rescan_device(self.runner.as_ref(), device_path);
        Ok(Reconciliation::Mutated)
    }

    // The last desired partition always stands for the rest of the device;
    // sfdisk scripts leave its size blank. A failed probe (other than a GPT
    // table, which this backend must not touch) reads as not converged so
    // a blank device still gets its first table.
    fn is_converged(&self, device_path: &str, desired: &[DesiredPartition]) -> Result<bool> {
        let layout = match self.get_partitions(device_path) {
            Ok(layout) => layout,
            Err(SysError::GptTableEncountered(device)) => {
                return Err(SysError::GptTableEncountered(device));
            }
            Err(error) => {
                debug!(device = device_path, %error, "probe before partitioning failed");
                return Ok(false);
            }
        };

        if layout.partitions.len() < desired.len() {
            return Ok(false);
        }

        let mut remaining = layout.full_size_in_bytes;
        for (index, want) in desired.iter().enumerate() {
            let have = &layout.partitions[index];

            let want_size = if index == desired.len() - 1 {
                remaining
            } else {
                want.size_in_bytes
            };

            if have.partition_type != want.partition_type {
                return Ok(false);
            }
            if !within_tolerance(have.size_in_bytes, want_size, MATCH_TOLERANCE_BYTES) {
                return Ok(false);
            }

            remaining = remaining.saturating_sub(want_size);
        }

        Ok(true)
    }
}

struct DumpRow {
    node: String,
    start_sectors: u64,
    id: String,
}

fn parse_dump(device_path: &str, stdout: &str) -> Result<Vec<DumpRow>> {
    let all_lines: Vec<&str> = stdout.split('\n').collect();
    if all_lines.len() < 4 {
        return Err(SysError::ParseFailed(format!(
            "sfdisk dump on {device_path}: expected at least 4 lines, got {}",
            all_lines.len()
        )));
    }

    let mut rows = Vec::new();
    for line in &all_lines[3..all_lines.len() - 1] {
        if line.trim().is_empty() {
            continue;
        }

        let row = parse_dump_row(line).ok_or_else(|| {
            SysError::ParseFailed(format!(
                "sfdisk dump on {device_path}: malformed row {line:?}"
            ))
        })?;

        // GPT disks dump as a single protective 0xee entry. sfdisk cannot
        // manage those; the caller has to switch tooling.
        if row.id == "ee" {
            return Err(SysError::GptTableEncountered(device_path.to_string()));
        }

        rows.push(row);
    }

    Ok(rows)
}

fn parse_dump_row(line: &str) -> Option<DumpRow> {
    let (node, fields) = line.split_once(':')?;

    let mut start_sectors = None;
    let mut id = None;
    for field in fields.split(',') {
        let (key, value) = field.split_once('=')?;
        match key.trim() {
            "start" => start_sectors = value.trim().parse().ok(),
            "Id" => id = Some(value.trim().to_string()),
            _ => {}
        }
    }

    Some(DumpRow {
        node: node.trim().to_string(),
        start_sectors: start_sectors?,
        id: id?,
    })
}

/// One `,<size in MB>,<type>` line per partition; the last size is left
/// blank so it takes whatever space remains.
fn render_script(desired: &[DesiredPartition]) -> String {
    let mut script = String::new();
    for (index, partition) in desired.iter().enumerate() {
        let size_field = if index == desired.len() - 1 {
            String::new()
        } else {
            (partition.size_in_bytes / (1024 * 1024)).to_string()
        };
        let type_field = match partition.partition_type {
            PartitionType::Swap => "S",
            PartitionType::Linux => "L",
            _ => "",
        };
        script.push_str(&format!(",{size_field},{type_field}\n"));
    }
    script
}

/// Partition index from the node's trailing digits, with the row's
/// position as a fallback for unexpected node names.
fn node_index(node: &str, ordinal: usize) -> u32 {
    let trimmed = node.trim_end_matches(|c: char| c.is_ascii_digit());
    node[trimmed.len()..].parse().unwrap_or(ordinal as u32 + 1)
}
