//! parted wrapper: GPT-capable probing and mutation
//!
//! Probing runs `parted -m <dev> unit B print` and parses the
//! machine-readable listing: a `BYT;` marker line, a header of
//! `path:sizeB:...`, then one `index:startB:endB:sizeB:fstype:name:flags;`
//! line per partition. All offsets are exact bytes; the `B` suffixes are
//! stripped before parsing.

use std::sync::Arc;

use tracing::{debug, info};

use partition_types::{
    ALIGNMENT_BYTES, DesiredPartition, DeviceLayout, ExistingPartition, PartitionType,
    Reconciliation, align_up, clamped_end, within_tolerance,
};

use crate::error::{Result, SysError};
use crate::rescan::rescan_device;
use crate::runner::{CommandOutput, CommandRunner};

/// Default byte delta tolerated when comparing probed sizes to desired ones
pub const DEFAULT_MATCH_TOLERANCE_BYTES: u64 = 20 * 1024 * 1024;

/// Probes and mutates partition tables through parted
pub struct PartedBackend {
    runner: Arc<dyn CommandRunner>,
    match_tolerance_in_bytes: u64,
}

impl PartedBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            match_tolerance_in_bytes: DEFAULT_MATCH_TOLERANCE_BYTES,
        }
    }

    /// Override the byte delta tolerated by the convergence check
    pub fn with_match_tolerance(mut self, tolerance_in_bytes: u64) -> Self {
        self.match_tolerance_in_bytes = tolerance_in_bytes;
        self
    }

    /// Probe the device's partition table
    pub fn get_partitions(&self, device_path: &str) -> Result<DeviceLayout> {
        let output = self.run_print(device_path)?;
        parse_print_output(device_path, &output.stdout)
    }

    /// Device size in bytes as reported by the listing header
    pub fn get_device_size_in_bytes(&self, device_path: &str) -> Result<u64> {
        Ok(self.get_partitions(device_path)?.full_size_in_bytes)
    }

    /// Converge the device toward `desired`, creating partitions after the
    /// last existing one. Existing partitions are never removed here; a
    /// layout that already matches within tolerance is left untouched.
    pub fn partition(
        &self,
        device_path: &str,
        desired: &[DesiredPartition],
    ) -> Result<Reconciliation> {
        let layout = self.get_partitions(device_path)?;

        if layouts_match(
            &layout.partitions,
            desired,
            layout.full_size_in_bytes,
            self.match_tolerance_in_bytes,
        ) {
            info!(device = device_path, "partition layout already converged, skipping");
            return Ok(Reconciliation::Converged);
        }

        let mut start = match layout.partitions.last() {
            Some(last) => align_up(last.end_in_bytes + 1, ALIGNMENT_BYTES),
            None => ALIGNMENT_BYTES,
        };

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

            let name = match &partition.name_prefix {
                Some(prefix) => format!("{prefix}-{index}"),
                None => "primary".to_string(),
            };

            info!(device = device_path, index, start, end, "creating partition");
            self.create_partition(device_path, &name, start, end)?;

            start = align_up(end + 1, ALIGNMENT_BYTES);
        }

        rescan_device(self.runner.as_ref(), device_path);
        Ok(Reconciliation::Mutated)
    }

    /// Issue a single `mkpart` with explicit byte offsets
    pub fn create_partition(
        &self,
        device_path: &str,
        name: &str,
        start_in_bytes: u64,
        end_in_bytes: u64,
    ) -> Result<()> {
        let start_arg = format!("{start_in_bytes}B");
        let end_arg = format!("{end_in_bytes}B");
        self.runner.run(
            "parted",
            &[
                "-s",
                device_path,
                "unit",
                "B",
                "mkpart",
                name,
                &start_arg,
                &end_arg,
            ],
        )?;
        Ok(())
    }

    /// Delete the given partitions, clearing stale filesystem signatures
    /// from each partition node before removing its table entry.
    pub fn remove_partitions(
        &self,
        partitions: &[ExistingPartition],
        device_path: &str,
    ) -> Result<()> {
        if partitions.is_empty() {
            return Ok(());
        }

        for partition in partitions {
            let node = partition_node_path(device_path, partition.index);
            info!(device = device_path, node = node.as_str(), "removing partition");
            self.runner.run("wipefs", &["-a", &node])?;
            let index_arg = partition.index.to_string();
            self.runner
                .run("parted", &["-s", device_path, "rm", &index_arg])?;
        }

        rescan_device(self.runner.as_ref(), device_path);
        Ok(())
    }

    /// Write a GPT label unless the listing already reports one
    pub fn ensure_gpt_label(&self, device_path: &str) -> Result<()> {
        match self
            .runner
            .run("parted", &["-m", device_path, "unit", "B", "print"])
        {
            Ok(output) if output.stdout.contains("gpt") => return Ok(()),
            Ok(_) => {}
            Err(SysError::CommandFailed { .. }) => {}
            Err(error) => return Err(error),
        }

        info!(device = device_path, "writing new gpt label");
        self.runner
            .run("parted", &["-s", device_path, "mklabel", "gpt"])?;
        Ok(())
    }

    /// Expose the kernel rescan for callers that mutate outside this backend
    pub fn rescan(&self, device_path: &str) {
        rescan_device(self.runner.as_ref(), device_path);
    }

    // A device without any partition table makes parted print fail. Label it
    // and probe again so first-time provisioning sees an empty table instead
    // of an error.
    fn run_print(&self, device_path: &str) -> Result<CommandOutput> {
        match self
            .runner
            .run("parted", &["-m", device_path, "unit", "B", "print"])
        {
            Ok(output) => Ok(output),
            Err(SysError::CommandFailed { stderr, .. })
                if stderr.contains("unrecognised disk label") =>
            {
                info!(device = device_path, "no partition table found, writing gpt label");
                self.runner
                    .run("parted", &["-s", device_path, "mklabel", "gpt"])?;
                self.runner
                    .run("parted", &["-m", device_path, "unit", "B", "print"])
            }
            Err(error) => Err(error),
        }
    }
}

/// Position-by-position comparison of a probed table against a desired
/// layout. A leading EFI system partition never participates; a final
/// desired size of zero stands for whatever space remains on the device.
fn layouts_match(
    existing: &[ExistingPartition],
    desired: &[DesiredPartition],
    full_size_in_bytes: u64,
    tolerance_in_bytes: u64,
) -> bool {
    let existing = match existing.first() {
        Some(first) if first.partition_type == PartitionType::Efi => &existing[1..],
        _ => existing,
    };

    if existing.len() < desired.len() {
        return false;
    }

    let mut remaining = full_size_in_bytes;
    for (index, want) in desired.iter().enumerate() {
        let have = &existing[index];

        let want_size = if index == desired.len() - 1 && want.size_in_bytes == 0 {
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

fn parse_print_output(device_path: &str, stdout: &str) -> Result<DeviceLayout> {
    let all_lines: Vec<&str> = stdout.split('\n').collect();
    if all_lines.len() < 3 {
        return Err(SysError::ParseFailed(format!(
            "parted print on {device_path}: expected at least 3 lines, got {}",
            all_lines.len()
        )));
    }

    let header: Vec<&str> = all_lines[1].split(':').collect();
    if header.len() < 2 {
        return Err(SysError::ParseFailed(format!(
            "parted print on {device_path}: malformed header line {:?}",
            all_lines[1]
        )));
    }
    let full_size_in_bytes = parse_bytes_field(device_path, header[1])?;

    let mut partitions = Vec::new();
    for line in &all_lines[2..all_lines.len() - 1] {
        if line.trim().is_empty() {
            continue;
        }
        // PReP boot partitions on ppc64le are not ours to manage
        if line.contains("prep") {
            debug!(device = device_path, line = *line, "skipping prep partition");
            continue;
        }

        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 6 {
            return Err(SysError::ParseFailed(format!(
                "parted print on {device_path}: malformed partition line {line:?}"
            )));
        }

        let index: u32 = fields[0].parse().map_err(|_| {
            SysError::ParseFailed(format!(
                "parted print on {device_path}: partition index {:?} is not a number",
                fields[0]
            ))
        })?;

        let start_in_bytes = parse_bytes_field(device_path, fields[1])?;
        let end_in_bytes = parse_bytes_field(device_path, fields[2])?;
        let size_in_bytes = parse_bytes_field(device_path, fields[3])?;

        partitions.push(ExistingPartition {
            index,
            start_in_bytes,
            end_in_bytes,
            size_in_bytes,
            partition_type: PartitionType::from_fs_tag(fields[4]),
            name: fields[5].trim_end_matches(';').to_string(),
        });
    }

    Ok(DeviceLayout {
        device_path: device_path.to_string(),
        full_size_in_bytes,
        partitions,
    })
}

fn parse_bytes_field(device_path: &str, field: &str) -> Result<u64> {
    let trimmed = field.trim().trim_end_matches(';').trim_end_matches('B');
    trimmed.parse().map_err(|_| {
        SysError::ParseFailed(format!(
            "parted print on {device_path}: byte field {field:?} is not a number"
        ))
    })
}

/// Node path for a partition index: devices whose name already ends in a
/// digit (nvme, mapper) take a `p` separator.
fn partition_node_path(device_path: &str, index: u32) -> String {
    if device_path.ends_with(|c: char| c.is_ascii_digit()) {
        format!("{device_path}p{index}")
    } else {
        format!("{device_path}{index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURED_PRINT: &str = "BYT;\n\
/dev/sda:21474836480B:virtblk:512:512:gpt:Virtio Block Device:;\n\
1:1048576B:8590983167B:8589934592B:linux-swap(v1):agent007-0:;\n\
2:8590983168B:21474835967B:12883852800B:ext4:agent007-1:;\n";

    #[test]
    fn parses_the_captured_listing() {
        let layout = parse_print_output("/dev/sda", CAPTURED_PRINT).unwrap();

        assert_eq!(layout.device_path, "/dev/sda");
        assert_eq!(layout.full_size_in_bytes, 21_474_836_480);
        assert_eq!(layout.partitions.len(), 2);

        let first = &layout.partitions[0];
        assert_eq!(first.index, 1);
        assert_eq!(first.start_in_bytes, 1_048_576);
        assert_eq!(first.end_in_bytes, 8_590_983_167);
        assert_eq!(first.size_in_bytes, 8_589_934_592);
        assert_eq!(first.partition_type, PartitionType::Swap);
        assert_eq!(first.name, "agent007-0");

        let second = &layout.partitions[1];
        assert_eq!(second.partition_type, PartitionType::Linux);
        assert_eq!(second.name, "agent007-1");
    }

    #[test]
    fn every_parsed_row_satisfies_end_equals_start_plus_size_minus_one() {
        let layout = parse_print_output("/dev/sda", CAPTURED_PRINT).unwrap();
        for partition in &layout.partitions {
            assert_eq!(
                partition.end_in_bytes,
                partition.start_in_bytes + partition.size_in_bytes - 1
            );
        }
    }

    #[test]
    fn skips_prep_boot_partitions() {
        let stdout = "BYT;\n\
/dev/sda:21474836480B:virtblk:512:512:gpt:Virtio Block Device:;\n\
1:1048576B:9437183B:8388608B:::prep;\n\
2:9437184B:21474835967B:21465398784B:ext4::;\n";

        let layout = parse_print_output("/dev/sda", stdout).unwrap();
        assert_eq!(layout.partitions.len(), 1);
        assert_eq!(layout.partitions[0].index, 2);
    }

    #[test]
    fn an_empty_table_parses_to_no_partitions() {
        let stdout = "BYT;\n\
/dev/sdc:21474836480B:virtblk:512:512:gpt:Virtio Block Device:;\n";

        let layout = parse_print_output("/dev/sdc", stdout).unwrap();
        assert!(layout.partitions.is_empty());
        assert_eq!(layout.full_size_in_bytes, 21_474_836_480);
    }

    #[test]
    fn fewer_than_three_lines_is_a_parse_failure() {
        assert!(matches!(
            parse_print_output("/dev/sda", "BYT;\n"),
            Err(SysError::ParseFailed(_))
        ));
    }

    #[test]
    fn non_numeric_offsets_are_a_parse_failure() {
        let stdout = "BYT;\n\
/dev/sda:21474836480B:virtblk:512:512:gpt:Virtio Block Device:;\n\
1:abcB:8590983167B:8589934592B:ext4::;\n";

        assert!(matches!(
            parse_print_output("/dev/sda", stdout),
            Err(SysError::ParseFailed(_))
        ));
    }

    #[test]
    fn malformed_partition_lines_are_a_parse_failure() {
        let stdout = "BYT;\n\
/dev/sda:21474836480B:virtblk:512:512:gpt:Virtio Block Device:;\n\
1:1048576B\n";

        assert!(matches!(
            parse_print_output("/dev/sda", stdout),
            Err(SysError::ParseFailed(_))
        ));
    }

    #[test]
    fn matching_layouts_within_tolerance_converge() {
        let layout = parse_print_output("/dev/sda", CAPTURED_PRINT).unwrap();
        let desired = vec![
            DesiredPartition::swap(8_589_934_592),
            DesiredPartition::linux(12_883_852_800 + 1024),
        ];

        assert!(layouts_match(
            &layout.partitions,
            &desired,
            layout.full_size_in_bytes,
            DEFAULT_MATCH_TOLERANCE_BYTES,
        ));
    }

    #[test]
    fn a_type_mismatch_never_converges() {
        let layout = parse_print_output("/dev/sda", CAPTURED_PRINT).unwrap();
        let desired = vec![
            DesiredPartition::linux(8_589_934_592),
            DesiredPartition::linux(12_883_852_800),
        ];

        assert!(!layouts_match(
            &layout.partitions,
            &desired,
            layout.full_size_in_bytes,
            DEFAULT_MATCH_TOLERANCE_BYTES,
        ));
    }

    #[test]
    fn a_final_zero_size_stands_for_the_remaining_space() {
        let layout = parse_print_output("/dev/sda", CAPTURED_PRINT).unwrap();
        let desired = vec![
            DesiredPartition::swap(8_589_934_592),
            DesiredPartition::linux(0),
        ];

        // remaining = 21,474,836,480 - 8,589,934,592 = 12,884,901,888;
        // probed size 12,883,852,800 differs by 1,049,088 bytes
        assert!(layouts_match(
            &layout.partitions,
            &desired,
            layout.full_size_in_bytes,
            DEFAULT_MATCH_TOLERANCE_BYTES,
        ));
    }

    #[test]
    fn a_leading_efi_partition_is_excluded_from_the_comparison() {
        let stdout = "BYT;\n\
/dev/sda:21474836480B:virtblk:512:512:gpt:Virtio Block Device:;\n\
1:1048576B:537919487B:536870912B:fat16::;\n\
2:537919488B:9127854079B:8589934592B:ext4::;\n";

        let layout = parse_print_output("/dev/sda", stdout).unwrap();
        let desired = vec![DesiredPartition::linux(8_589_934_592)];

        assert!(layouts_match(
            &layout.partitions,
            &desired,
            layout.full_size_in_bytes,
            DEFAULT_MATCH_TOLERANCE_BYTES,
        ));
    }

    #[test]
    fn fewer_existing_than_desired_never_converges() {
        let desired = vec![DesiredPartition::linux(1024)];
        assert!(layouts_match(&[], &[], 1024, 0));
        assert!(!layouts_match(&[], &desired, 1024, 0));
    }

    #[test]
    fn derives_partition_node_paths() {
        assert_eq!(partition_node_path("/dev/sda", 1), "/dev/sda1");
        assert_eq!(partition_node_path("/dev/sdb", 3), "/dev/sdb3");
        assert_eq!(partition_node_path("/dev/nvme0n1", 2), "/dev/nvme0n1p2");
        assert_eq!(partition_node_path("/dev/xvdf1", 1), "/dev/xvdf1p1");
    }
}
