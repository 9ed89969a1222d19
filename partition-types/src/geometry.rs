//! Byte arithmetic for partition planning

/// Partition start alignment boundary (1 MiB)
pub const ALIGNMENT_BYTES: u64 = 1024 * 1024;

/// Largest device size the MBR code path will manage (2 TiB)
pub const MBR_SIZE_CEILING_BYTES: u64 = 2 * 1024 * 1024 * 1024 * 1024;

/// Sector size the sfdisk dump offsets are expressed in
pub const SECTOR_SIZE_BYTES: u64 = 512;

/// Round an offset up to the next multiple of `alignment_in_bytes`.
/// Already-aligned offsets are returned unchanged.
pub fn align_up(offset_in_bytes: u64, alignment_in_bytes: u64) -> u64 {
    if alignment_in_bytes == 0 {
        return offset_in_bytes;
    }
    offset_in_bytes + ((alignment_in_bytes - offset_in_bytes % alignment_in_bytes) % alignment_in_bytes)
}

/// Inclusive end byte for a partition of `size_in_bytes` starting at
/// `start_in_bytes`, clamped to the last addressable byte of the device.
/// The second value reports whether clamping truncated the partition.
pub fn clamped_end(start_in_bytes: u64, size_in_bytes: u64, full_size_in_bytes: u64) -> (u64, bool) {
    let last_addressable = full_size_in_bytes.saturating_sub(1);
    let end = start_in_bytes
        .saturating_add(size_in_bytes)
        .saturating_sub(1);
    if end > last_addressable {
        (last_addressable, true)
    } else {
        (end, false)
    }
}

/// Whether two sizes differ by at most `tolerance_in_bytes`
pub fn within_tolerance(left: u64, right: u64, tolerance_in_bytes: u64) -> bool {
    left.abs_diff(right) <= tolerance_in_bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_up_to_the_next_boundary() {
        assert_eq!(align_up(0, ALIGNMENT_BYTES), 0);
        assert_eq!(align_up(1, ALIGNMENT_BYTES), 1_048_576);
        assert_eq!(align_up(1_048_576, ALIGNMENT_BYTES), 1_048_576);
        assert_eq!(align_up(1_048_577, ALIGNMENT_BYTES), 2_097_152);

        // first free byte after a root partition ending at 3,071,000,063
        assert_eq!(align_up(3_071_000_064, ALIGNMENT_BYTES), 3_071_279_104);
    }

    #[test]
    fn aligned_offsets_are_exact_multiples() {
        for offset in [0, 1, 511, 1_048_575, 3_071_000_064, 11_661_213_696] {
            assert_eq!(align_up(offset, ALIGNMENT_BYTES) % ALIGNMENT_BYTES, 0);
        }
    }

    #[test]
    fn zero_alignment_is_identity() {
        assert_eq!(align_up(12_345, 0), 12_345);
    }

    #[test]
    fn computes_inclusive_partition_ends() {
        let (end, truncated) = clamped_end(3_071_279_104, 8_589_934_592, 21_474_836_480);
        assert_eq!(end, 11_661_213_695);
        assert!(!truncated);
    }

    #[test]
    fn clamps_ends_past_the_device() {
        let (end, truncated) = clamped_end(11_661_213_696, 10_000_000_000, 21_474_836_480);
        assert_eq!(end, 21_474_836_479);
        assert!(truncated);
    }

    #[test]
    fn end_exactly_on_the_last_byte_is_not_truncated() {
        let (end, truncated) = clamped_end(0, 21_474_836_480, 21_474_836_480);
        assert_eq!(end, 21_474_836_479);
        assert!(!truncated);
    }

    #[test]
    fn tolerance_compare_is_symmetric_and_inclusive() {
        assert!(within_tolerance(100, 100, 0));
        assert!(within_tolerance(100, 132, 32));
        assert!(within_tolerance(132, 100, 32));
        assert!(!within_tolerance(100, 133, 32));
        assert!(!within_tolerance(133, 100, 32));
    }
}
