//! Backend selection policy for persistent disks

use serde::{Deserialize, Serialize};

use crate::geometry::MBR_SIZE_CEILING_BYTES;

/// Partitioning tool family a persistent-disk request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Legacy MBR path, the default for small disks
    Sfdisk,

    /// GPT-capable path for large disks and the GPT-conflict fallback
    Parted,
}

/// Pick the backend for a device whose raw size probe returned
/// `probed_size_in_bytes`. An unreadable size is treated as a small legacy
/// disk; sizes past the MBR addressing ceiling have to go through parted.
pub fn choose_backend(probed_size_in_bytes: Option<u64>) -> BackendKind {
    match probed_size_in_bytes {
        Some(size) if size > MBR_SIZE_CEILING_BYTES => BackendKind::Parted,
        _ => BackendKind::Sfdisk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_devices_go_to_sfdisk() {
        assert_eq!(choose_backend(Some(1024)), BackendKind::Sfdisk);
        assert_eq!(choose_backend(Some(21_474_836_480)), BackendKind::Sfdisk);
    }

    #[test]
    fn the_ceiling_itself_still_goes_to_sfdisk() {
        assert_eq!(
            choose_backend(Some(MBR_SIZE_CEILING_BYTES)),
            BackendKind::Sfdisk
        );
    }

    #[test]
    fn devices_past_the_ceiling_go_to_parted() {
        assert_eq!(
            choose_backend(Some(MBR_SIZE_CEILING_BYTES + 1)),
            BackendKind::Parted
        );
        assert_eq!(
            choose_backend(Some(4_398_046_511_104)),
            BackendKind::Parted
        );
    }

    #[test]
    fn an_unreadable_size_goes_to_sfdisk() {
        assert_eq!(choose_backend(None), BackendKind::Sfdisk);
    }
}
