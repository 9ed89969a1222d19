//! Kernel partition table rescan after mutations

use tracing::warn;

use crate::runner::CommandRunner;

/// Ask the kernel to re-read the device's partition table and wait for the
/// udev event queue to drain. Failures are logged at warn level, never
/// surfaced; the next probe re-reads the table from scratch anyway.
pub fn rescan_device(runner: &dyn CommandRunner, device_path: &str) {
    if let Err(error) = runner.run("partprobe", &[device_path]) {
        warn!(device = device_path, %error, "partprobe failed");
    }
    if let Err(error) = runner.run("udevadm", &["settle"]) {
        warn!(device = device_path, %error, "udevadm settle failed");
    }
}
