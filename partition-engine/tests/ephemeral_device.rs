use std::sync::Arc;

use partition_engine::{EphemeralDevicePartitioner, Partitioner};
use partition_testing::{ScriptedRunner, parted_print_output};
use partition_types::{DesiredPartition, Reconciliation};

const PRINT: &str = "parted -m /dev/sdb unit B print";

fn desired_for_agent() -> Vec<DesiredPartition> {
    vec![
        DesiredPartition::swap(8_589_934_592).with_name_prefix("agent007"),
        DesiredPartition::linux(8_589_934_592).with_name_prefix("agent007"),
    ]
}

#[test]
fn matching_labels_leave_the_disk_alone() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.enqueue_success(
        PRINT,
        &parted_print_output(
            "/dev/sdb",
            21_474_836_480,
            "gpt",
            &[
                (1, 1_048_576, 8_590_983_167, 8_589_934_592, "linux-swap(v1)", "agent007-0"),
                (2, 8_590_983_168, 17_180_917_759, 8_589_934_592, "ext4", "agent007-1"),
            ],
        ),
    );

    let partitioner = EphemeralDevicePartitioner::new(runner.clone());
    let outcome = partitioner
        .partition("/dev/sdb", &desired_for_agent())
        .unwrap();

    assert_eq!(outcome, Reconciliation::Converged);
    assert_eq!(runner.commands(), vec![PRINT]);
}

#[test]
fn foreign_labels_trigger_a_full_rebuild() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.enqueue_success(
        PRINT,
        &parted_print_output(
            "/dev/sdb",
            21_474_836_480,
            "gpt",
            &[
                (1, 1_048_576, 8_590_983_167, 8_589_934_592, "linux-swap(v1)", "agent3000-0"),
                (2, 8_590_983_168, 17_180_917_759, 8_589_934_592, "ext4", "agent3000-1"),
            ],
        ),
    );
    runner.enqueue_success(
        PRINT,
        &parted_print_output("/dev/sdb", 21_474_836_480, "gpt", &[]),
    );

    let partitioner = EphemeralDevicePartitioner::new(runner.clone());
    let outcome = partitioner
        .partition("/dev/sdb", &desired_for_agent())
        .unwrap();

    assert_eq!(outcome, Reconciliation::Mutated);

    // signatures are wiped before each table entry is dropped, and the new
    // layout is created only after the old one is gone
    assert_eq!(
        runner.commands(),
        vec![
            PRINT,
            "wipefs -a /dev/sdb1",
            "parted -s /dev/sdb rm 1",
            "wipefs -a /dev/sdb2",
            "parted -s /dev/sdb rm 2",
            "partprobe /dev/sdb",
            "udevadm settle",
            PRINT,
            PRINT,
            "parted -s /dev/sdb unit B mkpart agent007-0 1048576B 8590983167B",
            "parted -s /dev/sdb unit B mkpart agent007-1 8590983168B 17180917759B",
            "partprobe /dev/sdb",
            "udevadm settle",
        ]
    );
}

#[test]
fn a_blank_disk_is_labelled_and_provisioned() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.enqueue_failure(PRINT, 1, "Error: /dev/sdb: unrecognised disk label");
    runner.enqueue_success(
        PRINT,
        &parted_print_output("/dev/sdb", 21_474_836_480, "gpt", &[]),
    );

    let partitioner = EphemeralDevicePartitioner::new(runner.clone());
    let outcome = partitioner
        .partition("/dev/sdb", &desired_for_agent())
        .unwrap();

    assert_eq!(outcome, Reconciliation::Mutated);
    assert_eq!(
        runner.commands(),
        vec![
            PRINT,
            "parted -s /dev/sdb mklabel gpt",
            PRINT,
            PRINT,
            PRINT,
            "parted -s /dev/sdb unit B mkpart agent007-0 1048576B 8590983167B",
            "parted -s /dev/sdb unit B mkpart agent007-1 8590983168B 17180917759B",
            "partprobe /dev/sdb",
            "udevadm settle",
        ]
    );
}

#[test]
fn the_size_query_reports_the_probed_full_size() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.enqueue_success(
        PRINT,
        &parted_print_output("/dev/sdb", 21_474_836_480, "gpt", &[]),
    );

    let partitioner = EphemeralDevicePartitioner::new(runner);
    assert_eq!(
        partitioner.get_device_size_in_bytes("/dev/sdb").unwrap(),
        21_474_836_480
    );
}
