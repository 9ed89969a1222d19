//! Canned tool output shaped like the real parted and sfdisk listings

/// Machine-readable `parted -m <dev> unit B print` output.
///
/// Rows are `(index, start, end, size, fs tag, name)`, offsets in bytes.
pub fn parted_print_output(
    device_path: &str,
    full_size_in_bytes: u64,
    label: &str,
    rows: &[(u32, u64, u64, u64, &str, &str)],
) -> String {
    let mut output = format!(
        "BYT;\n{device_path}:{full_size_in_bytes}B:virtblk:512:512:{label}:Virtio Block Device:;\n"
    );
    for (index, start, end, size, fs_tag, name) in rows {
        output.push_str(&format!("{index}:{start}B:{end}B:{size}B:{fs_tag}:{name}:;\n"));
    }
    output
}

/// `sfdisk -d <dev>` dump output.
///
/// Rows are `(node, start sectors, size sectors, id)`.
pub fn sfdisk_dump_output(device_path: &str, rows: &[(&str, u64, u64, &str)]) -> String {
    let mut output = format!("# partition table of {device_path}\nunit: sectors\n\n");
    for (node, start_sectors, size_sectors, id) in rows {
        output.push_str(&format!(
            "{node} : start={start_sectors:>9}, size={size_sectors:>9}, Id={id}\n"
        ));
    }
    output
}
