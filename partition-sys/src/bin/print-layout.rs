// SPDX-License-Identifier: GPL-3.0-only

//! Probe a block device with parted and print its partition layout.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use partition_sys::{PartedBackend, SystemRunner, require_tools};

#[derive(Debug, Parser)]
#[command(name = "print-layout")]
#[command(about = "Print the probed partition layout of a block device")]
struct Args {
    /// Block device to probe, e.g. /dev/sda
    #[arg(long)]
    device: String,

    /// Emit the layout as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("partition_sys=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if unsafe { libc::geteuid() } != 0 {
        tracing::warn!("probing partition tables usually requires root");
    }

    require_tools().context("required partitioning tools are missing")?;

    let backend = PartedBackend::new(Arc::new(SystemRunner::new()));
    let layout = backend
        .get_partitions(&args.device)
        .with_context(|| format!("probing {}", args.device))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    println!("{} ({} bytes)", layout.device_path, layout.full_size_in_bytes);
    println!(
        "{:<5} {:<8} {:>16} {:>16} {:>16} {}",
        "IDX", "TYPE", "START", "END", "SIZE", "NAME"
    );
    for partition in &layout.partitions {
        println!(
            "{:<5} {:<8} {:>16} {:>16} {:>16} {}",
            partition.index,
            partition.partition_type,
            partition.start_in_bytes,
            partition.end_in_bytes,
            partition.size_in_bytes,
            partition.name
        );
    }

    Ok(())
}
