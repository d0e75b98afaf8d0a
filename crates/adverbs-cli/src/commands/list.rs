// SPDX-License-Identifier: Apache-2.0
//! List command implementation.

use anyhow::{Context, Result};
use console::style;

use adverbs::{Device, Verbs};

/// Pretty-printed JSON array of device snapshots.
pub fn to_json(devices: &[Device]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(devices)
}

/// Execute the list command.
pub fn execute(verbs: &Verbs, json: bool) -> Result<()> {
    let devices = verbs.devices().context("Failed to enumerate devices")?;
    tracing::info!("found {} device(s)", devices.len());

    if json {
        println!("{}", to_json(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("{}", style("No RDMA devices found").dim());
        return Ok(());
    }

    println!(
        "    {:<16}  {:>5}  {:<19}  {}",
        style("device").bold(),
        style("index").bold(),
        style("node GUID").bold(),
        style("node type").bold()
    );
    println!(
        "    {:<16}  {:>5}  {:<19}  {}",
        "------", "-----", "-------------------", "---------"
    );
    for device in &devices {
        println!(
            "    {:<16}  {:>5}  {:<19}  {}",
            style(device.name()).cyan(),
            device.kernel_index(),
            device.guid(),
            device.node_type()
        );
    }

    Ok(())
}
