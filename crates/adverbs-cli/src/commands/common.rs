// SPDX-License-Identifier: Apache-2.0
//! Shared helpers for CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use adverbs::{Device, Guid, PortAttributes, Verbs, VerbsConfig};

/// Load the verbs library from config, with `--library` taking precedence.
pub fn open_verbs(library: Option<&Path>, config_file: Option<&Path>) -> Result<Verbs> {
    let config = resolve_config(library, config_file)?;
    Verbs::load(&config).with_context(|| {
        format!(
            "Failed to load verbs library {} (is rdma-core installed?)",
            config.library_path.display()
        )
    })
}

/// Effective configuration: `--library` > env > config file > default.
pub fn resolve_config(library: Option<&Path>, config_file: Option<&Path>) -> Result<VerbsConfig> {
    let mut config = VerbsConfig::load(config_file).context("Failed to load configuration")?;
    if let Some(path) = library {
        config.library_path = path.to_path_buf();
    }
    Ok(config)
}

/// How the user named a device on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    Name(String),
    Index(i32),
    Guid(Guid),
}

impl DeviceSelector {
    pub fn from_args(name: Option<String>, index: Option<i32>, guid: Option<&str>) -> Result<Self> {
        match (name, index, guid) {
            (Some(name), None, None) => Ok(Self::Name(name)),
            (None, Some(index), None) => Ok(Self::Index(index)),
            (None, None, Some(guid)) => guid
                .parse()
                .map(Self::Guid)
                .with_context(|| format!("Invalid GUID: '{guid}'")),
            _ => anyhow::bail!("Specify exactly one of a device name, --index or --guid"),
        }
    }
}

impl std::fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => write!(f, "name '{name}'"),
            Self::Index(index) => write!(f, "kernel index {index}"),
            Self::Guid(guid) => write!(f, "GUID {guid}"),
        }
    }
}

/// Find one device and copy it out of the enumeration.
pub fn find_device(verbs: &Verbs, selector: &DeviceSelector) -> Result<Device> {
    let list = verbs.device_list().context("Failed to enumerate devices")?;
    let entry = match selector {
        DeviceSelector::Name(name) => list.lookup_by_name(name),
        DeviceSelector::Index(index) => list.lookup_by_kernel_index(*index),
        DeviceSelector::Guid(guid) => list.lookup_by_guid(*guid),
    };
    match entry {
        Some(entry) => Ok(entry.snapshot()),
        None => {
            let available: Vec<String> = list.iter().map(|e| e.name()).collect();
            if available.is_empty() {
                anyhow::bail!("No device with {selector}: this host has no RDMA devices");
            }
            anyhow::bail!(
                "No device with {selector}. Available: {}",
                available.join(", ")
            )
        }
    }
}

/// Print one port as an indented block (shared by show and ports).
pub fn print_port(port: &PortAttributes) {
    let state = if port.is_active() {
        style(port.state.to_string()).green()
    } else {
        style(port.state.to_string()).yellow()
    };

    println!("\t\tport:\t{}", port.port_num);
    println!("\t\t\tstate:\t\t\t{} ({})", state, port.state.as_raw());
    println!(
        "\t\t\tmax_mtu:\t\t{} ({})",
        port.max_mtu,
        port.max_mtu.as_raw()
    );
    println!(
        "\t\t\tactive_mtu:\t\t{} ({})",
        port.active_mtu,
        port.active_mtu.as_raw()
    );
    println!("\t\t\tsm_lid:\t\t\t{}", port.sm_lid);
    println!("\t\t\tport_lid:\t\t{}", port.lid);
    println!("\t\t\tport_lmc:\t\t0x{:02x}", port.lmc);
    println!("\t\t\tlink_layer:\t\t{}", port.link_layer);
    println!(
        "\t\t\tphys_state:\t\t{}",
        port.phys_state
            .name()
            .map_or_else(|| port.phys_state.as_raw().to_string(), short_name)
    );
}

/// `IBV_PORT_PHYS_STATE_LINK_UP` → `LINK_UP`.
pub fn short_name(name: &str) -> String {
    name.trim_start_matches("IBV_")
        .trim_start_matches("PORT_PHYS_STATE_")
        .trim_start_matches("ATOMIC_")
        .trim_start_matches("TRANSPORT_")
        .to_string()
}
