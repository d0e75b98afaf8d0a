// SPDX-License-Identifier: Apache-2.0
//! Ports command implementation.

use anyhow::{Context, Result};
use console::style;

use adverbs::{PortAttributes, Verbs};

use super::common::{self, DeviceSelector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayerFilter {
    Infiniband,
    Ethernet,
}

impl LinkLayerFilter {
    pub fn matches(self, port: &PortAttributes) -> bool {
        match self {
            LinkLayerFilter::Infiniband => port.is_infiniband(),
            LinkLayerFilter::Ethernet => port.is_ethernet(),
        }
    }
}

/// Whether `port` passes the command-line filters.
pub fn keep(port: &PortAttributes, active_only: bool, link_layer: Option<LinkLayerFilter>) -> bool {
    (!active_only || port.is_active()) && link_layer.is_none_or(|ll| ll.matches(port))
}

/// Open `name` and query the ports that pass the filters.
pub fn select_ports(
    verbs: &Verbs,
    name: &str,
    active_only: bool,
    link_layer: Option<LinkLayerFilter>,
) -> Result<Vec<PortAttributes>> {
    let device = common::find_device(verbs, &DeviceSelector::Name(name.to_string()))?;
    let ctx = device
        .open()
        .with_context(|| format!("Failed to open {name}"))?;

    Ok(ctx.query_port_attributes_filtered(|p| keep(p, active_only, link_layer))?)
}

/// Execute the ports command.
pub fn execute(
    verbs: &Verbs,
    name: &str,
    active_only: bool,
    link_layer: Option<LinkLayerFilter>,
    json: bool,
) -> Result<()> {
    let ports = select_ports(verbs, name, active_only, link_layer)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    if ports.is_empty() {
        println!("{}", style(format!("No matching ports on {name}")).dim());
        return Ok(());
    }

    println!("hca_id:\t{}", style(name).cyan().bold());
    for port in &ports {
        common::print_port(port);
    }

    Ok(())
}
