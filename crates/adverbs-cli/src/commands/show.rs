// SPDX-License-Identifier: Apache-2.0
//! Show command implementation: one device, `ibv_devinfo` style.

use anyhow::{Context, Result};
use console::style;

use adverbs::types::flag_names;
use adverbs::{Device, DeviceAttributes, PortAttributes, Verbs};

use super::common::{self, DeviceSelector};

/// Everything `show` prints about one device.
pub struct DeviceReport {
    pub device: Device,
    pub attributes: DeviceAttributes,
    pub ports: Vec<PortAttributes>,
}

impl DeviceReport {
    /// Find the device, open it and query the device and every port.
    pub fn collect(verbs: &Verbs, selector: &DeviceSelector) -> Result<Self> {
        let device = common::find_device(verbs, selector)?;
        let ctx = device
            .open()
            .with_context(|| format!("Failed to open {}", device.name()))?;

        let attributes = ctx.query_device_attributes()?;
        let ports = ctx.query_port_attributes()?;
        Ok(Self {
            device,
            attributes,
            ports,
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "device": self.device,
            "attributes": self.attributes,
            "ports": self.ports,
        })
    }
}

/// Execute the show command.
pub fn execute(verbs: &Verbs, selector: &DeviceSelector, json: bool) -> Result<()> {
    let report = DeviceReport::collect(verbs, selector)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        return Ok(());
    }

    let DeviceReport {
        device,
        attributes: attrs,
        ports,
    } = &report;

    let transport = device
        .transport_type()
        .name()
        .map_or_else(|| "unknown".to_string(), common::short_name);

    println!("hca_id:\t{}", style(device.name()).cyan().bold());
    println!(
        "\ttransport:\t\t\t{} ({})",
        transport,
        device.transport_type().as_raw()
    );
    println!("\tkernel_index:\t\t\t{}", device.kernel_index());
    println!("\tfw_ver:\t\t\t\t{}", attrs.fw_ver);
    println!("\tnode_guid:\t\t\t{}", attrs.node_guid);
    println!("\tsys_image_guid:\t\t\t{}", attrs.sys_image_guid);
    println!("\tvendor_id:\t\t\t0x{:04x}", attrs.vendor_id);
    println!("\tvendor_part_id:\t\t\t{}", attrs.vendor_part_id);
    println!("\thw_ver:\t\t\t\t0x{:x}", attrs.hw_ver);
    println!("\tphys_port_cnt:\t\t\t{}", attrs.phys_port_cnt);
    println!("\tmax_mr_size:\t\t\t0x{:x}", attrs.max_mr_size);
    println!("\tpage_size_cap:\t\t\t0x{:x}", attrs.page_size_cap);
    println!("\tmax_qp:\t\t\t\t{}", attrs.max_qp);
    println!("\tmax_qp_wr:\t\t\t{}", attrs.max_qp_wr);
    println!("\tmax_sge:\t\t\t{}", attrs.max_sge);
    println!("\tmax_cq:\t\t\t\t{}", attrs.max_cq);
    println!("\tmax_cqe:\t\t\t{}", attrs.max_cqe);
    println!("\tmax_mr:\t\t\t\t{}", attrs.max_mr);
    println!("\tmax_pd:\t\t\t\t{}", attrs.max_pd);
    println!("\tmax_srq:\t\t\t{}", attrs.max_srq);
    println!("\tmax_pkeys:\t\t\t{}", attrs.max_pkeys);
    println!(
        "\tatomic_cap:\t\t\t{} ({})",
        attrs
            .atomic_cap
            .name()
            .map_or_else(|| "unknown".to_string(), common::short_name),
        attrs.atomic_cap.as_raw()
    );
    println!(
        "\tdevice_cap_flags:\t\t0x{:08x}",
        attrs.device_cap_flags.bits()
    );
    for flag in flag_names(&attrs.device_cap_flags) {
        println!("\t\t\t\t\t{flag}");
    }

    for port in ports {
        common::print_port(port);
    }

    Ok(())
}
