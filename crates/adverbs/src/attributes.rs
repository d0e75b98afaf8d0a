// SPDX-License-Identifier: Apache-2.0
//! Owned device and port attribute snapshots.
//!
//! Each query on a [`Context`](crate::Context) produces a fresh value; nothing
//! here refers back to native memory or is cached between calls.

use serde::Serialize;

use crate::ffi;
use crate::types::{
    AtomicCap, DeviceCapFlags, Guid, LinkLayer, Mtu, PhysPortState, PortCapFlags, PortCapFlags2,
    PortState,
};

// ---------------------------------------------------------------------------
// Device attributes
// ---------------------------------------------------------------------------

/// Capabilities of an opened device (`struct ibv_device_attr`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceAttributes {
    /// Firmware version string.
    pub fw_ver: String,
    pub node_guid: Guid,
    pub sys_image_guid: Guid,
    /// Largest memory region that can be registered, in bytes.
    pub max_mr_size: u64,
    pub page_size_cap: u64,
    pub vendor_id: u32,
    pub vendor_part_id: u32,
    pub hw_ver: u32,
    pub max_qp: i32,
    pub max_qp_wr: i32,
    pub device_cap_flags: DeviceCapFlags,
    pub max_sge: i32,
    pub max_sge_rd: i32,
    pub max_cq: i32,
    pub max_cqe: i32,
    pub max_mr: i32,
    pub max_pd: i32,
    pub max_qp_rd_atom: i32,
    pub max_ee_rd_atom: i32,
    pub max_res_rd_atom: i32,
    pub max_qp_init_rd_atom: i32,
    pub max_ee_init_rd_atom: i32,
    pub atomic_cap: AtomicCap,
    pub max_ee: i32,
    pub max_rdd: i32,
    pub max_mw: i32,
    pub max_raw_ipv6_qp: i32,
    pub max_raw_ethy_qp: i32,
    pub max_mcast_grp: i32,
    pub max_mcast_qp_attach: i32,
    pub max_total_mcast_qp_attach: i32,
    pub max_ah: i32,
    pub max_fmr: i32,
    pub max_map_per_fmr: i32,
    pub max_srq: i32,
    pub max_srq_wr: i32,
    pub max_srq_sge: i32,
    pub max_pkeys: u16,
    pub local_ca_ack_delay: u8,
    /// Number of physical ports; ports are numbered `1..=phys_port_cnt`.
    pub phys_port_cnt: u8,
}

impl DeviceAttributes {
    /// Copy every field out of a native attribute struct.
    pub fn from_raw(raw: &ffi::IbvDeviceAttr) -> Self {
        Self {
            fw_ver: ffi::fixed_string(&raw.fw_ver),
            node_guid: Guid::from_raw(raw.node_guid),
            sys_image_guid: Guid::from_raw(raw.sys_image_guid),
            max_mr_size: raw.max_mr_size,
            page_size_cap: raw.page_size_cap,
            vendor_id: raw.vendor_id,
            vendor_part_id: raw.vendor_part_id,
            hw_ver: raw.hw_ver,
            max_qp: raw.max_qp,
            max_qp_wr: raw.max_qp_wr,
            device_cap_flags: DeviceCapFlags::from_bits_retain(raw.device_cap_flags),
            max_sge: raw.max_sge,
            max_sge_rd: raw.max_sge_rd,
            max_cq: raw.max_cq,
            max_cqe: raw.max_cqe,
            max_mr: raw.max_mr,
            max_pd: raw.max_pd,
            max_qp_rd_atom: raw.max_qp_rd_atom,
            max_ee_rd_atom: raw.max_ee_rd_atom,
            max_res_rd_atom: raw.max_res_rd_atom,
            max_qp_init_rd_atom: raw.max_qp_init_rd_atom,
            max_ee_init_rd_atom: raw.max_ee_init_rd_atom,
            atomic_cap: AtomicCap::from_raw(raw.atomic_cap),
            max_ee: raw.max_ee,
            max_rdd: raw.max_rdd,
            max_mw: raw.max_mw,
            max_raw_ipv6_qp: raw.max_raw_ipv6_qp,
            max_raw_ethy_qp: raw.max_raw_ethy_qp,
            max_mcast_grp: raw.max_mcast_grp,
            max_mcast_qp_attach: raw.max_mcast_qp_attach,
            max_total_mcast_qp_attach: raw.max_total_mcast_qp_attach,
            max_ah: raw.max_ah,
            max_fmr: raw.max_fmr,
            max_map_per_fmr: raw.max_map_per_fmr,
            max_srq: raw.max_srq,
            max_srq_wr: raw.max_srq_wr,
            max_srq_sge: raw.max_srq_sge,
            max_pkeys: raw.max_pkeys,
            local_ca_ack_delay: raw.local_ca_ack_delay,
            phys_port_cnt: raw.phys_port_cnt,
        }
    }

    /// Port numbers of this device, in query order.
    pub fn port_numbers(&self) -> impl Iterator<Item = u8> {
        1..=self.phys_port_cnt
    }
}

// ---------------------------------------------------------------------------
// Port attributes
// ---------------------------------------------------------------------------

/// State and capabilities of one physical port (`struct ibv_port_attr`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortAttributes {
    /// 1-based port number this snapshot was queried for.
    pub port_num: u8,
    pub state: PortState,
    pub max_mtu: Mtu,
    pub active_mtu: Mtu,
    pub gid_tbl_len: i32,
    pub port_cap_flags: PortCapFlags,
    pub max_msg_sz: u32,
    pub bad_pkey_cntr: u32,
    pub qkey_viol_cntr: u32,
    pub pkey_tbl_len: u16,
    pub lid: u16,
    pub sm_lid: u16,
    pub lmc: u8,
    pub max_vl_num: u8,
    pub sm_sl: u8,
    pub subnet_timeout: u8,
    pub init_type_reply: u8,
    pub active_width: u8,
    pub active_speed: u8,
    pub phys_state: PhysPortState,
    pub link_layer: LinkLayer,
    pub flags: u8,
    /// Extended capability mask.
    ///
    /// The exported `ibv_query_port` entry point fills only the compat
    /// prefix of the struct, so on real hardware this reads empty even when
    /// the port has capabilities. Treat an empty set as "not reported".
    pub port_cap_flags2: PortCapFlags2,
    /// Extended active speed; not reported through `ibv_query_port`, reads 0
    /// for the same reason as [`port_cap_flags2`](Self::port_cap_flags2).
    pub active_speed_ex: u32,
}

impl PortAttributes {
    /// Copy every field out of a native port attribute struct.
    pub fn from_raw(port_num: u8, raw: &ffi::IbvPortAttr) -> Self {
        Self {
            port_num,
            state: PortState::from_raw(raw.state),
            max_mtu: Mtu::from_raw(raw.max_mtu),
            active_mtu: Mtu::from_raw(raw.active_mtu),
            gid_tbl_len: raw.gid_tbl_len,
            port_cap_flags: PortCapFlags::from_bits_retain(raw.port_cap_flags),
            max_msg_sz: raw.max_msg_sz,
            bad_pkey_cntr: raw.bad_pkey_cntr,
            qkey_viol_cntr: raw.qkey_viol_cntr,
            pkey_tbl_len: raw.pkey_tbl_len,
            lid: raw.lid,
            sm_lid: raw.sm_lid,
            lmc: raw.lmc,
            max_vl_num: raw.max_vl_num,
            sm_sl: raw.sm_sl,
            subnet_timeout: raw.subnet_timeout,
            init_type_reply: raw.init_type_reply,
            active_width: raw.active_width,
            active_speed: raw.active_speed,
            phys_state: PhysPortState::from_raw(i32::from(raw.phys_state)),
            link_layer: LinkLayer::from_raw(i32::from(raw.link_layer)),
            flags: raw.flags,
            port_cap_flags2: PortCapFlags2::from_bits_retain(raw.port_cap_flags2),
            active_speed_ex: raw.active_speed_ex,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == PortState::Active
    }

    /// InfiniBand link layer. Providers that leave the field unspecified are
    /// InfiniBand by convention.
    pub fn is_infiniband(&self) -> bool {
        matches!(self.link_layer, LinkLayer::Infiniband | LinkLayer::Unspecified)
    }

    /// Ethernet link layer (RoCE).
    pub fn is_ethernet(&self) -> bool {
        self.link_layer == LinkLayer::Ethernet
    }
}
