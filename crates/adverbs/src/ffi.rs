// SPDX-License-Identifier: Apache-2.0
//! Raw layouts, constants and entry-point signatures of the libibverbs API.
//!
//! These definitions must match `<infiniband/verbs.h>` from rdma-core. The
//! library is not linked at build time; every entry point is resolved at
//! runtime from `libibverbs.so.1` (see [`crate::loader`]).
//!
//! Only the device-discovery and query subset is declared here. Queue pairs,
//! memory regions and the rest of the data plane are not bound.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

// ===========================================================================
// Sizes
// ===========================================================================

/// `IBV_SYSFS_NAME_MAX`: capacity of the `name` / `dev_name` fields.
pub const IBV_SYSFS_NAME_MAX: usize = 64;

/// `IBV_SYSFS_PATH_MAX`: capacity of the `dev_path` / `ibdev_path` fields.
pub const IBV_SYSFS_PATH_MAX: usize = 256;

// ===========================================================================
// Opaque handles
// ===========================================================================

/// `struct ibv_context`. Never dereferenced on the Rust side.
#[repr(C)]
pub struct IbvContext {
    _private: [u8; 0],
}

// ===========================================================================
// struct ibv_device
// ===========================================================================

/// `struct ibv_device`, one entry of the list returned by
/// `ibv_get_device_list`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IbvDevice {
    /// `struct _ibv_device_ops`: two legacy function pointers.
    pub _ops: [*mut c_void; 2],
    pub node_type: c_int,
    pub transport_type: c_int,
    pub name: [c_char; IBV_SYSFS_NAME_MAX],
    pub dev_name: [c_char; IBV_SYSFS_NAME_MAX],
    pub dev_path: [c_char; IBV_SYSFS_PATH_MAX],
    pub ibdev_path: [c_char; IBV_SYSFS_PATH_MAX],
}

impl Default for IbvDevice {
    fn default() -> Self {
        Self {
            _ops: [std::ptr::null_mut(); 2],
            node_type: IBV_NODE_UNKNOWN,
            transport_type: IBV_TRANSPORT_UNKNOWN,
            name: [0; IBV_SYSFS_NAME_MAX],
            dev_name: [0; IBV_SYSFS_NAME_MAX],
            dev_path: [0; IBV_SYSFS_PATH_MAX],
            ibdev_path: [0; IBV_SYSFS_PATH_MAX],
        }
    }
}

// ===========================================================================
// struct ibv_device_attr
// ===========================================================================

/// `struct ibv_device_attr`, filled by `ibv_query_device`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct IbvDeviceAttr {
    pub fw_ver: [c_char; 64],
    /// Big-endian (`__be64`).
    pub node_guid: u64,
    /// Big-endian (`__be64`).
    pub sys_image_guid: u64,
    pub max_mr_size: u64,
    pub page_size_cap: u64,
    pub vendor_id: u32,
    pub vendor_part_id: u32,
    pub hw_ver: u32,
    pub max_qp: c_int,
    pub max_qp_wr: c_int,
    pub device_cap_flags: u32,
    pub max_sge: c_int,
    pub max_sge_rd: c_int,
    pub max_cq: c_int,
    pub max_cqe: c_int,
    pub max_mr: c_int,
    pub max_pd: c_int,
    pub max_qp_rd_atom: c_int,
    pub max_ee_rd_atom: c_int,
    pub max_res_rd_atom: c_int,
    pub max_qp_init_rd_atom: c_int,
    pub max_ee_init_rd_atom: c_int,
    pub atomic_cap: c_int,
    pub max_ee: c_int,
    pub max_rdd: c_int,
    pub max_mw: c_int,
    pub max_raw_ipv6_qp: c_int,
    pub max_raw_ethy_qp: c_int,
    pub max_mcast_grp: c_int,
    pub max_mcast_qp_attach: c_int,
    pub max_total_mcast_qp_attach: c_int,
    pub max_ah: c_int,
    pub max_fmr: c_int,
    pub max_map_per_fmr: c_int,
    pub max_srq: c_int,
    pub max_srq_wr: c_int,
    pub max_srq_sge: c_int,
    pub max_pkeys: u16,
    pub local_ca_ack_delay: u8,
    pub phys_port_cnt: u8,
}

impl Default for IbvDeviceAttr {
    fn default() -> Self {
        // SAFETY: every field is an integer or an integer array; all-zero is
        // a valid bit pattern.
        unsafe { std::mem::zeroed() }
    }
}

// ===========================================================================
// struct ibv_port_attr
// ===========================================================================

/// `struct ibv_port_attr`, filled by `ibv_query_port`.
///
/// The exported `ibv_query_port` symbol writes the compat prefix of this
/// struct (everything up to `flags`). `port_cap_flags2` and `active_speed_ex`
/// stay zero unless the provider fills the extended layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IbvPortAttr {
    pub state: c_int,
    pub max_mtu: c_int,
    pub active_mtu: c_int,
    pub gid_tbl_len: c_int,
    pub port_cap_flags: u32,
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
    pub phys_state: u8,
    pub link_layer: u8,
    pub flags: u8,
    pub port_cap_flags2: u16,
    pub active_speed_ex: u32,
}

// ===========================================================================
// enum ibv_node_type
// ===========================================================================

pub const IBV_NODE_UNKNOWN: c_int = -1;
pub const IBV_NODE_CA: c_int = 1;
pub const IBV_NODE_SWITCH: c_int = 2;
pub const IBV_NODE_ROUTER: c_int = 3;
pub const IBV_NODE_RNIC: c_int = 4;
pub const IBV_NODE_USNIC: c_int = 5;
pub const IBV_NODE_USNIC_UDP: c_int = 6;
pub const IBV_NODE_UNSPECIFIED: c_int = 7;

// ===========================================================================
// enum ibv_transport_type
// ===========================================================================

pub const IBV_TRANSPORT_UNKNOWN: c_int = -1;
pub const IBV_TRANSPORT_IB: c_int = 0;
pub const IBV_TRANSPORT_IWARP: c_int = 1;
pub const IBV_TRANSPORT_USNIC: c_int = 2;
pub const IBV_TRANSPORT_USNIC_UDP: c_int = 3;
pub const IBV_TRANSPORT_UNSPECIFIED: c_int = 4;

// ===========================================================================
// enum ibv_atomic_cap
// ===========================================================================

pub const IBV_ATOMIC_NONE: c_int = 0;
pub const IBV_ATOMIC_HCA: c_int = 1;
pub const IBV_ATOMIC_GLOB: c_int = 2;

// ===========================================================================
// enum ibv_port_state
// ===========================================================================

pub const IBV_PORT_NOP: c_int = 0;
pub const IBV_PORT_DOWN: c_int = 1;
pub const IBV_PORT_INIT: c_int = 2;
pub const IBV_PORT_ARMED: c_int = 3;
pub const IBV_PORT_ACTIVE: c_int = 4;
pub const IBV_PORT_ACTIVE_DEFER: c_int = 5;

// ===========================================================================
// enum ibv_mtu
// ===========================================================================

pub const IBV_MTU_256: c_int = 1;
pub const IBV_MTU_512: c_int = 2;
pub const IBV_MTU_1024: c_int = 3;
pub const IBV_MTU_2048: c_int = 4;
pub const IBV_MTU_4096: c_int = 5;

// ===========================================================================
// Link layer (IBV_LINK_LAYER_*)
// ===========================================================================

pub const IBV_LINK_LAYER_UNSPECIFIED: c_int = 0;
pub const IBV_LINK_LAYER_INFINIBAND: c_int = 1;
pub const IBV_LINK_LAYER_ETHERNET: c_int = 2;

// ===========================================================================
// Physical port state (IBTA `PortPhysicalState`, `phys_state`)
// ===========================================================================

pub const IBV_PORT_PHYS_STATE_SLEEP: c_int = 1;
pub const IBV_PORT_PHYS_STATE_POLLING: c_int = 2;
pub const IBV_PORT_PHYS_STATE_DISABLED: c_int = 3;
pub const IBV_PORT_PHYS_STATE_PORT_CONFIGURATION_TRAINING: c_int = 4;
pub const IBV_PORT_PHYS_STATE_LINK_UP: c_int = 5;
pub const IBV_PORT_PHYS_STATE_LINK_ERROR_RECOVERY: c_int = 6;
pub const IBV_PORT_PHYS_STATE_PHY_TEST: c_int = 7;

// ===========================================================================
// enum ibv_gid_type
// ===========================================================================

pub const IBV_GID_TYPE_IB: c_int = 0;
pub const IBV_GID_TYPE_ROCE_V1: c_int = 1;
pub const IBV_GID_TYPE_ROCE_V2: c_int = 2;

// ===========================================================================
// enum ibv_fork_status
// ===========================================================================

pub const IBV_FORK_DISABLED: c_int = 0;
pub const IBV_FORK_ENABLED: c_int = 1;
pub const IBV_FORK_UNNEEDED: c_int = 2;

// ===========================================================================
// Entry points
//
// Required:
//   ibv_get_device_list, ibv_free_device_list, ibv_get_device_guid,
//   ibv_open_device, ibv_close_device, ibv_query_device, ibv_query_port
// Optional (rdma-core >= v32):
//   ibv_get_device_index
// ===========================================================================

/// `struct ibv_device **ibv_get_device_list(int *num_devices)`
pub type FnGetDeviceList = unsafe extern "C" fn(num_devices: *mut c_int) -> *mut *mut IbvDevice;

/// `void ibv_free_device_list(struct ibv_device **list)`
pub type FnFreeDeviceList = unsafe extern "C" fn(list: *mut *mut IbvDevice);

/// `int ibv_get_device_index(struct ibv_device *device)`
pub type FnGetDeviceIndex = unsafe extern "C" fn(device: *mut IbvDevice) -> c_int;

/// `__be64 ibv_get_device_guid(struct ibv_device *device)`
pub type FnGetDeviceGuid = unsafe extern "C" fn(device: *mut IbvDevice) -> u64;

/// `struct ibv_context *ibv_open_device(struct ibv_device *device)`
pub type FnOpenDevice = unsafe extern "C" fn(device: *mut IbvDevice) -> *mut IbvContext;

/// `int ibv_close_device(struct ibv_context *context)`
pub type FnCloseDevice = unsafe extern "C" fn(context: *mut IbvContext) -> c_int;

/// `int ibv_query_device(struct ibv_context *context, struct ibv_device_attr *attr)`
pub type FnQueryDevice =
    unsafe extern "C" fn(context: *mut IbvContext, device_attr: *mut IbvDeviceAttr) -> c_int;

/// `int ibv_query_port(struct ibv_context *context, uint8_t port_num, struct ibv_port_attr *attr)`
pub type FnQueryPort = unsafe extern "C" fn(
    context: *mut IbvContext,
    port_num: u8,
    port_attr: *mut IbvPortAttr,
) -> c_int;

// ===========================================================================
// Fixed-size C string helpers
// ===========================================================================

/// Bytes of a fixed-size, NUL-padded C char array, up to the first NUL or
/// the end of the array, whichever comes first.
pub fn fixed_bytes(buf: &[c_char]) -> &[u8] {
    // SAFETY: c_char and u8 have identical size and alignment.
    let bytes = unsafe { std::slice::from_raw_parts(buf.as_ptr().cast::<u8>(), buf.len()) };
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Owned, lossily UTF-8 decoded copy of a fixed-size C char array.
pub fn fixed_string(buf: &[c_char]) -> String {
    String::from_utf8_lossy(fixed_bytes(buf)).into_owned()
}

/// Copy `value` into a fixed-size C char array, truncating so that a
/// terminating NUL always fits.
pub fn write_fixed(buf: &mut [c_char], value: &str) {
    buf.fill(0);
    let len = value.len().min(buf.len().saturating_sub(1));
    for (dst, &src) in buf.iter_mut().zip(&value.as_bytes()[..len]) {
        *dst = src as c_char;
    }
}
