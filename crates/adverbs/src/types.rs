// SPDX-License-Identifier: Apache-2.0
//! Symbolic views of the native verbs constant tables.
//!
//! Every enum keeps an `Other(raw)` arm so that a value this crate does not
//! know about still converts back to the exact native number. Flag sets are
//! `bitflags` types built with `from_bits_retain`, which keeps unknown bits.

use std::fmt;

use bitflags::bitflags;
use serde::{Serialize, Serializer};

use crate::ffi;

macro_rules! native_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $raw:path => $sym:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A native value without a symbolic name in this crate.
            Other(i32),
        }

        impl $name {
            /// All named variants, in native declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Convert from the native numeric encoding.
            pub fn from_raw(raw: i32) -> Self {
                match raw {
                    $( $raw => $name::$variant, )+
                    other => $name::Other(other),
                }
            }

            /// The native numeric encoding.
            pub fn as_raw(self) -> i32 {
                match self {
                    $( $name::$variant => $raw, )+
                    $name::Other(raw) => raw,
                }
            }

            /// The stable symbolic name (the verbs.h constant name).
            pub fn name(self) -> Option<&'static str> {
                match self {
                    $( $name::$variant => Some($sym), )+
                    $name::Other(_) => None,
                }
            }

            /// Look up a variant by its symbolic name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $sym => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<i32> for $name {
            fn from(raw: i32) -> Self {
                $name::from_raw(raw)
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value.as_raw()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.name() {
                    Some(name) => serializer.serialize_str(name),
                    None => serializer.serialize_i32(self.as_raw()),
                }
            }
        }
    };
}

native_enum! {
    /// `enum ibv_node_type`.
    pub enum NodeType {
        Unknown = ffi::IBV_NODE_UNKNOWN => "IBV_NODE_UNKNOWN",
        /// InfiniBand channel adapter.
        Ca = ffi::IBV_NODE_CA => "IBV_NODE_CA",
        Switch = ffi::IBV_NODE_SWITCH => "IBV_NODE_SWITCH",
        Router = ffi::IBV_NODE_ROUTER => "IBV_NODE_ROUTER",
        /// iWARP / RDMA NIC.
        Rnic = ffi::IBV_NODE_RNIC => "IBV_NODE_RNIC",
        Usnic = ffi::IBV_NODE_USNIC => "IBV_NODE_USNIC",
        UsnicUdp = ffi::IBV_NODE_USNIC_UDP => "IBV_NODE_USNIC_UDP",
        Unspecified = ffi::IBV_NODE_UNSPECIFIED => "IBV_NODE_UNSPECIFIED",
    }
}

impl NodeType {
    /// Human-readable description, matching `ibv_node_type_str`.
    pub fn description(self) -> &'static str {
        match self {
            NodeType::Ca => "InfiniBand channel adapter",
            NodeType::Switch => "InfiniBand switch",
            NodeType::Router => "InfiniBand router",
            NodeType::Rnic => "iWARP NIC",
            NodeType::Usnic => "usNIC",
            NodeType::UsnicUdp => "usNIC UDP",
            NodeType::Unspecified => "unspecified",
            NodeType::Unknown | NodeType::Other(_) => "unknown",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

native_enum! {
    /// `enum ibv_transport_type`.
    pub enum TransportType {
        Unknown = ffi::IBV_TRANSPORT_UNKNOWN => "IBV_TRANSPORT_UNKNOWN",
        Ib = ffi::IBV_TRANSPORT_IB => "IBV_TRANSPORT_IB",
        Iwarp = ffi::IBV_TRANSPORT_IWARP => "IBV_TRANSPORT_IWARP",
        Usnic = ffi::IBV_TRANSPORT_USNIC => "IBV_TRANSPORT_USNIC",
        UsnicUdp = ffi::IBV_TRANSPORT_USNIC_UDP => "IBV_TRANSPORT_USNIC_UDP",
        Unspecified = ffi::IBV_TRANSPORT_UNSPECIFIED => "IBV_TRANSPORT_UNSPECIFIED",
    }
}

native_enum! {
    /// `enum ibv_atomic_cap`.
    pub enum AtomicCap {
        None = ffi::IBV_ATOMIC_NONE => "IBV_ATOMIC_NONE",
        /// Atomic operations are atomic with respect to this HCA only.
        Hca = ffi::IBV_ATOMIC_HCA => "IBV_ATOMIC_HCA",
        /// Atomic operations are globally atomic.
        Glob = ffi::IBV_ATOMIC_GLOB => "IBV_ATOMIC_GLOB",
    }
}

native_enum! {
    /// `enum ibv_port_state`.
    pub enum PortState {
        Nop = ffi::IBV_PORT_NOP => "IBV_PORT_NOP",
        Down = ffi::IBV_PORT_DOWN => "IBV_PORT_DOWN",
        Init = ffi::IBV_PORT_INIT => "IBV_PORT_INIT",
        Armed = ffi::IBV_PORT_ARMED => "IBV_PORT_ARMED",
        Active = ffi::IBV_PORT_ACTIVE => "IBV_PORT_ACTIVE",
        ActiveDefer = ffi::IBV_PORT_ACTIVE_DEFER => "IBV_PORT_ACTIVE_DEFER",
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Same spelling as ibv_port_state_str().
        let s = match self {
            PortState::Nop => "PORT_NOP",
            PortState::Down => "PORT_DOWN",
            PortState::Init => "PORT_INIT",
            PortState::Armed => "PORT_ARMED",
            PortState::Active => "PORT_ACTIVE",
            PortState::ActiveDefer => "PORT_ACTIVE_DEFER",
            PortState::Other(_) => "invalid state",
        };
        f.write_str(s)
    }
}

native_enum! {
    /// `enum ibv_mtu`.
    pub enum Mtu {
        Mtu256 = ffi::IBV_MTU_256 => "IBV_MTU_256",
        Mtu512 = ffi::IBV_MTU_512 => "IBV_MTU_512",
        Mtu1024 = ffi::IBV_MTU_1024 => "IBV_MTU_1024",
        Mtu2048 = ffi::IBV_MTU_2048 => "IBV_MTU_2048",
        Mtu4096 = ffi::IBV_MTU_4096 => "IBV_MTU_4096",
    }
}

impl Mtu {
    /// MTU in bytes, `None` for values outside the enum.
    pub fn bytes(self) -> Option<u32> {
        match self {
            Mtu::Mtu256 => Some(256),
            Mtu::Mtu512 => Some(512),
            Mtu::Mtu1024 => Some(1024),
            Mtu::Mtu2048 => Some(2048),
            Mtu::Mtu4096 => Some(4096),
            Mtu::Other(_) => None,
        }
    }
}

impl fmt::Display for Mtu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes() {
            Some(bytes) => write!(f, "{bytes}"),
            None => write!(f, "invalid MTU ({})", self.as_raw()),
        }
    }
}

native_enum! {
    /// `IBV_LINK_LAYER_*`.
    pub enum LinkLayer {
        Unspecified = ffi::IBV_LINK_LAYER_UNSPECIFIED => "IBV_LINK_LAYER_UNSPECIFIED",
        Infiniband = ffi::IBV_LINK_LAYER_INFINIBAND => "IBV_LINK_LAYER_INFINIBAND",
        Ethernet = ffi::IBV_LINK_LAYER_ETHERNET => "IBV_LINK_LAYER_ETHERNET",
    }
}

impl fmt::Display for LinkLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            // ibv_devinfo reports an unspecified link layer as InfiniBand.
            LinkLayer::Unspecified | LinkLayer::Infiniband => "InfiniBand",
            LinkLayer::Ethernet => "Ethernet",
            LinkLayer::Other(_) => "Unknown",
        };
        f.write_str(s)
    }
}

native_enum! {
    /// Physical port state as reported in `ibv_port_attr::phys_state`.
    pub enum PhysPortState {
        Sleep = ffi::IBV_PORT_PHYS_STATE_SLEEP => "IBV_PORT_PHYS_STATE_SLEEP",
        Polling = ffi::IBV_PORT_PHYS_STATE_POLLING => "IBV_PORT_PHYS_STATE_POLLING",
        Disabled = ffi::IBV_PORT_PHYS_STATE_DISABLED => "IBV_PORT_PHYS_STATE_DISABLED",
        PortConfigurationTraining = ffi::IBV_PORT_PHYS_STATE_PORT_CONFIGURATION_TRAINING
            => "IBV_PORT_PHYS_STATE_PORT_CONFIGURATION_TRAINING",
        LinkUp = ffi::IBV_PORT_PHYS_STATE_LINK_UP => "IBV_PORT_PHYS_STATE_LINK_UP",
        LinkErrorRecovery = ffi::IBV_PORT_PHYS_STATE_LINK_ERROR_RECOVERY
            => "IBV_PORT_PHYS_STATE_LINK_ERROR_RECOVERY",
        PhyTest = ffi::IBV_PORT_PHYS_STATE_PHY_TEST => "IBV_PORT_PHYS_STATE_PHY_TEST",
    }
}

native_enum! {
    /// `enum ibv_gid_type`.
    pub enum GidType {
        Ib = ffi::IBV_GID_TYPE_IB => "IBV_GID_TYPE_IB",
        RoceV1 = ffi::IBV_GID_TYPE_ROCE_V1 => "IBV_GID_TYPE_ROCE_V1",
        RoceV2 = ffi::IBV_GID_TYPE_ROCE_V2 => "IBV_GID_TYPE_ROCE_V2",
    }
}

native_enum! {
    /// `enum ibv_fork_status`.
    pub enum ForkStatus {
        Disabled = ffi::IBV_FORK_DISABLED => "IBV_FORK_DISABLED",
        Enabled = ffi::IBV_FORK_ENABLED => "IBV_FORK_ENABLED",
        Unneeded = ffi::IBV_FORK_UNNEEDED => "IBV_FORK_UNNEEDED",
    }
}

bitflags! {
    /// `enum ibv_device_cap_flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    #[serde(transparent)]
    pub struct DeviceCapFlags: u32 {
        const RESIZE_MAX_WR = 1;
        const BAD_PKEY_CNTR = 1 << 1;
        const BAD_QKEY_CNTR = 1 << 2;
        const RAW_MULTI = 1 << 3;
        const AUTO_PATH_MIG = 1 << 4;
        const CHANGE_PHY_PORT = 1 << 5;
        const UD_AV_PORT_ENFORCE = 1 << 6;
        const CURR_QP_STATE_MOD = 1 << 7;
        const SHUTDOWN_PORT = 1 << 8;
        const INIT_TYPE = 1 << 9;
        const PORT_ACTIVE_EVENT = 1 << 10;
        const SYS_IMAGE_GUID = 1 << 11;
        const RC_RNR_NAK_GEN = 1 << 12;
        const SRQ_RESIZE = 1 << 13;
        const N_NOTIFY_CQ = 1 << 14;
        const MEM_WINDOW = 1 << 17;
        const UD_IP_CSUM = 1 << 18;
        const XRC = 1 << 20;
        const MEM_MGT_EXTENSIONS = 1 << 21;
        const MEM_WINDOW_TYPE_2A = 1 << 23;
        const MEM_WINDOW_TYPE_2B = 1 << 24;
        const RC_IP_CSUM = 1 << 25;
        const RAW_IP_CSUM = 1 << 26;
        const MANAGED_FLOW_STEERING = 1 << 29;
    }
}

bitflags! {
    /// `enum ibv_port_cap_flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    #[serde(transparent)]
    pub struct PortCapFlags: u32 {
        const SM = 1 << 1;
        const NOTICE_SUP = 1 << 2;
        const TRAP_SUP = 1 << 3;
        const OPT_IPD_SUP = 1 << 4;
        const AUTO_MIGR_SUP = 1 << 5;
        const SL_MAP_SUP = 1 << 6;
        const MKEY_NVRAM = 1 << 7;
        const PKEY_NVRAM = 1 << 8;
        const LED_INFO_SUP = 1 << 9;
        const SYS_IMAGE_GUID_SUP = 1 << 11;
        const PKEY_SW_EXT_PORT_TRAP_SUP = 1 << 12;
        const EXTENDED_SPEEDS_SUP = 1 << 14;
        const CAP_MASK2_SUP = 1 << 15;
        const CM_SUP = 1 << 16;
        const SNMP_TUNNEL_SUP = 1 << 17;
        const REINIT_SUP = 1 << 18;
        const DEVICE_MGMT_SUP = 1 << 19;
        const VENDOR_CLASS_SUP = 1 << 20;
        const DR_NOTICE_SUP = 1 << 21;
        const CAP_MASK_NOTICE_SUP = 1 << 22;
        const BOOT_MGMT_SUP = 1 << 23;
        const LINK_LATENCY_SUP = 1 << 24;
        const CLIENT_REG_SUP = 1 << 25;
        const IP_BASED_GIDS = 1 << 26;
    }
}

bitflags! {
    /// `enum ibv_port_cap_flags2`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    #[serde(transparent)]
    pub struct PortCapFlags2: u16 {
        const SET_NODE_DESC_SUP = 1;
        const INFO_EXT_SUP = 1 << 1;
        const VIRT_SUP = 1 << 2;
        const SWITCH_PORT_STATE_TABLE_SUP = 1 << 3;
        const LINK_WIDTH_2X_SUP = 1 << 4;
        const LINK_SPEED_HDR_SUP = 1 << 5;
        const LINK_SPEED_NDR_SUP = 1 << 10;
        const LINK_SPEED_XDR_SUP = 1 << 12;
    }
}

/// A 64-bit node or device GUID.
///
/// Stored exactly as verbs hands it out (`__be64`, network byte order), so
/// equality against another native GUID is a plain comparison. Use
/// [`Guid::to_host`] for the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid(u64);

impl Guid {
    /// Wrap a raw `__be64` value as returned by the library.
    pub const fn from_raw(raw: u64) -> Self {
        Guid(raw)
    }

    /// Build a GUID from its host-order numeric value.
    pub const fn from_host(value: u64) -> Self {
        Guid(value.to_be())
    }

    /// The raw `__be64` value.
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// The numeric value in host byte order.
    pub const fn to_host(self) -> u64 {
        u64::from_be(self.0)
    }
}

impl fmt::Display for Guid {
    /// `xxxx:xxxx:xxxx:xxxx`, as printed by `ibv_devices`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.to_host();
        write!(
            f,
            "{:04x}:{:04x}:{:04x}:{:04x}",
            (v >> 48) & 0xffff,
            (v >> 32) & 0xffff,
            (v >> 16) & 0xffff,
            v & 0xffff
        )
    }
}

impl std::str::FromStr for Guid {
    type Err = std::num::ParseIntError;

    /// Accepts `xxxx:xxxx:xxxx:xxxx`, plain hex, or `0x`-prefixed hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.trim().trim_start_matches("0x").replace(':', "");
        u64::from_str_radix(&digits, 16).map(Guid::from_host)
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A flag set whose verbs.h constants share one name prefix.
///
/// The Rust constants drop the prefix (`PortCapFlags::SM`); the symbolic
/// names surfaced by [`flag_names`] and [`flag_from_name`] carry it
/// (`IBV_PORT_SM`), the same convention [`NodeType::name`] and friends use.
pub trait NativeFlags: bitflags::Flags + 'static {
    const PREFIX: &'static str;
}

impl NativeFlags for DeviceCapFlags {
    const PREFIX: &'static str = "IBV_DEVICE_";
}

impl NativeFlags for PortCapFlags {
    const PREFIX: &'static str = "IBV_PORT_";
}

impl NativeFlags for PortCapFlags2 {
    const PREFIX: &'static str = "IBV_PORT_";
}

/// verbs.h names of every known flag set in `flags`, in bit order.
///
/// Unknown bits are not named; they remain visible through `bits()`.
pub fn flag_names<F: NativeFlags>(flags: &F) -> Vec<String> {
    flags
        .iter_names()
        .map(|(name, _)| format!("{}{name}", F::PREFIX))
        .collect()
}

/// The single flag with verbs.h name `name`.
pub fn flag_from_name<F: NativeFlags>(name: &str) -> Option<F> {
    name.strip_prefix(F::PREFIX).and_then(F::from_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_node_type_roundtrip_named() {
        for &node in NodeType::ALL {
            assert_eq!(NodeType::from_raw(node.as_raw()), node);
            let name = node.name().unwrap();
            assert_eq!(NodeType::from_name(name), Some(node));
        }
    }

    #[test]
    fn test_unknown_native_value_is_kept() {
        let node = NodeType::from_raw(42);
        assert_eq!(node, NodeType::Other(42));
        assert_eq!(node.as_raw(), 42);
        assert_eq!(node.name(), None);
        assert_eq!(node.description(), "unknown");
    }

    #[test]
    fn test_node_type_values() {
        assert_eq!(NodeType::from_raw(-1), NodeType::Unknown);
        assert_eq!(NodeType::from_raw(1), NodeType::Ca);
        assert_eq!(NodeType::from_raw(4), NodeType::Rnic);
        assert_eq!(NodeType::Ca.to_string(), "InfiniBand channel adapter");
    }

    #[test]
    fn test_mtu_bytes() {
        assert_eq!(Mtu::from_raw(1).bytes(), Some(256));
        assert_eq!(Mtu::from_raw(5).bytes(), Some(4096));
        assert_eq!(Mtu::from_raw(9).bytes(), None);
        assert_eq!(Mtu::Mtu4096.to_string(), "4096");
    }

    #[test]
    fn test_port_state_display() {
        assert_eq!(PortState::from_raw(4).to_string(), "PORT_ACTIVE");
        assert_eq!(PortState::Other(17).to_string(), "invalid state");
    }

    #[test]
    fn test_link_layer_display() {
        assert_eq!(LinkLayer::from_raw(0).to_string(), "InfiniBand");
        assert_eq!(LinkLayer::from_raw(2).to_string(), "Ethernet");
    }

    #[test]
    fn test_enum_serializes_to_symbolic_name() {
        let json = serde_json::to_string(&AtomicCap::Hca).unwrap();
        assert_eq!(json, "\"IBV_ATOMIC_HCA\"");
        let json = serde_json::to_string(&AtomicCap::Other(9)).unwrap();
        assert_eq!(json, "9");
    }

    #[test]
    fn test_expand_port_flags() {
        let flags = PortCapFlags::from_bits_retain((1 << 1) | (1 << 16) | (1 << 26));
        assert_eq!(
            flag_names(&flags),
            vec!["IBV_PORT_SM", "IBV_PORT_CM_SUP", "IBV_PORT_IP_BASED_GIDS"]
        );
    }

    #[test]
    fn test_expand_port_flags2() {
        let flags = PortCapFlags2::from_bits_retain((1 << 5) | (1 << 10));
        assert_eq!(
            flag_names(&flags),
            vec!["IBV_PORT_LINK_SPEED_HDR_SUP", "IBV_PORT_LINK_SPEED_NDR_SUP"]
        );
    }

    #[test]
    fn test_device_flag_names() {
        assert_eq!(
            flag_from_name::<DeviceCapFlags>("IBV_DEVICE_MANAGED_FLOW_STEERING"),
            Some(DeviceCapFlags::MANAGED_FLOW_STEERING)
        );
        assert_eq!(flag_from_name::<DeviceCapFlags>("MANAGED_FLOW_STEERING"), None);
        assert_eq!(flag_from_name::<PortCapFlags>("IBV_DEVICE_XRC"), None);
    }

    #[test]
    fn test_flag_and_enum_names_share_prefix_convention() {
        let flags = PortCapFlags::SM | PortCapFlags::CM_SUP;
        for name in flag_names(&flags) {
            assert!(name.starts_with("IBV_PORT_"), "{name}");
            assert!(flag_from_name::<PortCapFlags>(&name).is_some());
        }
        assert!(PortState::Active.name().unwrap().starts_with("IBV_PORT_"));
    }

    #[test]
    fn test_guid_display_and_parse() {
        let guid = Guid::from_host(0x0002_c903_0010_abcd);
        assert_eq!(guid.to_string(), "0002:c903:0010:abcd");
        assert_eq!("0002:c903:0010:abcd".parse::<Guid>().unwrap(), guid);
        assert_eq!("0x2c9030010abcd".parse::<Guid>().unwrap(), guid);
        assert_eq!(Guid::from_raw(guid.as_raw()), guid);
    }

    proptest! {
        #[test]
        fn prop_device_cap_flags_keep_unknown_bits(raw in any::<u32>()) {
            prop_assert_eq!(DeviceCapFlags::from_bits_retain(raw).bits(), raw);
        }

        #[test]
        fn prop_port_state_raw_is_lossless(raw in any::<i32>()) {
            prop_assert_eq!(PortState::from_raw(raw).as_raw(), raw);
        }
    }
}
