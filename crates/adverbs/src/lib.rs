// SPDX-License-Identifier: Apache-2.0
//! # adverbs
//!
//! Safe, lifetime-correct access to a host's RDMA adapters through
//! `libibverbs`: enumerate devices, keep a stable handle to one, open a
//! context on it and query device and port capabilities.
//!
//! `libibverbs` is loaded at runtime via `dlopen`, so nothing here needs
//! rdma-core at build time.
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │     caller       │
//!                  └────────┬─────────┘
//!                           │ Device (owned snapshot)
//!                  ┌────────┴─────────┐
//!                  │     adverbs      │
//!                  │                  │
//!                  │  DeviceList      │ ← one enumeration, freed on drop
//!                  │  Device          │ ← copied identity, re-resolves by
//!                  │                  │   kernel index on open()
//!                  │  Context         │ ← shared, closed by the last clone
//!                  │  Verbs           │ ← driver handle (dlopen'd library)
//!                  └────────┬─────────┘
//!                           │ C ABI (extern "C")
//!               ┌───────────┴───────────┐
//!               │   libibverbs.so.1     │
//!               └───────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # fn main() -> adverbs::Result<()> {
//! for device in adverbs::enumerate_devices()? {
//!     println!("{device}");
//!
//!     let ctx = device.open()?;
//!     let attrs = ctx.query_device_attributes()?;
//!     println!("  fw {} / {} port(s)", attrs.fw_ver, attrs.phys_port_cnt);
//!
//!     for port in ctx.query_port_attributes_filtered(|p| p.is_active())? {
//!         println!("  port {}: {} {}", port.port_num, port.link_layer, port.active_mtu);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod config;
pub mod context;
pub mod device;
pub mod device_list;
pub mod driver;
pub mod error;
pub mod ffi;
pub mod loader;
pub mod types;

// Re-export the most commonly used types at crate root.
pub use attributes::{DeviceAttributes, PortAttributes};
pub use config::VerbsConfig;
pub use context::Context;
pub use device::Device;
pub use device_list::{DeviceEntry, DeviceIter, DeviceList};
pub use driver::{RawDeviceList, Verbs, VerbsDriver, enumerate_devices};
pub use error::{QueryTarget, Result, VerbsError};
pub use loader::VerbsLibrary;
pub use types::{
    AtomicCap, DeviceCapFlags, ForkStatus, GidType, Guid, LinkLayer, Mtu, NativeFlags, NodeType,
    PhysPortState, PortCapFlags, PortCapFlags2, PortState, TransportType,
};
