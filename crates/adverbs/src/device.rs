// SPDX-License-Identifier: Apache-2.0
//! Owned device snapshots and kernel-index re-resolution.

use std::fmt;

use serde::Serialize;

use crate::context::Context;
use crate::device_list::{DeviceEntry, DeviceList};
use crate::driver::Verbs;
use crate::error::{Result, VerbsError};
use crate::types::{Guid, NodeType, TransportType};

/// Identity and static metadata of one device, copied out of an enumeration.
///
/// A `Device` never points into native memory, so it stays valid after the
/// [`DeviceList`] it came from is gone. [`open`](Self::open) finds the device
/// again by kernel index in a fresh enumeration.
#[derive(Clone, Serialize)]
pub struct Device {
    kernel_index: i32,
    guid: Guid,
    node_type: NodeType,
    transport_type: TransportType,
    name: String,
    dev_name: String,
    dev_path: String,
    ibdev_path: String,
    #[serde(skip)]
    verbs: Verbs,
}

impl Device {
    pub fn kernel_index(&self) -> i32 {
        self.kernel_index
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dev_name(&self) -> &str {
        &self.dev_name
    }

    pub fn dev_path(&self) -> &str {
        &self.dev_path
    }

    pub fn ibdev_path(&self) -> &str {
        &self.ibdev_path
    }

    /// Re-enumerate, find this device and open a context on it.
    ///
    /// Every call enumerates afresh; nothing is cached on the snapshot. The
    /// enumeration is released before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// * [`VerbsError::NotFound`] if the device is gone (hot-unplug, driver
    ///   reload).
    /// * [`VerbsError::ResourceUnavailable`] if enumeration fails.
    /// * [`VerbsError::OpenFailed`] if the driver refuses the open.
    pub fn open(&self) -> Result<Context> {
        let list = DeviceList::new(self.verbs.clone())?;
        let entry = self.resolve(&list).ok_or(VerbsError::NotFound {
            kernel_index: self.kernel_index,
        })?;
        tracing::debug!(
            "re-resolved '{}' (kernel index {}) for open",
            self.name,
            self.kernel_index
        );
        Context::open(&entry)
    }

    /// Whether this device is still present.
    pub fn is_present(&self) -> Result<bool> {
        let list = DeviceList::new(self.verbs.clone())?;
        Ok(self.resolve(&list).is_some())
    }

    fn resolve<'a>(&self, list: &'a DeviceList) -> Option<DeviceEntry<'a>> {
        if self.kernel_index >= 0 {
            list.lookup_by_kernel_index(self.kernel_index)
        } else {
            // Library without ibv_get_device_index: fall back to hardware
            // identity plus name.
            list.lookup_by(|entry| entry.guid() == self.guid && entry.name() == self.name)
        }
    }
}

impl From<DeviceEntry<'_>> for Device {
    fn from(entry: DeviceEntry<'_>) -> Self {
        Self {
            kernel_index: entry.kernel_index(),
            guid: entry.guid(),
            node_type: entry.node_type(),
            transport_type: entry.transport_type(),
            name: entry.name(),
            dev_name: entry.dev_name(),
            dev_path: entry.dev_path(),
            ibdev_path: entry.ibdev_path(),
            verbs: entry.verbs().clone(),
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.kernel_index == other.kernel_index
            && self.guid == other.guid
            && self.node_type == other.node_type
            && self.transport_type == other.transport_type
            && self.name == other.name
            && self.dev_name == other.dev_name
            && self.dev_path == other.dev_path
            && self.ibdev_path == other.ibdev_path
    }
}

impl Eq for Device {}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("kernel_index", &self.kernel_index)
            .field("guid", &self.guid)
            .field("node_type", &self.node_type)
            .field("transport_type", &self.transport_type)
            .field("name", &self.name)
            .field("dev_name", &self.dev_name)
            .field("dev_path", &self.dev_path)
            .field("ibdev_path", &self.ibdev_path)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<IBDevice kernel_index={} guid={} node_type={:?} name={:?} dev_name={:?} \
             dev_path={:?} ibdev_path={:?}>",
            self.kernel_index,
            self.guid,
            self.node_type.description(),
            self.name,
            self.dev_name,
            self.dev_path,
            self.ibdev_path,
        )
    }
}
