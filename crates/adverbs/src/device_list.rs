// SPDX-License-Identifier: Apache-2.0
//! Scope-bound wrapper around one `ibv_get_device_list` call.
//!
//! A [`DeviceList`] owns the native array for exactly as long as it lives and
//! frees it on drop, on every exit path. Entries borrow from the list, so the
//! borrow checker rejects any attempt to keep one past the list's scope; copy
//! what you need into a [`Device`] first.
//!
//! ```no_run
//! # fn main() -> adverbs::Result<()> {
//! let verbs = adverbs::Verbs::system()?;
//! let list = verbs.device_list()?;
//! if let Some(entry) = list.lookup_by_name("mlx5_0") {
//!     let device = entry.snapshot();
//!     println!("{device}");
//! }
//! // `list` is freed here; `device` stays valid.
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::ptr::NonNull;

use crate::context::Context;
use crate::device::Device;
use crate::driver::{RawDeviceList, Verbs};
use crate::error::{Result, VerbsError};
use crate::ffi::{self, IBV_SYSFS_NAME_MAX, IbvDevice};
use crate::types::{Guid, NodeType, TransportType};

// ---------------------------------------------------------------------------
// DeviceList
// ---------------------------------------------------------------------------

/// The result of one device enumeration.
///
/// Entry order is the order the kernel reported and is stable for the
/// lifetime of the list.
pub struct DeviceList {
    verbs: Verbs,
    raw: RawDeviceList,
}

impl DeviceList {
    /// Enumerate the devices visible through `verbs` right now.
    ///
    /// # Errors
    ///
    /// [`VerbsError::ResourceUnavailable`] if the enumeration call itself
    /// failed. A host with no adapters succeeds with an empty list.
    pub fn new(verbs: Verbs) -> Result<Self> {
        let raw = verbs
            .driver()
            .get_device_list()
            .map_err(|source| VerbsError::ResourceUnavailable { source })?;
        tracing::debug!(
            "enumerated {} device(s) via {}",
            raw.len,
            verbs.driver().describe()
        );
        Ok(Self { verbs, raw })
    }

    pub fn len(&self) -> usize {
        self.raw.len
    }

    pub fn is_empty(&self) -> bool {
        self.raw.len == 0
    }

    /// The entry at `index` in enumeration order.
    pub fn get(&self, index: usize) -> Option<DeviceEntry<'_>> {
        if index >= self.raw.len {
            return None;
        }
        // SAFETY: `index < len` and the array holds `len` valid pointers while
        // the list is alive.
        let ptr = unsafe { *self.raw.devices.as_ptr().add(index) };
        NonNull::new(ptr).map(|device| DeviceEntry {
            list: self,
            device,
        })
    }

    pub fn iter(&self) -> DeviceIter<'_> {
        DeviceIter {
            list: self,
            next: 0,
        }
    }

    /// First entry, in enumeration order, for which `predicate` holds.
    pub fn lookup_by<P>(&self, mut predicate: P) -> Option<DeviceEntry<'_>>
    where
        P: FnMut(&DeviceEntry<'_>) -> bool,
    {
        self.iter().find(|entry| predicate(entry))
    }

    /// Entry whose kernel name equals `name`.
    ///
    /// Names compare like `strncmp(a, b, IBV_SYSFS_NAME_MAX)`: only the first
    /// 64 bytes are significant and a NUL ends the name.
    pub fn lookup_by_name(&self, name: &str) -> Option<DeviceEntry<'_>> {
        let wanted = bounded_name(name.as_bytes());
        self.lookup_by(|entry| bounded_name(entry.name_bytes()) == wanted)
    }

    /// Entry with the given kernel index.
    ///
    /// Negative values never match: `-1` is what entries report when the
    /// library cannot supply an index, not an index any device has.
    pub fn lookup_by_kernel_index(&self, kernel_index: i32) -> Option<DeviceEntry<'_>> {
        if kernel_index < 0 {
            return None;
        }
        self.lookup_by(|entry| entry.kernel_index() == kernel_index)
    }

    pub fn lookup_by_guid(&self, guid: Guid) -> Option<DeviceEntry<'_>> {
        self.lookup_by(|entry| entry.guid() == guid)
    }

    /// Copy every entry out into owned snapshots.
    pub fn snapshots(&self) -> Vec<Device> {
        self.iter().map(Device::from).collect()
    }

    pub fn verbs(&self) -> &Verbs {
        &self.verbs
    }
}

impl Drop for DeviceList {
    fn drop(&mut self) {
        // SAFETY: `raw` came from this driver's `get_device_list` and is
        // released only here.
        unsafe { self.verbs.driver().free_device_list(self.raw) };
        tracing::debug!("released device list ({} entries)", self.raw.len);
    }
}

impl fmt::Debug for DeviceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a DeviceList {
    type Item = DeviceEntry<'a>;
    type IntoIter = DeviceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Truncate at the first NUL, then to the significant name length.
fn bounded_name(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(bytes.len())
        .min(IBV_SYSFS_NAME_MAX);
    &bytes[..end]
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

/// Iterator over the entries of a [`DeviceList`].
#[derive(Clone)]
pub struct DeviceIter<'a> {
    list: &'a DeviceList,
    next: usize,
}

impl<'a> Iterator for DeviceIter<'a> {
    type Item = DeviceEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.list.len() {
            let index = self.next;
            self.next += 1;
            if let Some(entry) = self.list.get(index) {
                return Some(entry);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.list.len() - self.next))
    }
}

// ---------------------------------------------------------------------------
// DeviceEntry
// ---------------------------------------------------------------------------

/// One device in a live [`DeviceList`].
///
/// Accessors read straight from native memory; the borrow ends with the
/// list. Use [`snapshot`](Self::snapshot) to keep anything longer.
#[derive(Clone, Copy)]
pub struct DeviceEntry<'a> {
    list: &'a DeviceList,
    device: NonNull<IbvDevice>,
}

impl<'a> DeviceEntry<'a> {
    fn raw(&self) -> &'a IbvDevice {
        // SAFETY: the pointer came from the list, which outlives `'a`.
        unsafe { self.device.as_ref() }
    }

    /// Kernel device index, stable across enumerations; `-1` if the library
    /// cannot report it.
    pub fn kernel_index(&self) -> i32 {
        // SAFETY: the entry belongs to a live list.
        unsafe { self.list.verbs.driver().device_index(self.device) }
    }

    pub fn guid(&self) -> Guid {
        // SAFETY: the entry belongs to a live list.
        Guid::from_raw(unsafe { self.list.verbs.driver().device_guid(self.device) })
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::from_raw(self.raw().node_type)
    }

    pub fn transport_type(&self) -> TransportType {
        TransportType::from_raw(self.raw().transport_type)
    }

    /// Kernel device name, e.g. `mlx5_0`.
    pub fn name(&self) -> String {
        ffi::fixed_string(&self.raw().name)
    }

    pub(crate) fn name_bytes(&self) -> &'a [u8] {
        ffi::fixed_bytes(&self.raw().name)
    }

    /// uverbs character device name, e.g. `uverbs0`.
    pub fn dev_name(&self) -> String {
        ffi::fixed_string(&self.raw().dev_name)
    }

    /// sysfs path of the uverbs device.
    pub fn dev_path(&self) -> String {
        ffi::fixed_string(&self.raw().dev_path)
    }

    /// sysfs path of the InfiniBand device.
    pub fn ibdev_path(&self) -> String {
        ffi::fixed_string(&self.raw().ibdev_path)
    }

    /// Copy this entry into an owned [`Device`].
    pub fn snapshot(&self) -> Device {
        Device::from(*self)
    }

    /// Open a context on this entry.
    ///
    /// The context does not borrow the list and may outlive it.
    pub fn open(&self) -> Result<Context> {
        Context::open(self)
    }

    pub(crate) fn verbs(&self) -> &'a Verbs {
        &self.list.verbs
    }

    pub(crate) fn as_ptr(&self) -> NonNull<IbvDevice> {
        self.device
    }
}

impl fmt::Debug for DeviceEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceEntry")
            .field("kernel_index", &self.kernel_index())
            .field("guid", &self.guid())
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
