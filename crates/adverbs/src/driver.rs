// SPDX-License-Identifier: Apache-2.0
//! The driver seam between this crate and the native verbs entry points.
//!
//! [`VerbsDriver`] is the minimal set of libibverbs calls the discovery and
//! query layer needs. [`VerbsLibrary`](crate::loader::VerbsLibrary) implements
//! it over the real `libibverbs.so.1`; tests substitute an in-process double.
//!
//! [`Verbs`] is the cheap-to-clone handle callers hold. Every
//! [`DeviceList`], [`Device`] and [`Context`](crate::Context) keeps one, so
//! the driver (and the shared library behind it) outlives them all.

use std::fmt;
use std::io;
use std::os::raw::c_int;
use std::ptr::NonNull;
use std::sync::{Arc, OnceLock};

use crate::config::VerbsConfig;
use crate::device::Device;
use crate::device_list::DeviceList;
use crate::error::Result;
use crate::ffi::{IbvContext, IbvDevice, IbvDeviceAttr, IbvPortAttr};
use crate::loader::VerbsLibrary;

/// A native device list as returned by `ibv_get_device_list`.
#[derive(Debug, Clone, Copy)]
pub struct RawDeviceList {
    /// Array of `len` device pointers (NULL-terminated on real libibverbs).
    pub devices: NonNull<*mut IbvDevice>,
    pub len: usize,
}

/// The libibverbs calls used by this crate.
///
/// Pointer arguments are always values previously produced by the same
/// driver: device pointers from a list that has not yet been freed, context
/// pointers from `open_device` that have not yet been closed.
pub trait VerbsDriver: Send + Sync {
    /// Short identification for logs (library path, or a test label).
    fn describe(&self) -> String;

    /// `ibv_get_device_list`. `Err` carries the errno of a failed call; a host
    /// without adapters returns an empty list.
    fn get_device_list(&self) -> io::Result<RawDeviceList>;

    /// `ibv_free_device_list`.
    ///
    /// # Safety
    /// `list` must come from [`get_device_list`](Self::get_device_list) on
    /// this driver and must not have been freed already.
    unsafe fn free_device_list(&self, list: RawDeviceList);

    /// `ibv_get_device_index`; `-1` when the kernel cannot report one.
    ///
    /// # Safety
    /// `device` must be an entry of a live list from this driver.
    unsafe fn device_index(&self, device: NonNull<IbvDevice>) -> c_int;

    /// `ibv_get_device_guid`, raw `__be64`.
    ///
    /// # Safety
    /// `device` must be an entry of a live list from this driver.
    unsafe fn device_guid(&self, device: NonNull<IbvDevice>) -> u64;

    /// `ibv_open_device`.
    ///
    /// # Safety
    /// `device` must be an entry of a live list from this driver.
    unsafe fn open_device(&self, device: NonNull<IbvDevice>) -> io::Result<NonNull<IbvContext>>;

    /// `ibv_close_device`.
    ///
    /// # Safety
    /// `context` must come from [`open_device`](Self::open_device) on this
    /// driver and must not have been closed already.
    unsafe fn close_device(&self, context: NonNull<IbvContext>) -> io::Result<()>;

    /// `ibv_query_device`.
    ///
    /// # Safety
    /// `context` must be an open context from this driver.
    unsafe fn query_device(
        &self,
        context: NonNull<IbvContext>,
        attr: &mut IbvDeviceAttr,
    ) -> io::Result<()>;

    /// `ibv_query_port` for the 1-based `port_num`.
    ///
    /// # Safety
    /// `context` must be an open context from this driver.
    unsafe fn query_port(
        &self,
        context: NonNull<IbvContext>,
        port_num: u8,
        attr: &mut IbvPortAttr,
    ) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Shared handle to a verbs driver.
#[derive(Clone)]
pub struct Verbs {
    driver: Arc<dyn VerbsDriver>,
}

static SYSTEM: OnceLock<Verbs> = OnceLock::new();

impl Verbs {
    /// Wrap an already shared driver.
    pub fn new(driver: Arc<dyn VerbsDriver>) -> Self {
        Self { driver }
    }

    /// Wrap a driver value.
    pub fn from_driver<D: VerbsDriver + 'static>(driver: D) -> Self {
        Self::new(Arc::new(driver))
    }

    /// Load the verbs library named by `config`.
    pub fn load(config: &VerbsConfig) -> Result<Self> {
        config.validate()?;
        let library = VerbsLibrary::load(&config.library_path)?;
        Ok(Self::from_driver(library))
    }

    /// The process-wide system library, loaded on first use from the
    /// configuration in the environment (see [`VerbsConfig::from_env`]).
    ///
    /// A failed load is not cached; the next call tries again.
    pub fn system() -> Result<Self> {
        if let Some(verbs) = SYSTEM.get() {
            return Ok(verbs.clone());
        }
        let verbs = Self::load(&VerbsConfig::from_env())?;
        Ok(SYSTEM.get_or_init(|| verbs).clone())
    }

    /// Run one enumeration and return the scope-bound list.
    pub fn device_list(&self) -> Result<DeviceList> {
        DeviceList::new(self.clone())
    }

    /// Snapshot every device visible right now.
    ///
    /// The native list is released before this returns.
    pub fn devices(&self) -> Result<Vec<Device>> {
        let list = self.device_list()?;
        Ok(list.iter().map(Device::from).collect())
    }

    pub fn driver(&self) -> &dyn VerbsDriver {
        self.driver.as_ref()
    }

    /// Whether two handles share the same driver instance.
    pub fn same_driver(&self, other: &Verbs) -> bool {
        Arc::ptr_eq(&self.driver, &other.driver)
    }
}

impl fmt::Debug for Verbs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verbs")
            .field("driver", &self.driver.describe())
            .finish()
    }
}

/// Snapshot every RDMA device on this host through the system library.
///
/// A host without adapters yields an empty vector.
pub fn enumerate_devices() -> Result<Vec<Device>> {
    Verbs::system()?.devices()
}
