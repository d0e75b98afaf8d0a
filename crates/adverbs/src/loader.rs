// SPDX-License-Identifier: Apache-2.0
//! Load `libibverbs` at runtime and resolve its entry points.
//!
//! The library is opened with `dlopen` rather than linked, so binaries built
//! against this crate start on hosts without rdma-core installed and report
//! [`VerbsError::LoadFailed`] only when verbs are actually used.

use std::io;
use std::os::raw::c_int;
use std::path::Path;
use std::ptr::{self, NonNull};

use libloading::{Library, Symbol};

use crate::driver::{RawDeviceList, VerbsDriver};
use crate::error::{Result, VerbsError, check_ret};
use crate::ffi::{self, IbvContext, IbvDevice, IbvDeviceAttr, IbvPortAttr};

/// Soname of the verbs library shipped by rdma-core.
pub const DEFAULT_LIBRARY: &str = "libibverbs.so.1";

// ---------------------------------------------------------------------------
// Verbs function table
// ---------------------------------------------------------------------------

/// A loaded `libibverbs` with all function pointers resolved.
///
/// The library handle is kept alive for the lifetime of this struct so the
/// `.so` is not unloaded while we still hold function pointers into it.
pub struct VerbsLibrary {
    _library: Library,

    library_path: String,

    fn_get_device_list: ffi::FnGetDeviceList,
    fn_free_device_list: ffi::FnFreeDeviceList,
    fn_get_device_guid: ffi::FnGetDeviceGuid,
    fn_open_device: ffi::FnOpenDevice,
    fn_close_device: ffi::FnCloseDevice,
    fn_query_device: ffi::FnQueryDevice,
    fn_query_port: ffi::FnQueryPort,

    // Only exported by rdma-core v32 and later.
    fn_get_device_index: Option<ffi::FnGetDeviceIndex>,
}

impl VerbsLibrary {
    /// Load the verbs library at `path` and resolve all function pointers.
    ///
    /// A bare soname such as `libibverbs.so.1` goes through the normal
    /// dynamic linker search path.
    ///
    /// # Errors
    ///
    /// Returns [`VerbsError::LoadFailed`] if `dlopen` fails, or
    /// [`VerbsError::SymbolNotFound`] if a required symbol cannot be resolved.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        // SAFETY: loading libibverbs runs its constructors, which only set up
        // provider discovery state.
        let library = unsafe { Library::new(path) }.map_err(|e| VerbsError::LoadFailed {
            path: path_str.clone(),
            cause: e.to_string(),
        })?;

        tracing::info!("loaded verbs library '{path_str}'");

        let fn_get_device_list =
            resolve_required::<ffi::FnGetDeviceList>(&library, "ibv_get_device_list")?;
        let fn_free_device_list =
            resolve_required::<ffi::FnFreeDeviceList>(&library, "ibv_free_device_list")?;
        let fn_get_device_guid =
            resolve_required::<ffi::FnGetDeviceGuid>(&library, "ibv_get_device_guid")?;
        let fn_open_device = resolve_required::<ffi::FnOpenDevice>(&library, "ibv_open_device")?;
        let fn_close_device =
            resolve_required::<ffi::FnCloseDevice>(&library, "ibv_close_device")?;
        let fn_query_device =
            resolve_required::<ffi::FnQueryDevice>(&library, "ibv_query_device")?;
        let fn_query_port = resolve_required::<ffi::FnQueryPort>(&library, "ibv_query_port")?;

        let fn_get_device_index =
            resolve_optional::<ffi::FnGetDeviceIndex>(&library, "ibv_get_device_index");
        if fn_get_device_index.is_none() {
            tracing::warn!(
                "'{path_str}' does not export ibv_get_device_index; kernel indices will read as -1"
            );
        }

        Ok(Self {
            _library: library,
            library_path: path_str,
            fn_get_device_list,
            fn_free_device_list,
            fn_get_device_guid,
            fn_open_device,
            fn_close_device,
            fn_query_device,
            fn_query_port,
            fn_get_device_index,
        })
    }

    /// Load [`DEFAULT_LIBRARY`].
    pub fn load_default() -> Result<Self> {
        Self::load(DEFAULT_LIBRARY)
    }

    /// Path or soname the library was loaded from.
    pub fn library_path(&self) -> &str {
        &self.library_path
    }

    /// Whether the library can report kernel device indices.
    pub fn supports_device_index(&self) -> bool {
        self.fn_get_device_index.is_some()
    }
}

impl VerbsDriver for VerbsLibrary {
    fn describe(&self) -> String {
        self.library_path.clone()
    }

    fn get_device_list(&self) -> io::Result<RawDeviceList> {
        let mut num: c_int = 0;
        // SAFETY: `num` is a valid out-pointer for the duration of the call.
        let list = unsafe { (self.fn_get_device_list)(&mut num) };
        // errno must be read before anything else can clobber it.
        let devices = NonNull::new(list).ok_or_else(io::Error::last_os_error)?;
        Ok(RawDeviceList {
            devices,
            len: usize::try_from(num).unwrap_or(0),
        })
    }

    unsafe fn free_device_list(&self, list: RawDeviceList) {
        // SAFETY: the caller hands back a list from `get_device_list`, once.
        unsafe { (self.fn_free_device_list)(list.devices.as_ptr()) }
    }

    unsafe fn device_index(&self, device: NonNull<IbvDevice>) -> c_int {
        match self.fn_get_device_index {
            // SAFETY: `device` belongs to a live list.
            Some(f) => unsafe { f(device.as_ptr()) },
            None => -1,
        }
    }

    unsafe fn device_guid(&self, device: NonNull<IbvDevice>) -> u64 {
        // SAFETY: `device` belongs to a live list.
        unsafe { (self.fn_get_device_guid)(device.as_ptr()) }
    }

    unsafe fn open_device(&self, device: NonNull<IbvDevice>) -> io::Result<NonNull<IbvContext>> {
        // SAFETY: `device` belongs to a live list.
        let ctx = unsafe { (self.fn_open_device)(device.as_ptr()) };
        NonNull::new(ctx).ok_or_else(io::Error::last_os_error)
    }

    unsafe fn close_device(&self, context: NonNull<IbvContext>) -> io::Result<()> {
        // SAFETY: the caller closes each context exactly once.
        check_ret(unsafe { (self.fn_close_device)(context.as_ptr()) })
    }

    unsafe fn query_device(
        &self,
        context: NonNull<IbvContext>,
        attr: &mut IbvDeviceAttr,
    ) -> io::Result<()> {
        // SAFETY: `context` is open and `attr` is a writable, correctly sized struct.
        check_ret(unsafe { (self.fn_query_device)(context.as_ptr(), ptr::from_mut(attr)) })
    }

    unsafe fn query_port(
        &self,
        context: NonNull<IbvContext>,
        port_num: u8,
        attr: &mut IbvPortAttr,
    ) -> io::Result<()> {
        // SAFETY: `context` is open; the exported entry point writes at most
        // the compat prefix of `attr`, which is fully allocated here.
        check_ret(unsafe { (self.fn_query_port)(context.as_ptr(), port_num, ptr::from_mut(attr)) })
    }
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for VerbsLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerbsLibrary")
            .field("library_path", &self.library_path)
            .field("supports_device_index", &self.supports_device_index())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Symbol resolution helpers
// ---------------------------------------------------------------------------

/// Resolve a required symbol. Returns an error if the symbol is missing.
fn resolve_required<T: Copy>(library: &Library, name: &str) -> Result<T> {
    tracing::trace!("resolving required symbol '{name}'");

    // SAFETY: `T` is the function pointer type declared in `ffi` for this
    // exact symbol name.
    unsafe {
        let sym: Symbol<T> = library
            .get(name.as_bytes())
            .map_err(|e| VerbsError::SymbolNotFound {
                symbol: name.to_string(),
                cause: e.to_string(),
            })?;
        Ok(*sym)
    }
}

/// Resolve an optional symbol. Returns `None` if the symbol is missing.
fn resolve_optional<T: Copy>(library: &Library, name: &str) -> Option<T> {
    tracing::trace!("resolving optional symbol '{name}'");

    unsafe { library.get::<T>(name.as_bytes()).ok().map(|s| *s) }
}
