// SPDX-License-Identifier: Apache-2.0
//! Opened device contexts and attribute queries.
//!
//! A [`Context`] is created from a live [`DeviceEntry`] but does not borrow
//! it: once open, it is independent of the enumeration that produced it.
//! Clones share one native context, which is closed when the last clone is
//! dropped.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::attributes::{DeviceAttributes, PortAttributes};
use crate::device_list::DeviceEntry;
use crate::driver::Verbs;
use crate::error::{QueryTarget, Result, VerbsError};
use crate::ffi::{IbvContext, IbvDeviceAttr, IbvPortAttr};

/// Shared handle to an opened device context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    verbs: Verbs,
    handle: NonNull<IbvContext>,
    device_name: String,
}

// SAFETY: libibverbs contexts may be used and closed from any thread; the
// query entry points take their own locks. `ContextInner` only reaches the
// handle through `&self`, and `Drop` runs once, on whichever thread releases
// the last `Arc`.
unsafe impl Send for ContextInner {}
unsafe impl Sync for ContextInner {}

impl Context {
    /// Open a context on `entry`.
    ///
    /// # Errors
    ///
    /// [`VerbsError::OpenFailed`] if the driver refuses (permissions,
    /// resource exhaustion).
    pub fn open(entry: &DeviceEntry<'_>) -> Result<Self> {
        let verbs = entry.verbs().clone();
        let device_name = entry.name();

        // SAFETY: the entry belongs to a list that is alive for this call.
        let handle = unsafe { verbs.driver().open_device(entry.as_ptr()) }.map_err(|source| {
            VerbsError::OpenFailed {
                device: device_name.clone(),
                source,
            }
        })?;

        tracing::debug!("opened context on '{device_name}'");

        Ok(Self {
            inner: Arc::new(ContextInner {
                verbs,
                handle,
                device_name,
            }),
        })
    }

    /// Kernel name of the device this context was opened on.
    pub fn device_name(&self) -> &str {
        &self.inner.device_name
    }

    /// Number of live clones sharing this context.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Query device capabilities.
    pub fn query_device_attributes(&self) -> Result<DeviceAttributes> {
        let mut raw = IbvDeviceAttr::default();
        // SAFETY: the context stays open while `self` is alive.
        unsafe {
            self.inner
                .verbs
                .driver()
                .query_device(self.inner.handle, &mut raw)
        }
        .map_err(|source| self.query_failed(QueryTarget::Device, source))?;

        tracing::trace!(
            "'{}': {} physical port(s)",
            self.inner.device_name,
            raw.phys_port_cnt
        );

        Ok(DeviceAttributes::from_raw(&raw))
    }

    /// Query one port by its 1-based number.
    pub fn query_port_attributes_for(&self, port_num: u8) -> Result<PortAttributes> {
        let mut raw = IbvPortAttr::default();
        // SAFETY: the context stays open while `self` is alive.
        unsafe {
            self.inner
                .verbs
                .driver()
                .query_port(self.inner.handle, port_num, &mut raw)
        }
        .map_err(|source| self.query_failed(QueryTarget::Port(port_num), source))?;

        Ok(PortAttributes::from_raw(port_num, &raw))
    }

    /// Query every physical port, in port-number order.
    ///
    /// The result has exactly `phys_port_cnt` entries. If any single query
    /// fails the whole call fails; no partial list is returned.
    pub fn query_port_attributes(&self) -> Result<Vec<PortAttributes>> {
        let device = self.query_device_attributes()?;
        device
            .port_numbers()
            .map(|port| self.query_port_attributes_for(port))
            .collect()
    }

    /// Query every port and keep those matching `predicate`, in port order.
    pub fn query_port_attributes_filtered<P>(&self, mut predicate: P) -> Result<Vec<PortAttributes>>
    where
        P: FnMut(&PortAttributes) -> bool,
    {
        let mut ports = self.query_port_attributes()?;
        ports.retain(|port| predicate(port));
        Ok(ports)
    }

    /// Like [`query_port_attributes_filtered`](Self::query_port_attributes_filtered)
    /// with a fallible predicate. The first predicate error is returned as is.
    pub fn try_query_port_attributes_filtered<P, E>(
        &self,
        mut predicate: P,
    ) -> std::result::Result<Vec<PortAttributes>, E>
    where
        P: FnMut(&PortAttributes) -> std::result::Result<bool, E>,
        E: From<VerbsError>,
    {
        let ports = self.query_port_attributes()?;
        let mut kept = Vec::with_capacity(ports.len());
        for port in ports {
            if predicate(&port)? {
                kept.push(port);
            }
        }
        Ok(kept)
    }

    fn query_failed(&self, target: QueryTarget, source: std::io::Error) -> VerbsError {
        tracing::warn!("{target} query on '{}' failed: {source}", self.inner.device_name);
        VerbsError::QueryFailed {
            device: self.inner.device_name.clone(),
            target,
            source,
        }
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        // SAFETY: the last owner closes the handle, exactly once.
        match unsafe { self.verbs.driver().close_device(self.handle) } {
            Ok(()) => tracing::debug!("closed context on '{}'", self.device_name),
            Err(e) => tracing::error!("close failed for '{}': {e}", self.device_name),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("device_name", &self.inner.device_name)
            .field("handle", &self.inner.handle)
            .finish()
    }
}
