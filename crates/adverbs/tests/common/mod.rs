// SPDX-License-Identifier: Apache-2.0
//! In-process verbs driver for integration tests.
//!
//! `MockDriver` hands out real `IbvDevice` structs and context pointers the
//! way libibverbs does, and records every list free and context close so
//! tests can check exact release counts. Each test builds its own driver, so
//! counters never leak between tests running in parallel.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::os::raw::c_int;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use adverbs::ffi::{self, IbvContext, IbvDevice, IbvDeviceAttr, IbvPortAttr};
use adverbs::{Guid, RawDeviceList, Verbs, VerbsDriver};

const EACCES: i32 = 13;
const EBADF: i32 = 9;
const EINVAL: i32 = 22;
const EIO: i32 = 5;

// ---------------------------------------------------------------------------
// Fake hardware description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub name: String,
    pub kernel_index: i32,
    /// Host-order GUID; the driver hands it out big-endian like the kernel.
    pub guid: u64,
    pub node_type: c_int,
    pub transport_type: c_int,
    pub max_mr_size: u64,
    pub ports: Vec<IbvPortAttr>,
}

impl MockDevice {
    pub fn new(name: &str, kernel_index: i32, guid: u64) -> Self {
        Self {
            name: name.to_string(),
            kernel_index,
            guid,
            node_type: ffi::IBV_NODE_CA,
            transport_type: ffi::IBV_TRANSPORT_IB,
            max_mr_size: u64::MAX,
            ports: vec![active_ib_port()],
        }
    }

    pub fn with_ports(mut self, ports: Vec<IbvPortAttr>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_node(mut self, node_type: c_int, transport_type: c_int) -> Self {
        self.node_type = node_type;
        self.transport_type = transport_type;
        self
    }
}

pub fn active_ib_port() -> IbvPortAttr {
    IbvPortAttr {
        state: ffi::IBV_PORT_ACTIVE,
        max_mtu: ffi::IBV_MTU_4096,
        active_mtu: ffi::IBV_MTU_4096,
        lid: 1,
        phys_state: ffi::IBV_PORT_PHYS_STATE_LINK_UP as u8,
        link_layer: ffi::IBV_LINK_LAYER_INFINIBAND as u8,
        gid_tbl_len: 128,
        pkey_tbl_len: 128,
        ..Default::default()
    }
}

pub fn down_ib_port() -> IbvPortAttr {
    IbvPortAttr {
        state: ffi::IBV_PORT_DOWN,
        max_mtu: ffi::IBV_MTU_4096,
        active_mtu: ffi::IBV_MTU_256,
        phys_state: ffi::IBV_PORT_PHYS_STATE_POLLING as u8,
        link_layer: ffi::IBV_LINK_LAYER_INFINIBAND as u8,
        ..Default::default()
    }
}

pub fn active_eth_port() -> IbvPortAttr {
    IbvPortAttr {
        state: ffi::IBV_PORT_ACTIVE,
        max_mtu: ffi::IBV_MTU_4096,
        active_mtu: ffi::IBV_MTU_1024,
        phys_state: ffi::IBV_PORT_PHYS_STATE_LINK_UP as u8,
        link_layer: ffi::IBV_LINK_LAYER_ETHERNET as u8,
        gid_tbl_len: 256,
        ..Default::default()
    }
}

/// Two ConnectX ports, one RoCE function and a soft-iWARP device, with a
/// gap in kernel indices.
pub fn sample_devices() -> Vec<MockDevice> {
    vec![
        MockDevice::new("mlx5_0", 0, 0x0c42_a103_00aa_0001)
            .with_ports(vec![active_ib_port(), down_ib_port()]),
        MockDevice::new("mlx5_1", 1, 0x0c42_a103_00aa_0002).with_ports(vec![active_eth_port()]),
        MockDevice::new("siw0", 4, 0x5254_00ff_fe12_3456)
            .with_node(ffi::IBV_NODE_RNIC, ffi::IBV_TRANSPORT_IWARP)
            .with_ports(vec![active_eth_port()]),
    ]
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// One outstanding `get_device_list` result.
struct LiveList {
    pointers: Box<[*mut IbvDevice]>,
    devices: Vec<Box<IbvDevice>>,
}

struct LiveContext {
    device: MockDevice,
    storage: *mut u64,
}

#[derive(Default)]
struct MockState {
    devices: Vec<MockDevice>,
    /// Address of each handed-out `IbvDevice` → index into `devices` at
    /// enumeration time, plus a copy of the description.
    entries: HashMap<usize, MockDevice>,
    lists: HashMap<usize, LiveList>,
    contexts: HashMap<usize, LiveContext>,
    enumerate_errno: Option<i32>,
    fail_open: Vec<String>,
    fail_port: Option<(String, u8)>,
    fail_device_query: bool,
    report_index: bool,
}

// SAFETY: the raw pointers in `MockState` are owned allocations only touched
// under the mutex.
unsafe impl Send for MockState {}

#[derive(Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
    lists_allocated: AtomicUsize,
    lists_freed: AtomicUsize,
    contexts_opened: AtomicUsize,
    contexts_closed: AtomicUsize,
    double_closes: AtomicUsize,
}

impl MockDriver {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        let driver = Self::default();
        {
            let mut state = driver.lock();
            state.devices = devices;
            state.report_index = true;
        }
        driver
    }

    /// A handle and the driver behind it.
    pub fn verbs(devices: Vec<MockDevice>) -> (Arc<MockDriver>, Verbs) {
        let mock = Arc::new(Self::new(devices));
        let verbs = Verbs::new(mock.clone());
        (mock, verbs)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    // -- Scenario controls ---------------------------------------------------

    pub fn fail_enumeration(&self, errno: i32) {
        self.lock().enumerate_errno = Some(errno);
    }

    pub fn fail_open(&self, name: &str) {
        self.lock().fail_open.push(name.to_string());
    }

    pub fn fail_port_query(&self, name: &str, port: u8) {
        self.lock().fail_port = Some((name.to_string(), port));
    }

    pub fn fail_device_query(&self) {
        self.lock().fail_device_query = true;
    }

    /// Behave like rdma-core before `ibv_get_device_index` existed.
    pub fn hide_kernel_index(&self) {
        self.lock().report_index = false;
    }

    /// Hot-unplug: the device disappears from later enumerations.
    pub fn remove_device(&self, name: &str) {
        self.lock().devices.retain(|d| d.name != name);
    }

    pub fn add_device(&self, device: MockDevice) {
        self.lock().devices.push(device);
    }

    // -- Counters ------------------------------------------------------------

    pub fn lists_allocated(&self) -> usize {
        self.lists_allocated.load(Ordering::SeqCst)
    }

    pub fn lists_freed(&self) -> usize {
        self.lists_freed.load(Ordering::SeqCst)
    }

    pub fn contexts_opened(&self) -> usize {
        self.contexts_opened.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.contexts_closed.load(Ordering::SeqCst)
    }

    pub fn double_closes(&self) -> usize {
        self.double_closes.load(Ordering::SeqCst)
    }

    pub fn live_lists(&self) -> usize {
        self.lock().lists.len()
    }

    pub fn live_contexts(&self) -> usize {
        self.lock().contexts.len()
    }

    fn entry(&self, device: NonNull<IbvDevice>) -> MockDevice {
        self.lock()
            .entries
            .get(&(device.as_ptr() as usize))
            .cloned()
            .expect("device pointer used after its list was freed")
    }

    fn context(&self, context: NonNull<IbvContext>) -> MockDevice {
        self.lock()
            .contexts
            .get(&(context.as_ptr() as usize))
            .map(|c| c.device.clone())
            .expect("context used after close")
    }
}

impl VerbsDriver for MockDriver {
    fn describe(&self) -> String {
        "mock".to_string()
    }

    fn get_device_list(&self) -> io::Result<RawDeviceList> {
        let mut state = self.lock();
        if let Some(errno) = state.enumerate_errno {
            return Err(io::Error::from_raw_os_error(errno));
        }

        let mut devices: Vec<Box<IbvDevice>> = state
            .devices
            .iter()
            .map(|d| {
                let mut raw = IbvDevice {
                    node_type: d.node_type,
                    transport_type: d.transport_type,
                    ..Default::default()
                };
                ffi::write_fixed(&mut raw.name, &d.name);
                let uverbs = format!("uverbs{}", d.kernel_index);
                ffi::write_fixed(&mut raw.dev_name, &uverbs);
                ffi::write_fixed(
                    &mut raw.dev_path,
                    &format!("/sys/class/infiniband_verbs/{uverbs}"),
                );
                ffi::write_fixed(
                    &mut raw.ibdev_path,
                    &format!("/sys/class/infiniband/{}", d.name),
                );
                Box::new(raw)
            })
            .collect();

        let mut pointers: Vec<*mut IbvDevice> = devices
            .iter_mut()
            .map(|d| std::ptr::from_mut(d.as_mut()))
            .collect();
        pointers.push(std::ptr::null_mut());
        let mut pointers = pointers.into_boxed_slice();

        for (ptr, desc) in pointers.iter().zip(state.devices.clone()) {
            state.entries.insert(*ptr as usize, desc);
        }

        let len = devices.len();
        let head = NonNull::new(pointers.as_mut_ptr()).expect("boxed slice is non-null");
        state.lists.insert(head.as_ptr() as usize, LiveList { pointers, devices });
        self.lists_allocated.fetch_add(1, Ordering::SeqCst);

        Ok(RawDeviceList { devices: head, len })
    }

    unsafe fn free_device_list(&self, list: RawDeviceList) {
        let mut state = self.lock();
        let live = state
            .lists
            .remove(&(list.devices.as_ptr() as usize))
            .expect("device list freed twice");
        for ptr in live.pointers.iter().filter(|p| !p.is_null()) {
            state.entries.remove(&(*ptr as usize));
        }
        drop(live.devices);
        self.lists_freed.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn device_index(&self, device: NonNull<IbvDevice>) -> c_int {
        let entry = self.entry(device);
        if self.lock().report_index {
            entry.kernel_index
        } else {
            -1
        }
    }

    unsafe fn device_guid(&self, device: NonNull<IbvDevice>) -> u64 {
        Guid::from_host(self.entry(device).guid).as_raw()
    }

    unsafe fn open_device(&self, device: NonNull<IbvDevice>) -> io::Result<NonNull<IbvContext>> {
        let entry = self.entry(device);
        let mut state = self.lock();
        if state.fail_open.contains(&entry.name) {
            return Err(io::Error::from_raw_os_error(EACCES));
        }
        let storage = Box::into_raw(Box::new(0u64));
        state.contexts.insert(
            storage as usize,
            LiveContext {
                device: entry,
                storage,
            },
        );
        self.contexts_opened.fetch_add(1, Ordering::SeqCst);
        Ok(NonNull::new(storage.cast::<IbvContext>()).expect("box is non-null"))
    }

    unsafe fn close_device(&self, context: NonNull<IbvContext>) -> io::Result<()> {
        let removed = self.lock().contexts.remove(&(context.as_ptr() as usize));
        match removed {
            Some(live) => {
                // SAFETY: `storage` came from `Box::into_raw` in `open_device`.
                drop(unsafe { Box::from_raw(live.storage) });
                self.contexts_closed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => {
                self.double_closes.fetch_add(1, Ordering::SeqCst);
                Err(io::Error::from_raw_os_error(EBADF))
            }
        }
    }

    unsafe fn query_device(
        &self,
        context: NonNull<IbvContext>,
        attr: &mut IbvDeviceAttr,
    ) -> io::Result<()> {
        let device = self.context(context);
        if self.lock().fail_device_query {
            return Err(io::Error::from_raw_os_error(EIO));
        }
        ffi::write_fixed(&mut attr.fw_ver, "16.35.2000");
        attr.node_guid = Guid::from_host(device.guid).as_raw();
        attr.sys_image_guid = attr.node_guid;
        attr.max_mr_size = device.max_mr_size;
        attr.page_size_cap = 0xffff_f000;
        attr.vendor_id = 0x02c9;
        attr.vendor_part_id = 4119;
        attr.max_qp = 131_072;
        attr.max_qp_wr = 32_768;
        attr.max_sge = 30;
        attr.max_cq = 16_777_216;
        attr.max_mr = 16_777_216;
        attr.max_pd = 16_777_216;
        attr.atomic_cap = ffi::IBV_ATOMIC_HCA;
        attr.max_pkeys = 128;
        attr.phys_port_cnt = u8::try_from(device.ports.len()).expect("port count fits u8");
        Ok(())
    }

    unsafe fn query_port(
        &self,
        context: NonNull<IbvContext>,
        port_num: u8,
        attr: &mut IbvPortAttr,
    ) -> io::Result<()> {
        let device = self.context(context);
        if let Some((name, port)) = &self.lock().fail_port {
            if *name == device.name && *port == port_num {
                return Err(io::Error::from_raw_os_error(EIO));
            }
        }
        let index = usize::from(port_num)
            .checked_sub(1)
            .ok_or_else(|| io::Error::from_raw_os_error(EINVAL))?;
        *attr = *device
            .ports
            .get(index)
            .ok_or_else(|| io::Error::from_raw_os_error(EINVAL))?;
        Ok(())
    }
}
