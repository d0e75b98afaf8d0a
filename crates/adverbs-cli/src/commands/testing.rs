// SPDX-License-Identifier: Apache-2.0
//! Fixed in-process verbs driver for command tests.
//!
//! The device table is built once and never changes, so the list handed out
//! by every enumeration is the same array and a context pointer is simply
//! the device pointer it was opened on.

use std::io;
use std::os::raw::c_int;
use std::ptr::{self, NonNull};

use adverbs::ffi::{self, IbvContext, IbvDevice, IbvDeviceAttr, IbvPortAttr};
use adverbs::{Guid, RawDeviceList, Verbs, VerbsDriver};

const EINVAL: i32 = 22;

pub struct FixedDevice {
    pub name: &'static str,
    pub kernel_index: i32,
    pub guid: u64,
    pub ports: Vec<IbvPortAttr>,
}

pub struct FixedDriver {
    devices: Vec<FixedDevice>,
    _storage: Vec<Box<IbvDevice>>,
    pointers: Box<[*mut IbvDevice]>,
    report_index: bool,
}

// SAFETY: the device structs and pointer array are written once in `new`
// and only read afterwards.
unsafe impl Send for FixedDriver {}
unsafe impl Sync for FixedDriver {}

impl FixedDriver {
    pub fn new(devices: Vec<FixedDevice>) -> Self {
        let mut storage: Vec<Box<IbvDevice>> = devices
            .iter()
            .map(|d| {
                let mut raw = IbvDevice {
                    node_type: ffi::IBV_NODE_CA,
                    transport_type: ffi::IBV_TRANSPORT_IB,
                    ..Default::default()
                };
                ffi::write_fixed(&mut raw.name, d.name);
                Box::new(raw)
            })
            .collect();
        let mut pointers: Vec<*mut IbvDevice> = storage
            .iter_mut()
            .map(|d| ptr::from_mut(d.as_mut()))
            .collect();
        pointers.push(ptr::null_mut());

        Self {
            devices,
            _storage: storage,
            pointers: pointers.into_boxed_slice(),
            report_index: true,
        }
    }

    /// Report `-1` for every kernel index, like rdma-core before v32.
    pub fn without_kernel_index(mut self) -> Self {
        self.report_index = false;
        self
    }

    pub fn verbs(self) -> Verbs {
        Verbs::from_driver(self)
    }

    fn device(&self, device: NonNull<IbvDevice>) -> &FixedDevice {
        let position = self
            .pointers
            .iter()
            .position(|&p| p == device.as_ptr())
            .expect("device pointer from this driver");
        &self.devices[position]
    }
}

/// A ConnectX card with one active and one down InfiniBand port, and a RoCE
/// function with a single Ethernet port.
pub fn sample_verbs() -> Verbs {
    FixedDriver::new(sample_devices()).verbs()
}

pub fn sample_devices() -> Vec<FixedDevice> {
    vec![
        FixedDevice {
            name: "mlx5_0",
            kernel_index: 0,
            guid: 0x0c42_a103_00aa_0001,
            ports: vec![
                port(ffi::IBV_PORT_ACTIVE, ffi::IBV_LINK_LAYER_INFINIBAND),
                port(ffi::IBV_PORT_DOWN, ffi::IBV_LINK_LAYER_INFINIBAND),
            ],
        },
        FixedDevice {
            name: "mlx5_1",
            kernel_index: 3,
            guid: 0x0c42_a103_00aa_0002,
            ports: vec![port(ffi::IBV_PORT_ACTIVE, ffi::IBV_LINK_LAYER_ETHERNET)],
        },
    ]
}

fn port(state: c_int, link_layer: c_int) -> IbvPortAttr {
    IbvPortAttr {
        state,
        max_mtu: ffi::IBV_MTU_4096,
        active_mtu: ffi::IBV_MTU_1024,
        link_layer: link_layer as u8,
        ..Default::default()
    }
}

impl VerbsDriver for FixedDriver {
    fn describe(&self) -> String {
        "fixed".to_string()
    }

    fn get_device_list(&self) -> io::Result<RawDeviceList> {
        Ok(RawDeviceList {
            devices: NonNull::from(&self.pointers[0]),
            len: self.devices.len(),
        })
    }

    unsafe fn free_device_list(&self, _list: RawDeviceList) {}

    unsafe fn device_index(&self, device: NonNull<IbvDevice>) -> c_int {
        if self.report_index {
            self.device(device).kernel_index
        } else {
            -1
        }
    }

    unsafe fn device_guid(&self, device: NonNull<IbvDevice>) -> u64 {
        Guid::from_host(self.device(device).guid).as_raw()
    }

    unsafe fn open_device(&self, device: NonNull<IbvDevice>) -> io::Result<NonNull<IbvContext>> {
        Ok(device.cast())
    }

    unsafe fn close_device(&self, _context: NonNull<IbvContext>) -> io::Result<()> {
        Ok(())
    }

    unsafe fn query_device(
        &self,
        context: NonNull<IbvContext>,
        attr: &mut IbvDeviceAttr,
    ) -> io::Result<()> {
        let device = self.device(context.cast());
        ffi::write_fixed(&mut attr.fw_ver, "20.39.1002");
        attr.node_guid = Guid::from_host(device.guid).as_raw();
        attr.sys_image_guid = attr.node_guid;
        attr.max_mr_size = u64::MAX;
        attr.atomic_cap = ffi::IBV_ATOMIC_HCA;
        attr.phys_port_cnt = u8::try_from(device.ports.len()).expect("port count fits u8");
        Ok(())
    }

    unsafe fn query_port(
        &self,
        context: NonNull<IbvContext>,
        port_num: u8,
        attr: &mut IbvPortAttr,
    ) -> io::Result<()> {
        let device = self.device(context.cast());
        *attr = *usize::from(port_num)
            .checked_sub(1)
            .and_then(|index| device.ports.get(index))
            .ok_or_else(|| io::Error::from_raw_os_error(EINVAL))?;
        Ok(())
    }
}
