//! USB device polled as the update mechanism.
//!
//! Update classes (DFU and friends) live outside this crate. The device is
//! enumerated and kept serviced here; enumeration by a host is expected inside
//! the window and does not hold the bootloader. Only an update class marking
//! the [`SessionLatch`] does.

use handoff::{Session, SessionLatch, UpdateMechanism};
use stm32f4xx_hal::otg_fs::{UsbBus, UsbBusType, USB};
use usb_device::bus::UsbBusAllocator;
use usb_device::prelude::*;

use crate::config;

pub struct UsbUpdater {
    device: UsbDevice<'static, UsbBusType>,
    session: SessionLatch,
}

impl UsbUpdater {
    pub fn new(usb: USB) -> Self {
        let ep_memory = cortex_m::singleton!(: [u32; 320] = [0; 320]).unwrap();
        let bus = cortex_m::singleton!(
            : UsbBusAllocator<UsbBusType> = UsbBus::new(usb, ep_memory)
        )
        .unwrap();

        let device = UsbDeviceBuilder::new(bus, UsbVidPid(config::USB_VID, config::USB_PID))
            .strings(&[StringDescriptors::default()
                .manufacturer("Blackpill")
                .product("USB Bootloader")])
            .unwrap()
            .build();

        Self {
            device,
            session: SessionLatch::new(),
        }
    }
}

impl UpdateMechanism for UsbUpdater {
    fn protocol_step(&mut self) -> Session {
        self.device.poll(&mut []);
        self.session.get()
    }
}
