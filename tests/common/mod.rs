//! Shared helpers for the integration tests

#![allow(dead_code)]

pub mod mock_hardware;

use ch375_hidbridge::{ChipConfig, Enumerator, UsbDevice, UsbHost};

pub use mock_hardware::{FakeCh375, FakeDevice, RecordingDelay, Token, STATUS_NAK, STATUS_STALL};

pub type TestHost = UsbHost<FakeCh375, RecordingDelay>;

pub const VENDOR_ID: u16 = 0x046D;
pub const PRODUCT_ID: u16 = 0xC077;

/// 16 buttons, 16-bit X/Y, wheel
pub const MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x05, 0x09, //     Usage Page (Button)
    0x19, 0x01, //     Usage Minimum (1)
    0x29, 0x10, //     Usage Maximum (16)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x10, //     Report Count (16)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Var, Abs)
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x16, 0x01, 0x80, //     Logical Minimum (-32767)
    0x26, 0xFF, 0x7F, //     Logical Maximum (32767)
    0x75, 0x10, //     Report Size (16)
    0x95, 0x02, //     Report Count (2)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x81, 0x06, //     Input (Data, Var, Rel)
    0x15, 0x81, //     Logical Minimum (-127)
    0x25, 0x7F, //     Logical Maximum (127)
    0x75, 0x08, //     Report Size (8)
    0x95, 0x01, //     Report Count (1)
    0x09, 0x38, //     Usage (Wheel)
    0x81, 0x06, //     Input (Data, Var, Rel)
    0xC0, //   End Collection
    0xC0, // End Collection
];

/// Boot keyboard
pub const KEYBOARD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    0x05, 0x07, //   Usage Page (Keyboard)
    0x19, 0xE0, //   Usage Minimum (Left Control)
    0x29, 0xE7, //   Usage Maximum (Right GUI)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Var, Abs)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Const)
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (Num Lock)
    0x29, 0x05, //   Usage Maximum (Kana)
    0x91, 0x02, //   Output (Data, Var, Abs)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Const)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x65, //   Logical Maximum (101)
    0x05, 0x07, //   Usage Page (Keyboard)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0x65, //   Usage Maximum (101)
    0x81, 0x00, //   Input (Data, Array)
    0xC0, // End Collection
];

/// Interface layout used to build a configuration descriptor
#[derive(Debug, Clone, Copy)]
pub struct HidInterfaceSpec {
    pub number: u8,
    pub protocol: u8,
    pub endpoint: u8,
    pub report_len: u16,
    /// Emit the HID class descriptor
    pub with_hid: bool,
}

impl HidInterfaceSpec {
    pub fn mouse(number: u8, endpoint: u8) -> Self {
        Self {
            number,
            protocol: 2,
            endpoint,
            report_len: MOUSE_REPORT_DESCRIPTOR.len() as u16,
            with_hid: true,
        }
    }

    pub fn keyboard(number: u8, endpoint: u8) -> Self {
        Self {
            number,
            protocol: 1,
            endpoint,
            report_len: KEYBOARD_REPORT_DESCRIPTOR.len() as u16,
            with_hid: true,
        }
    }
}

pub fn device_descriptor(ep0_max_packet: u8) -> Vec<u8> {
    let vid = VENDOR_ID.to_le_bytes();
    let pid = PRODUCT_ID.to_le_bytes();
    vec![
        18, 0x01, 0x00, 0x02, // bcdUSB 2.00
        0x00, 0x00, 0x00, ep0_max_packet, vid[0], vid[1], pid[0], pid[1], 0x00, 0x01, // bcdDevice
        0x01, 0x02, 0x00, 0x01, // one configuration
    ]
}

pub fn config_descriptor(interfaces: &[HidInterfaceSpec]) -> Vec<u8> {
    let mut body = Vec::new();
    for spec in interfaces {
        body.extend_from_slice(&[9, 0x04, spec.number, 0, 1, 0x03, 1, spec.protocol, 0]);
        if spec.with_hid {
            let len = spec.report_len.to_le_bytes();
            body.extend_from_slice(&[9, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, len[0], len[1]]);
        }
        body.extend_from_slice(&[7, 0x05, spec.endpoint, 0x03, 8, 0, 10]);
    }

    let total = (9 + body.len() as u16).to_le_bytes();
    let mut config = vec![9, 0x02, total[0], total[1], interfaces.len() as u8, 1, 0, 0xA0, 50];
    config.extend_from_slice(&body);
    config
}

pub fn hid_device(ep0_max_packet: u8, interfaces: &[HidInterfaceSpec]) -> FakeDevice {
    let mut device = FakeDevice::default();
    device.descriptors.push((0x01, 0, device_descriptor(ep0_max_packet)));
    device.descriptors.push((0x02, 0, config_descriptor(interfaces)));
    for spec in interfaces {
        let report = match spec.protocol {
            1 => KEYBOARD_REPORT_DESCRIPTOR,
            _ => MOUSE_REPORT_DESCRIPTOR,
        };
        device.descriptors.push((0x22, u16::from(spec.number), report.to_vec()));
    }
    device
}

pub fn mouse_device() -> FakeDevice {
    hid_device(8, &[HidInterfaceSpec::mouse(0, 0x81)])
}

pub fn keyboard_device() -> FakeDevice {
    hid_device(8, &[HidInterfaceSpec::keyboard(0, 0x81)])
}

/// Host over `chip` with a short token bound so NAK-free fakes never stall a test
pub fn host(chip: FakeCh375) -> TestHost {
    UsbHost::with_transport(chip, RecordingDelay::default(), ChipConfig::default().token_timeout_ms(50))
}

pub fn fake(host: &TestHost) -> &FakeCh375 {
    host.chip().link().transport()
}

pub fn fake_mut(host: &mut TestHost) -> &mut FakeCh375 {
    host.chip_mut().link_mut().transport_mut()
}

pub fn elapsed_ms(host: &TestHost) -> u64 {
    host.chip().delay().elapsed_ms()
}

/// Host with `device` attached and enumerated
pub fn enumerated(device: FakeDevice) -> (TestHost, UsbDevice) {
    let mut host = host(FakeCh375::new(device));
    host.init().expect("init");
    let device = Enumerator::default().enumerate(&mut host).expect("enumerate");
    (host, device)
}
