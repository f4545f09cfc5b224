//! HID interface session
//!
//! [`HidEndpoint`] binds one HID interface of an enumerated device to its
//! interrupt IN endpoint and report descriptor, and keeps the two most recent
//! reports so a consumer can compare them without touching the bus again.

use embedded_hal::delay::DelayNs;

use super::constants::{HidReportType, HidRequest, CLASS_INTERFACE_OUT, STANDARD_INTERFACE_IN};
use super::field::{decode_field, HidFieldDescriptor};
use super::item::{classify, validate_mouse, HidKind};
use super::keyboard::KeyboardLeds;
use crate::chip::link::Transport;
use crate::device::{HidClassDescriptor, UsbDevice, UsbEndpoint};
use crate::error::{HidError, HostError};
use crate::host::UsbHost;
use crate::transfer::control::control_transfer;
use crate::transfer::interrupt::interrupt_transfer;
use crate::transfer::{descriptor_type, DataToggle, Direction, SetupPacket, TransferType};

/// Largest report descriptor accepted
pub const MAX_REPORT_DESCRIPTOR_LEN: usize = 256;
/// Largest report held per buffer slot
pub const MAX_REPORT_LEN: usize = 64;

/// Attempts for the report descriptor read and the keyboard SET_REPORT
const CLASS_REQUEST_ATTEMPTS: u8 = 4;

impl SetupPacket {
    /// HID SET_IDLE
    pub const fn hid_set_idle(interface: u8, duration: u8, report_id: u8) -> Self {
        Self {
            bmRequestType: CLASS_INTERFACE_OUT,
            bRequest: HidRequest::SetIdle as u8,
            wValue: ((duration as u16) << 8) | report_id as u16,
            wIndex: interface as u16,
            wLength: 0,
        }
    }

    /// HID SET_REPORT
    pub const fn hid_set_report(interface: u8, report_type: HidReportType, report_id: u8, length: u16) -> Self {
        Self {
            bmRequestType: CLASS_INTERFACE_OUT,
            bRequest: HidRequest::SetReport as u8,
            wValue: ((report_type as u16) << 8) | report_id as u16,
            wIndex: interface as u16,
            wLength: length,
        }
    }

    /// GET_DESCRIPTOR for an interface's report descriptor
    pub const fn hid_report_descriptor(interface: u8, length: u16) -> Self {
        Self {
            bmRequestType: STANDARD_INTERFACE_IN,
            bRequest: crate::transfer::request::GET_DESCRIPTOR,
            wValue: (descriptor_type::REPORT as u16) << 8,
            wIndex: interface as u16,
            wLength: length,
        }
    }
}

/// Which of the two report buffers a read targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportSlot {
    /// Most recently fetched report
    Current,
    /// The one before it
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bank {
    A,
    B,
}

impl Bank {
    fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// Open HID interface with double-buffered reports
pub struct HidEndpoint {
    interface: u8,
    ep0_max_packet: u8,
    endpoint: UsbEndpoint,
    toggle: DataToggle,
    hid_descriptor: HidClassDescriptor,
    report_descriptor: heapless::Vec<u8, MAX_REPORT_DESCRIPTOR_LEN>,
    kind: HidKind,
    report_len: usize,
    banks: [[u8; MAX_REPORT_LEN]; 2],
    current: Bank,
}

impl HidEndpoint {
    /// Open HID interface `interface` of a configured device
    ///
    /// Reads and classifies the report descriptor, selects the first
    /// interrupt IN endpoint and, for keyboards, sends the initial LED
    /// output report. Both report buffers start zeroed.
    pub fn open<T: Transport, D: DelayNs>(
        host: &mut UsbHost<T, D>,
        device: &UsbDevice,
        interface: u8,
    ) -> Result<Self, HidError> {
        if !device.is_ready() {
            return Err(HidError::NoDevice);
        }
        let iface = device.interface(interface).ok_or(HidError::InvalidParam)?;

        let Some(hid_descriptor) = iface.hid else {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "No HID descriptor on {:#x}:{:#x} interface {}",
                device.vendor_id(),
                device.product_id(),
                interface
            );
            return Err(HidError::NotHid);
        };

        #[cfg(feature = "defmt")]
        defmt::info!(
            "HID descriptor found, version {:#x}, country {}",
            hid_descriptor.bcd_hid,
            hid_descriptor.country_code
        );

        if hid_descriptor.num_descriptors > 1 {
            #[cfg(feature = "defmt")]
            defmt::error!("bNumDescriptors={} not supported", hid_descriptor.num_descriptors);
            return Err(HidError::Unsupported);
        }
        let descriptor_len = hid_descriptor.descriptor_length as usize;
        if hid_descriptor.descriptor_type != descriptor_type::REPORT
            || descriptor_len == 0
            || descriptor_len > MAX_REPORT_DESCRIPTOR_LEN
        {
            return Err(HidError::Unsupported);
        }

        let ep0 = device.ep0_max_packet();

        // Optional for the device; failure only costs duplicate reports
        match control_transfer(host, ep0, &SetupPacket::hid_set_idle(interface, 0, 0), &mut []) {
            Ok(_) => {}
            Err(HostError::Disconnected) => return Err(HidError::NoDevice),
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("SET_IDLE on interface {} failed: {}", interface, _e);
            }
        }

        let endpoint = *iface
            .find_endpoint(Direction::In, TransferType::Interrupt)
            .ok_or(HidError::Unsupported)?;

        let report_descriptor = Self::read_report_descriptor(host, ep0, interface, descriptor_len)?;

        let kind = classify(&report_descriptor)?;
        if kind == HidKind::Mouse {
            validate_mouse(&report_descriptor)?;
        }

        #[cfg(feature = "defmt")]
        defmt::info!("Interface {} is a {}, report descriptor {} bytes", interface, kind, descriptor_len);

        let mut hid = Self {
            interface,
            ep0_max_packet: ep0,
            endpoint,
            toggle: DataToggle::DATA0,
            hid_descriptor,
            report_descriptor,
            kind,
            report_len: kind.report_len().min(MAX_REPORT_LEN),
            banks: [[0; MAX_REPORT_LEN]; 2],
            current: Bank::A,
        };

        if kind == HidKind::Keyboard {
            hid.send_output_report(host, KeyboardLeds::NUM_LOCK.bits(), CLASS_REQUEST_ATTEMPTS)?;
        }

        Ok(hid)
    }

    fn read_report_descriptor<T: Transport, D: DelayNs>(
        host: &mut UsbHost<T, D>,
        ep0: u8,
        interface: u8,
        len: usize,
    ) -> Result<heapless::Vec<u8, MAX_REPORT_DESCRIPTOR_LEN>, HidError> {
        let mut buf = [0u8; MAX_REPORT_DESCRIPTOR_LEN];
        let setup = SetupPacket::hid_report_descriptor(interface, len as u16);
        let mut last = HostError::Protocol;

        for _ in 0..CLASS_REQUEST_ATTEMPTS {
            match control_transfer(host, ep0, &setup, &mut buf[..len]) {
                Ok(n) if n >= len => {
                    let mut descriptor = heapless::Vec::new();
                    descriptor
                        .extend_from_slice(&buf[..len])
                        .map_err(|_| HidError::Unsupported)?;
                    return Ok(descriptor);
                }
                Ok(_n) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Report descriptor short: {} of {} bytes", _n, len);
                    last = HostError::Protocol;
                }
                Err(HostError::Disconnected) => return Err(HidError::NoDevice),
                Err(e) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Report descriptor read failed: {}", e);
                    last = e;
                }
            }
        }

        Err(HidError::Host(last))
    }

    /// Send a one-byte output report (id 0), retrying up to `attempts` times
    fn send_output_report<T: Transport, D: DelayNs>(
        &mut self,
        host: &mut UsbHost<T, D>,
        value: u8,
        attempts: u8,
    ) -> Result<(), HidError> {
        let setup = SetupPacket::hid_set_report(self.interface, HidReportType::Output, 0, 1);
        let mut payload = [value];
        let mut last = HostError::Protocol;

        for _ in 0..attempts.max(1) {
            match control_transfer(host, self.ep0_max_packet, &setup, &mut payload) {
                Ok(1) => return Ok(()),
                Ok(_) => last = HostError::Protocol,
                Err(HostError::Disconnected) => return Err(HidError::NoDevice),
                Err(e) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("SET_REPORT on interface {} failed: {}", self.interface, e);
                    last = e;
                }
            }
        }

        Err(HidError::Host(last))
    }

    /// Read one report into the spare buffer and make it current
    ///
    /// The previous current report becomes [`ReportSlot::Last`]. On failure
    /// neither buffer changes role. A NAK means the device had nothing new
    /// and comes back as `HidError::Host(HostError::Nak)`.
    pub fn fetch_report<T: Transport, D: DelayNs>(&mut self, host: &mut UsbHost<T, D>) -> Result<(), HidError> {
        let spare = self.current.other();
        let len = self.report_len;
        let buf = &mut self.banks[spare.index()][..len];

        let n = interrupt_transfer(host, &self.endpoint, &mut self.toggle, buf)?;
        buf[n..].fill(0);

        self.current = spare;
        Ok(())
    }

    /// Report bytes held in `slot`
    pub fn report(&self, slot: ReportSlot) -> &[u8] {
        let bank = match slot {
            ReportSlot::Current => self.current,
            ReportSlot::Last => self.current.other(),
        };
        &self.banks[bank.index()][..self.report_len]
    }

    /// Decode element `index` of `field` from `slot`
    pub fn get_field(&self, field: &HidFieldDescriptor, index: u8, slot: ReportSlot) -> Result<i64, HidError> {
        decode_field(self.report(slot), field, index)
    }

    /// Set keyboard LEDs
    pub fn set_leds<T: Transport, D: DelayNs>(
        &mut self,
        host: &mut UsbHost<T, D>,
        leds: KeyboardLeds,
    ) -> Result<(), HidError> {
        if self.kind != HidKind::Keyboard {
            return Err(HidError::Unsupported);
        }
        self.send_output_report(host, leds.bits(), 1)
    }

    /// Device class
    pub fn kind(&self) -> HidKind {
        self.kind
    }

    /// Interface number
    pub fn interface(&self) -> u8 {
        self.interface
    }

    /// Interrupt IN endpoint in use
    pub fn endpoint(&self) -> &UsbEndpoint {
        &self.endpoint
    }

    /// HID class descriptor of the interface
    pub fn hid_descriptor(&self) -> &HidClassDescriptor {
        &self.hid_descriptor
    }

    /// Raw report descriptor
    pub fn report_descriptor(&self) -> &[u8] {
        &self.report_descriptor
    }

    /// Report length in bytes
    pub fn report_len(&self) -> usize {
        self.report_len
    }
}
