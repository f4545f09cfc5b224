//! Enumerated device model
//!
//! A [`UsbDevice`] is produced by enumeration and owns the raw configuration
//! descriptor plus the interface/endpoint table parsed out of it.

use embedded_hal::delay::DelayNs;

use crate::chip::command::UsbSpeed;
use crate::chip::link::Transport;
use crate::error::Result;
use crate::host::UsbHost;
use crate::transfer::{control::control_transfer, Direction, SetupPacket, TransferType};

/// Largest configuration descriptor kept per device
pub const MAX_CONFIG_DESCRIPTOR_LEN: usize = 256;
/// Interfaces tracked per device
pub const MAX_INTERFACES: usize = 4;
/// Endpoints tracked per interface
pub const MAX_ENDPOINTS: usize = 4;

/// Device connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Nothing usable on the port
    Disconnected,
    /// Attached and reset, descriptors not yet read
    Connected,
    /// Addressed and configured
    Ready,
}

/// Endpoint table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsbEndpoint {
    /// Endpoint number (0-15)
    pub number: u8,
    /// Transfer direction
    pub direction: Direction,
    /// Transfer type
    pub transfer_type: TransferType,
    /// wMaxPacketSize (packet size bits only)
    pub max_packet_size: u16,
    /// bInterval
    pub interval: u8,
}

impl UsbEndpoint {
    /// Parse a 7-byte endpoint descriptor record
    pub fn from_descriptor(record: &[u8; 7]) -> Self {
        Self {
            number: record[2] & 0x0F,
            direction: Direction::from_bit7(record[2]),
            transfer_type: TransferType::from_attributes(record[3]),
            max_packet_size: u16::from_le_bytes([record[4], record[5]]) & 0x07FF,
            interval: record[6],
        }
    }

    /// bEndpointAddress
    pub fn address(&self) -> u8 {
        match self.direction {
            Direction::In => self.number | 0x80,
            Direction::Out => self.number,
        }
    }
}

/// HID class descriptor (type 0x21) attached to an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidClassDescriptor {
    /// bcdHID
    pub bcd_hid: u16,
    /// bCountryCode
    pub country_code: u8,
    /// bNumDescriptors
    pub num_descriptors: u8,
    /// Type of the first class descriptor (0x22 for a report descriptor)
    pub descriptor_type: u8,
    /// Length of the first class descriptor
    pub descriptor_length: u16,
}

impl HidClassDescriptor {
    /// Parse a 9-byte HID descriptor record
    pub fn from_descriptor(record: &[u8; 9]) -> Self {
        Self {
            bcd_hid: u16::from_le_bytes([record[2], record[3]]),
            country_code: record[4],
            num_descriptors: record[5],
            descriptor_type: record[6],
            descriptor_length: u16::from_le_bytes([record[7], record[8]]),
        }
    }
}

/// Interface table entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbInterface {
    /// bInterfaceNumber
    pub number: u8,
    /// bAlternateSetting
    pub alternate_setting: u8,
    /// bInterfaceClass
    pub class: u8,
    /// bInterfaceSubClass
    pub subclass: u8,
    /// bInterfaceProtocol
    pub protocol: u8,
    /// HID class descriptor, if one followed the interface record
    pub hid: Option<HidClassDescriptor>,
    /// Endpoints in descriptor order
    pub endpoints: heapless::Vec<UsbEndpoint, MAX_ENDPOINTS>,
}

impl UsbInterface {
    /// Parse a 9-byte interface descriptor record
    pub fn from_descriptor(record: &[u8; 9]) -> Self {
        Self {
            number: record[2],
            alternate_setting: record[3],
            class: record[5],
            subclass: record[6],
            protocol: record[7],
            hid: None,
            endpoints: heapless::Vec::new(),
        }
    }

    /// First endpoint matching direction and type
    pub fn find_endpoint(&self, direction: Direction, transfer_type: TransferType) -> Option<&UsbEndpoint> {
        self.endpoints
            .iter()
            .find(|ep| ep.direction == direction && ep.transfer_type == transfer_type)
    }

    /// HID class interface
    pub fn is_hid(&self) -> bool {
        self.class == crate::hid::constants::HID_CLASS
    }
}

/// One upstream peripheral
#[derive(Debug, Clone)]
pub struct UsbDevice {
    pub(crate) state: ConnectionState,
    pub(crate) speed: UsbSpeed,
    pub(crate) address: u8,
    pub(crate) ep0_max_packet: u8,
    pub(crate) vendor_id: u16,
    pub(crate) product_id: u16,
    pub(crate) config_value: u8,
    pub(crate) config_descriptor: heapless::Vec<u8, MAX_CONFIG_DESCRIPTOR_LEN>,
    pub(crate) interfaces: heapless::Vec<UsbInterface, MAX_INTERFACES>,
}

impl UsbDevice {
    /// Empty, disconnected device
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            speed: UsbSpeed::Full,
            address: 0,
            ep0_max_packet: 0,
            vendor_id: 0,
            product_id: 0,
            config_value: 0,
            config_descriptor: heapless::Vec::new(),
            interfaces: heapless::Vec::new(),
        }
    }

    /// Connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Addressed, configured and holding a descriptor
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Negotiated speed
    pub fn speed(&self) -> UsbSpeed {
        self.speed
    }

    /// Device address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Control endpoint max packet size
    pub fn ep0_max_packet(&self) -> u8 {
        self.ep0_max_packet
    }

    /// Vendor ID
    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// Product ID
    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Active configuration value
    pub fn config_value(&self) -> u8 {
        self.config_value
    }

    /// Raw configuration descriptor
    pub fn config_descriptor(&self) -> &[u8] {
        &self.config_descriptor
    }

    /// Interface table
    pub fn interfaces(&self) -> &[UsbInterface] {
        &self.interfaces
    }

    /// Look up an interface by number
    pub fn interface(&self, number: u8) -> Option<&UsbInterface> {
        self.interfaces.iter().find(|i| i.number == number)
    }

    /// Control transfer on this device's endpoint 0
    pub fn control<T: Transport, D: DelayNs>(
        &self,
        host: &mut UsbHost<T, D>,
        setup: &SetupPacket,
        data: &mut [u8],
    ) -> Result<usize> {
        control_transfer(host, self.ep0_max_packet, setup, data)
    }

    /// Mark the device gone and drop everything read from it
    pub fn close(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::info!("Closing device {:#x}:{:#x}", self.vendor_id, self.product_id);

        *self = Self::new();
    }
}

impl Default for UsbDevice {
    fn default() -> Self {
        Self::new()
    }
}
