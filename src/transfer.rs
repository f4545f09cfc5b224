//! USB transfer types
//!
//! Control, interrupt and bulk transfers built on the host's token
//! transaction primitive. Data toggle state belongs to the caller so it can
//! persist across calls for a given endpoint.

pub mod control;
pub mod interrupt;

pub use control::control_transfer;
pub use interrupt::{bulk_transfer, interrupt_transfer};

/// USB transfer types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferType {
    /// Endpoint 0 style request/response
    Control,
    /// Isochronous (not driven by this host)
    Isochronous,
    /// Bulk
    Bulk,
    /// Interrupt
    Interrupt,
}

impl TransferType {
    /// Decode `bmAttributes` bits 1..0 of an endpoint descriptor
    pub const fn from_attributes(attributes: u8) -> Self {
        match attributes & 0x03 {
            0 => Self::Control,
            1 => Self::Isochronous,
            2 => Self::Bulk,
            _ => Self::Interrupt,
        }
    }
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Device to host
    In,
    /// Host to device
    Out,
}

impl Direction {
    /// Direction encoded in bit 7 of an endpoint address or `bmRequestType`
    pub const fn from_bit7(value: u8) -> Self {
        if value & 0x80 != 0 {
            Self::In
        } else {
            Self::Out
        }
    }
}

/// Standard request codes
pub mod request {
    /// GET_STATUS
    pub const GET_STATUS: u8 = 0x00;
    /// CLEAR_FEATURE
    pub const CLEAR_FEATURE: u8 = 0x01;
    /// SET_ADDRESS
    pub const SET_ADDRESS: u8 = 0x05;
    /// GET_DESCRIPTOR
    pub const GET_DESCRIPTOR: u8 = 0x06;
    /// SET_CONFIGURATION
    pub const SET_CONFIGURATION: u8 = 0x09;
}

/// Descriptor type codes
pub mod descriptor_type {
    /// Device
    pub const DEVICE: u8 = 0x01;
    /// Configuration
    pub const CONFIGURATION: u8 = 0x02;
    /// Interface
    pub const INTERFACE: u8 = 0x04;
    /// Endpoint
    pub const ENDPOINT: u8 = 0x05;
    /// HID class
    pub const HID: u8 = 0x21;
    /// HID report
    pub const REPORT: u8 = 0x22;
}

/// USB Setup packet per USB 2.0 specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(non_snake_case)] // USB spec field names
pub struct SetupPacket {
    /// Request type and direction
    pub bmRequestType: u8,
    /// Specific request
    pub bRequest: u8,
    /// Request-specific value
    pub wValue: u16,
    /// Request-specific index
    pub wIndex: u16,
    /// Data stage length
    pub wLength: u16,
}

impl SetupPacket {
    /// Standard GET_DESCRIPTOR request
    pub const fn get_descriptor(desc_type: u8, desc_index: u8, length: u16) -> Self {
        Self {
            bmRequestType: 0x80, // Device-to-host, standard, device
            bRequest: request::GET_DESCRIPTOR,
            wValue: ((desc_type as u16) << 8) | (desc_index as u16),
            wIndex: 0,
            wLength: length,
        }
    }

    /// Standard SET_ADDRESS request
    pub const fn set_address(address: u8) -> Self {
        Self {
            bmRequestType: 0x00, // Host-to-device, standard, device
            bRequest: request::SET_ADDRESS,
            wValue: address as u16,
            wIndex: 0,
            wLength: 0,
        }
    }

    /// Standard SET_CONFIGURATION request
    pub const fn set_configuration(config_value: u8) -> Self {
        Self {
            bmRequestType: 0x00, // Host-to-device, standard, device
            bRequest: request::SET_CONFIGURATION,
            wValue: config_value as u16,
            wIndex: 0,
            wLength: 0,
        }
    }

    /// Standard CLEAR_FEATURE request for endpoint halt
    pub const fn clear_halt(endpoint: u8) -> Self {
        Self {
            bmRequestType: 0x02, // Host-to-device, standard, endpoint
            bRequest: request::CLEAR_FEATURE,
            wValue: 0, // ENDPOINT_HALT
            wIndex: endpoint as u16,
            wLength: 0,
        }
    }

    /// Direction of the data stage
    pub const fn direction(&self) -> Direction {
        Direction::from_bit7(self.bmRequestType)
    }

    /// Wire layout, multi-byte fields little-endian
    pub fn to_bytes(&self) -> [u8; 8] {
        let value = self.wValue.to_le_bytes();
        let index = self.wIndex.to_le_bytes();
        let length = self.wLength.to_le_bytes();
        [
            self.bmRequestType,
            self.bRequest,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    /// Parse the wire layout
    pub fn from_bytes(bytes: &[u8; 8]) -> Self {
        Self {
            bmRequestType: bytes[0],
            bRequest: bytes[1],
            wValue: u16::from_le_bytes([bytes[2], bytes[3]]),
            wIndex: u16::from_le_bytes([bytes[4], bytes[5]]),
            wLength: u16::from_le_bytes([bytes[6], bytes[7]]),
        }
    }
}

/// Per-endpoint data toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataToggle(bool);

impl DataToggle {
    /// DATA0
    pub const DATA0: Self = Self(false);
    /// DATA1
    pub const DATA1: Self = Self(true);

    /// Current toggle bit
    pub const fn get(self) -> bool {
        self.0
    }

    /// Advance after a successful data packet
    pub fn flip(&mut self) {
        self.0 = !self.0;
    }

    /// Back to DATA0 (after SET_CONFIGURATION or CLEAR_FEATURE)
    pub fn reset(&mut self) {
        self.0 = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_packet_wire_layout() {
        let setup = SetupPacket::get_descriptor(descriptor_type::CONFIGURATION, 0, 0x0109);
        assert_eq!(setup.to_bytes(), [0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0x09, 0x01]);
        assert_eq!(SetupPacket::from_bytes(&setup.to_bytes()), setup);
        assert_eq!(setup.direction(), Direction::In);

        let setup = SetupPacket::set_address(1);
        assert_eq!(setup.to_bytes(), [0x00, 0x05, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(setup.direction(), Direction::Out);
    }

    #[test]
    fn test_transfer_type_from_attributes() {
        assert_eq!(TransferType::from_attributes(0x03), TransferType::Interrupt);
        assert_eq!(TransferType::from_attributes(0x02), TransferType::Bulk);
        assert_eq!(TransferType::from_attributes(0x0D), TransferType::Isochronous);
    }

    #[test]
    fn test_toggle_flip() {
        let mut toggle = DataToggle::default();
        assert!(!toggle.get());
        toggle.flip();
        assert_eq!(toggle, DataToggle::DATA1);
        toggle.reset();
        assert_eq!(toggle, DataToggle::DATA0);
    }
}
