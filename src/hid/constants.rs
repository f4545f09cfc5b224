//! HID protocol constants
//!
//! Values from the USB HID Specification 1.11 and the HID Usage Tables.

/// HID interface class code
pub const HID_CLASS: u8 = 0x03;

/// HID class-specific descriptor types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HidDescriptorType {
    /// HID descriptor
    Hid = 0x21,
    /// Report descriptor
    Report = 0x22,
    /// Physical descriptor
    Physical = 0x23,
}

/// HID class-specific requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HidRequest {
    /// Get report
    GetReport = 0x01,
    /// Get idle rate
    GetIdle = 0x02,
    /// Get protocol
    GetProtocol = 0x03,
    /// Set report
    SetReport = 0x09,
    /// Set idle rate
    SetIdle = 0x0A,
    /// Set protocol
    SetProtocol = 0x0B,
}

/// HID report types (high byte of wValue in GET/SET_REPORT)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HidReportType {
    /// Input report
    Input = 0x01,
    /// Output report
    Output = 0x02,
    /// Feature report
    Feature = 0x03,
}

/// `bmRequestType` for class requests to an interface, host-to-device
pub const CLASS_INTERFACE_OUT: u8 = 0x21;
/// `bmRequestType` for standard requests to an interface, device-to-host
pub const STANDARD_INTERFACE_IN: u8 = 0x81;

/// Prefix byte of a long item
pub const LONG_ITEM_PREFIX: u8 = 0xFE;

/// Main item tags
pub mod main_tag {
    /// Input
    pub const INPUT: u8 = 0x8;
    /// Output
    pub const OUTPUT: u8 = 0x9;
    /// Collection
    pub const COLLECTION: u8 = 0xA;
    /// Feature
    pub const FEATURE: u8 = 0xB;
    /// End Collection
    pub const END_COLLECTION: u8 = 0xC;
}

/// Global item tags
pub mod global_tag {
    /// Usage Page
    pub const USAGE_PAGE: u8 = 0x0;
    /// Logical Minimum
    pub const LOGICAL_MINIMUM: u8 = 0x1;
    /// Logical Maximum
    pub const LOGICAL_MAXIMUM: u8 = 0x2;
    /// Physical Minimum
    pub const PHYSICAL_MINIMUM: u8 = 0x3;
    /// Physical Maximum
    pub const PHYSICAL_MAXIMUM: u8 = 0x4;
    /// Report Size in bits
    pub const REPORT_SIZE: u8 = 0x7;
    /// Report ID
    pub const REPORT_ID: u8 = 0x8;
    /// Report Count
    pub const REPORT_COUNT: u8 = 0x9;
}

/// Local item tags
pub mod local_tag {
    /// Usage
    pub const USAGE: u8 = 0x0;
    /// Usage Minimum
    pub const USAGE_MINIMUM: u8 = 0x1;
    /// Usage Maximum
    pub const USAGE_MAXIMUM: u8 = 0x2;
}

/// Usage pages
pub mod usage_page {
    /// Generic Desktop
    pub const GENERIC_DESKTOP: u32 = 0x01;
    /// Keyboard/Keypad
    pub const KEYBOARD: u32 = 0x07;
    /// LEDs
    pub const LED: u32 = 0x08;
    /// Buttons
    pub const BUTTON: u32 = 0x09;
}

/// Generic Desktop usages
pub mod usage {
    /// Pointer
    pub const POINTER: u32 = 0x01;
    /// Mouse
    pub const MOUSE: u32 = 0x02;
    /// Keyboard
    pub const KEYBOARD: u32 = 0x06;
}

/// Collection types
pub mod collection {
    /// Physical (group of axes)
    pub const PHYSICAL: u32 = 0x00;
    /// Application
    pub const APPLICATION: u32 = 0x01;
}
