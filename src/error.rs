//! Error types for every layer of the bridge
//!
//! Errors flow upward: a [`LinkError`] becomes a [`ChipError`], which becomes a
//! [`HostError`], which becomes a [`HidError`]. Each layer keeps only the kinds
//! its callers can act on.

use core::fmt;

/// Transport-level failure of a single framed exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// The underlying channel reported an I/O failure
    Transport,
    /// The exchange did not complete within its timeout
    Timeout,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "Transport I/O failed"),
            Self::Timeout => write!(f, "Transport timeout"),
        }
    }
}

/// CH375 command-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipError {
    /// Link exchange failed
    Link(LinkError),
    /// Probe byte did not come back complemented
    NotPresent,
    /// Mode change acknowledged with something other than the success code
    ModeRejected(u8),
    /// Caller violated a command contract (e.g. block longer than 64 bytes)
    InvalidParam,
    /// Interrupt line never asserted within the token wait bound
    Timeout,
    /// Token completed with a non-success interrupt status
    TransactionFailed(u8),
    /// Chip answered a query with a byte outside the documented set
    UnexpectedResponse(u8),
    /// Chip buffered more data than the caller asked for
    Overflow,
}

impl From<LinkError> for ChipError {
    fn from(err: LinkError) -> Self {
        Self::Link(err)
    }
}

impl fmt::Display for ChipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "Link error: {}", e),
            Self::NotPresent => write!(f, "CH375 not present"),
            Self::ModeRejected(code) => write!(f, "USB mode rejected (0x{:02X})", code),
            Self::InvalidParam => write!(f, "Invalid parameter"),
            Self::Timeout => write!(f, "Interrupt wait timeout"),
            Self::TransactionFailed(status) => {
                write!(f, "Transaction failed (status 0x{:02X})", status)
            }
            Self::UnexpectedResponse(byte) => write!(f, "Unexpected response 0x{:02X}", byte),
            Self::Overflow => write!(f, "Block overflow"),
        }
    }
}

/// USB host errors seen by transfer and enumeration callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostError {
    /// Channel I/O failed
    Transport,
    /// Bounded wait exceeded
    Timeout,
    /// Chip or device answered with something unexpected
    Protocol,
    /// Device was removed
    Disconnected,
    /// Device NAK'd and the chip gave up retrying
    Nak,
    /// Device STALLed the endpoint
    Stall,
    /// Caller contract violation
    InvalidParam,
}

impl From<ChipError> for HostError {
    fn from(err: ChipError) -> Self {
        match err {
            ChipError::Link(LinkError::Transport) => Self::Transport,
            ChipError::Link(LinkError::Timeout) | ChipError::Timeout => Self::Timeout,
            ChipError::InvalidParam => Self::InvalidParam,
            ChipError::NotPresent
            | ChipError::ModeRejected(_)
            | ChipError::UnexpectedResponse(_)
            | ChipError::Overflow => Self::Protocol,
            ChipError::TransactionFailed(status) => {
                crate::chip::command::TokenStatus::from_status(status).into()
            }
        }
    }
}

impl HostError {
    /// Worth retrying on the same device session
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Nak | Self::Protocol)
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "Transport failure"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Protocol => write!(f, "Protocol error"),
            Self::Disconnected => write!(f, "Device disconnected"),
            Self::Nak => write!(f, "Device NAK"),
            Self::Stall => write!(f, "USB stall"),
            Self::InvalidParam => write!(f, "Invalid parameter"),
        }
    }
}

/// HID session errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidError {
    /// Underlying host operation failed
    Host(HostError),
    /// Device is gone; the session must be torn down
    NoDevice,
    /// Interface carries no HID class descriptor
    NotHid,
    /// Report descriptor is not a supported mouse or keyboard
    Unsupported,
    /// Field index or width out of range
    InvalidParam,
}

impl From<HostError> for HidError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Disconnected => Self::NoDevice,
            other => Self::Host(other),
        }
    }
}

impl fmt::Display for HidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(e) => write!(f, "Host error: {}", e),
            Self::NoDevice => write!(f, "No device"),
            Self::NotHid => write!(f, "Not a HID interface"),
            Self::Unsupported => write!(f, "Unsupported HID device"),
            Self::InvalidParam => write!(f, "Invalid parameter"),
        }
    }
}

/// Composite descriptor registry errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompositeError {
    /// Slot index beyond the registry size
    InvalidSlot,
    /// `build` called with nothing registered
    NoInterfaces,
    /// Descriptor does not fit the fixed buffer
    DescriptorTooLarge,
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSlot => write!(f, "Invalid interface slot"),
            Self::NoInterfaces => write!(f, "No interfaces registered"),
            Self::DescriptorTooLarge => write!(f, "Descriptor too large"),
        }
    }
}

/// Host operation result type
pub type Result<T> = core::result::Result<T, HostError>;
