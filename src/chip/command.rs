//! CH375 command set
//!
//! Command codes, fixed data bytes and status codes from the CH375 datasheet
//! (CH375DS1). Values are bit-exact; the chip rejects or misinterprets anything else.

use crate::error::HostError;

/// Command opcodes
pub mod cmd {
    /// Read IC version (low 6 bits)
    pub const GET_IC_VER: u8 = 0x01;
    /// Set USB bus speed for the attached device
    pub const SET_USB_SPEED: u8 = 0x04;
    /// Echo test: chip returns the bitwise complement of the data byte
    pub const CHECK_EXIST: u8 = 0x06;
    /// Query attached device speed
    pub const GET_DEV_RATE: u8 = 0x0A;
    /// Configure NAK / timeout retry behaviour
    pub const SET_RETRY: u8 = 0x0B;
    /// Set the device address the chip puts into tokens
    pub const SET_USB_ADDR: u8 = 0x13;
    /// Select operating mode
    pub const SET_USB_MODE: u8 = 0x15;
    /// Query connect state
    pub const TEST_CONNECT: u8 = 0x16;
    /// Abort an in-progress NAK retry
    pub const ABORT_NAK: u8 = 0x17;
    /// Read and clear interrupt status
    pub const GET_STATUS: u8 = 0x22;
    /// Read the endpoint buffer and release it
    pub const RD_USB_DATA: u8 = 0x28;
    /// Write the host endpoint transmit buffer
    pub const WR_USB_DATA7: u8 = 0x2B;
    /// Issue a token with explicit toggle bits
    pub const ISSUE_TKN_X: u8 = 0x4E;
}

/// Acknowledge code for mode changes
pub const CMD_RET_SUCCESS: u8 = 0x51;
/// Failure code for mode changes
pub const CMD_RET_FAILED: u8 = 0x5F;

/// Probe byte for CHECK_EXIST
pub const CHECK_EXIST_PROBE: u8 = 0x65;
/// Expected CHECK_EXIST answer
pub const CHECK_EXIST_ANSWER: u8 = !CHECK_EXIST_PROBE;

/// Data byte that must follow GET_DEV_RATE
pub const GET_DEV_RATE_DATA: u8 = 0x07;
/// GET_DEV_RATE answer bit set for low-speed devices
pub const DEV_RATE_LOW_SPEED_BIT: u8 = 0x10;

/// Data byte that must follow SET_RETRY
pub const SET_RETRY_DATA: u8 = 0x25;

/// Largest block the chip buffers
pub const MAX_BLOCK_LEN: usize = 64;

/// Interrupt status codes (host mode)
pub mod status {
    /// Transaction or transfer completed
    pub const USB_INT_SUCCESS: u8 = 0x14;
    /// Device attach detected
    pub const USB_INT_CONNECT: u8 = 0x15;
    /// Device detach detected
    pub const USB_INT_DISCONNECT: u8 = 0x16;
    /// Control transfer overflowed the chip buffer
    pub const USB_INT_BUF_OVER: u8 = 0x17;
    /// Device initialized (address assigned)
    pub const USB_INT_USB_READY: u8 = 0x18;
}

/// Token PIDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Pid {
    /// OUT token
    Out = 0x01,
    /// IN token
    In = 0x09,
    /// SETUP token
    Setup = 0x0D,
}

/// Host operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum UsbMode {
    /// Host enabled, no SOF generation; use while waiting for attach
    HostNoSof = 0x05,
    /// Host enabled, automatic SOF generation
    HostAutoSof = 0x06,
    /// Host enabled, drive bus reset
    HostReset = 0x07,
}

/// Device connect state from TEST_CONNECT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectState {
    /// Nothing attached
    Disconnected,
    /// Attached, not yet addressed
    Connected,
    /// Attached and addressed
    Ready,
}

impl ConnectState {
    /// Decode a TEST_CONNECT answer
    pub fn from_status(status: u8) -> Option<Self> {
        match status {
            status::USB_INT_DISCONNECT => Some(Self::Disconnected),
            status::USB_INT_CONNECT => Some(Self::Connected),
            status::USB_INT_USB_READY => Some(Self::Ready),
            _ => None,
        }
    }

    /// Attached in either form
    pub fn is_attached(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

/// Bus speed of the attached device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbSpeed {
    /// 1.5 Mbit/s
    Low,
    /// 12 Mbit/s
    Full,
}

impl UsbSpeed {
    /// SET_USB_SPEED data byte
    pub const fn set_speed_code(self) -> u8 {
        match self {
            Self::Low => 0x02,
            Self::Full => 0x00,
        }
    }
}

/// NAK retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RetryPolicy {
    /// Return NAK immediately
    None,
    /// Retry NAK for 200ms-2s
    Bounded,
    /// Retry NAK until the device answers
    Infinite,
}

impl RetryPolicy {
    /// SET_RETRY parameter byte
    ///
    /// Bits 7-6 select NAK handling, bits 5-0 the response-timeout retry count.
    pub const fn param(self) -> u8 {
        match self {
            Self::None => 0x05,
            Self::Bounded => 0xC0,
            Self::Infinite => 0x85,
        }
    }
}

/// Decoded token completion status
///
/// Failure codes are `0b001X_YYYY` where `YYYY` is the device's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TokenStatus {
    /// Transaction completed
    Success,
    /// Device detached during the transaction
    Disconnected,
    /// Device answered NAK
    Nak,
    /// Device answered STALL
    Stall,
    /// Device did not answer
    ResponseTimeout,
    /// Any other code
    Other(u8),
}

impl TokenStatus {
    /// Decode a GET_STATUS byte read after a token
    pub fn from_status(status: u8) -> Self {
        match status {
            status::USB_INT_SUCCESS => Self::Success,
            status::USB_INT_DISCONNECT => Self::Disconnected,
            s if s & 0xE0 == 0x20 => match s & 0x0F {
                0x0A => Self::Nak,
                0x0E => Self::Stall,
                low if low & 0x03 == 0 => Self::ResponseTimeout,
                _ => Self::Other(s),
            },
            s => Self::Other(s),
        }
    }
}

impl From<TokenStatus> for HostError {
    fn from(status: TokenStatus) -> Self {
        match status {
            TokenStatus::Disconnected => HostError::Disconnected,
            TokenStatus::Nak => HostError::Nak,
            TokenStatus::Stall => HostError::Stall,
            TokenStatus::ResponseTimeout => HostError::Timeout,
            TokenStatus::Success | TokenStatus::Other(_) => HostError::Protocol,
        }
    }
}

/// ISSUE_TKN_X toggle byte: bit 7 IN toggle, bit 6 OUT toggle
pub const fn token_toggle_byte(toggle: bool) -> u8 {
    if toggle {
        0xC0
    } else {
        0x00
    }
}

/// ISSUE_TKN_X endpoint/PID byte: endpoint in bits 7-4, PID in bits 3-0
pub const fn token_ep_pid_byte(endpoint: u8, pid: Pid) -> u8 {
    ((endpoint & 0x0F) << 4) | (pid as u8 & 0x0F)
}
