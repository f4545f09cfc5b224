//! Timing constants and runtime configuration
//!
//! Defaults match what CH375 modules and common low-speed HID devices need in
//! practice. Every value can be overridden through the builder-style setters.

/// Hardware timing constants
pub mod timing {
    /// Per-byte transport exchange timeout
    pub const IO_TIMEOUT_MS: u32 = 500;
    /// Upper bound on waiting for a token to complete (NAK retry is unbounded on chip)
    pub const TOKEN_TIMEOUT_MS: u32 = 10_000;
    /// Chip needs this long after power-up before it answers commands
    pub const POWER_UP_DELAY_MS: u32 = 50;
    /// Mode changes complete within 20us; wait a full tick before reading the ack
    pub const MODE_SWITCH_DELAY_MS: u32 = 1;
    /// Bus reset hold time
    pub const RESET_HOLD_MS: u32 = 15;
    /// How long to wait for the device to come back after reset
    pub const RECONNECT_TIMEOUT_MS: u32 = 1_000;
    /// Low-speed devices bounce for a while after attach
    pub const CONNECT_SETTLE_MS: u32 = 250;
    /// Settle time after re-applying the device speed
    pub const SPEED_SETTLE_MS: u32 = 50;
    /// Recovery interval after SET_ADDRESS (USB 2.0 9.2.6.3)
    pub const SET_ADDRESS_RECOVERY_MS: u32 = 2;
}

/// CH375 link configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipConfig {
    /// Timeout handed to the transport for each framed exchange
    pub io_timeout_ms: u32,
    /// Bound on the interrupt wait after issuing a token
    pub token_timeout_ms: u32,
}

impl ChipConfig {
    /// Configuration with default timings
    pub const fn new() -> Self {
        Self {
            io_timeout_ms: timing::IO_TIMEOUT_MS,
            token_timeout_ms: timing::TOKEN_TIMEOUT_MS,
        }
    }

    /// Set per-exchange transport timeout
    pub fn io_timeout_ms(mut self, ms: u32) -> Self {
        self.io_timeout_ms = ms;
        self
    }

    /// Set token completion bound
    pub fn token_timeout_ms(mut self, ms: u32) -> Self {
        self.token_timeout_ms = ms;
        self
    }
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Enumeration timing and addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnumerationConfig {
    /// Bus reset hold time
    pub reset_hold_ms: u32,
    /// Bound on waiting for reconnect after reset
    pub reconnect_timeout_ms: u32,
    /// Stabilization delay once the device reports connected
    pub settle_ms: u32,
    /// Delay after re-applying device speed
    pub speed_settle_ms: u32,
    /// Address assigned with SET_ADDRESS (1-127)
    pub device_address: u8,
    /// Attempts per descriptor request
    pub descriptor_retries: u8,
}

impl EnumerationConfig {
    /// Configuration with default timings and address 1
    pub const fn new() -> Self {
        Self {
            reset_hold_ms: timing::RESET_HOLD_MS,
            reconnect_timeout_ms: timing::RECONNECT_TIMEOUT_MS,
            settle_ms: timing::CONNECT_SETTLE_MS,
            speed_settle_ms: timing::SPEED_SETTLE_MS,
            device_address: 1,
            descriptor_retries: 3,
        }
    }

    /// Set reset hold time
    pub fn reset_hold_ms(mut self, ms: u32) -> Self {
        self.reset_hold_ms = ms;
        self
    }

    /// Set reconnect wait bound
    pub fn reconnect_timeout_ms(mut self, ms: u32) -> Self {
        self.reconnect_timeout_ms = ms;
        self
    }

    /// Set post-connect stabilization delay
    pub fn settle_ms(mut self, ms: u32) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Set post-speed stabilization delay
    pub fn speed_settle_ms(mut self, ms: u32) -> Self {
        self.speed_settle_ms = ms;
        self
    }

    /// Set the address given to the device
    pub fn device_address(mut self, address: u8) -> Self {
        self.device_address = address;
        self
    }

    /// Set attempts per descriptor request
    pub fn descriptor_retries(mut self, retries: u8) -> Self {
        self.descriptor_retries = retries;
        self
    }
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self::new()
    }
}
