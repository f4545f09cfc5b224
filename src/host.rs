//! USB host session over one CH375
//!
//! [`UsbHost`] owns the chip and exposes the token-level transaction primitive
//! the transfer types are built from: send a token, wait for completion, move
//! one data block. All errors surface as [`HostError`].

use embedded_hal::delay::DelayNs;

use crate::chip::command::{ConnectState, Pid, RetryPolicy, UsbMode};
use crate::chip::link::Transport;
use crate::chip::{Block, Ch375};
use crate::config::{timing, ChipConfig};
use crate::error::{HostError, Result};

/// Host-side handle for a single chip and its downstream port
pub struct UsbHost<T: Transport, D: DelayNs> {
    chip: Ch375<T, D>,
    retry: Option<RetryPolicy>,
}

impl<T: Transport, D: DelayNs> UsbHost<T, D> {
    /// Wrap an existing chip driver
    pub fn new(chip: Ch375<T, D>) -> Self {
        Self { chip, retry: None }
    }

    /// Build chip driver and host in one step
    pub fn with_transport(transport: T, delay: D, config: ChipConfig) -> Self {
        Self::new(Ch375::new(transport, delay, config))
    }

    /// Bring the chip up in host mode
    ///
    /// Waits out the power-up delay, probes the chip and selects host mode
    /// without SOF so attach detection runs while the bus is idle.
    pub fn init(&mut self) -> Result<()> {
        #[cfg(feature = "defmt")]
        defmt::info!("Waiting {} ms for CH375 power-up", timing::POWER_UP_DELAY_MS);
        self.chip.delay_ms(timing::POWER_UP_DELAY_MS);

        self.chip.check_alive()?;

        #[cfg(feature = "defmt")]
        if let Ok(version) = self.chip.get_firmware_version() {
            defmt::info!("CH375 present, firmware {}", version);
        }

        self.chip.set_mode(UsbMode::HostNoSof)?;

        #[cfg(feature = "defmt")]
        defmt::info!("Host mode, auto-detect, no SOF");

        Ok(())
    }

    /// Wait for a device to appear on the port
    ///
    /// Polls the connect state roughly once per millisecond (each query already
    /// includes the chip's 1ms turnaround). On attach, waits the settle delay
    /// so a bouncing low-speed device has time to stabilize.
    pub fn wait_for_connect(&mut self, timeout_ms: u32) -> Result<ConnectState> {
        self.poll_connect(timeout_ms, timing::CONNECT_SETTLE_MS)
    }

    pub(crate) fn poll_connect(&mut self, timeout_ms: u32, settle_ms: u32) -> Result<ConnectState> {
        for _ in 0..=timeout_ms {
            let state = self.chip.test_connect()?;
            if state.is_attached() {
                self.chip.delay_ms(settle_ms);
                return Ok(state);
            }
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("No device after {} ms", timeout_ms);
        Err(HostError::Timeout)
    }

    /// Select the NAK policy for following tokens
    ///
    /// The last policy sent is remembered and not re-sent.
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) -> Result<()> {
        if self.retry != Some(policy) {
            self.chip.set_retry_policy(policy)?;
            self.retry = Some(policy);
        }
        Ok(())
    }

    /// Send a SETUP token carrying an 8-byte request block
    pub fn transact_setup(&mut self, setup: &[u8; 8]) -> Result<()> {
        self.chip.write_block(setup)?;
        self.chip.send_token(0, false, Pid::Setup)?;
        Ok(())
    }

    /// Send an IN token and read what the device returned
    ///
    /// Fails with [`HostError::Protocol`] if the device sent more than
    /// `max_len` bytes.
    pub fn transact_in(&mut self, endpoint: u8, toggle: bool, max_len: usize) -> Result<Block> {
        self.chip.send_token(endpoint, toggle, Pid::In)?;
        Ok(self.chip.read_block(max_len)?)
    }

    /// Load `data` and send an OUT token
    pub fn transact_out(&mut self, endpoint: u8, toggle: bool, data: &[u8]) -> Result<()> {
        self.chip.write_block(data)?;
        self.chip.send_token(endpoint, toggle, Pid::Out)?;
        Ok(())
    }

    /// Block on the chip's delay source
    pub fn delay_ms(&mut self, ms: u32) {
        self.chip.delay_ms(ms);
    }

    /// Borrow the chip driver
    pub fn chip(&self) -> &Ch375<T, D> {
        &self.chip
    }

    /// Mutably borrow the chip driver
    pub fn chip_mut(&mut self) -> &mut Ch375<T, D> {
        &mut self.chip
    }

    /// Forget cached chip state after the device went away
    pub fn reset_session(&mut self) {
        self.retry = None;
    }

    /// Give the chip driver back
    pub fn into_chip(self) -> Ch375<T, D> {
        self.chip
    }
}
