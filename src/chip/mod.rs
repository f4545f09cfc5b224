//! CH375 command layer
//!
//! [`Ch375`] turns the raw command set into typed operations. Every method is
//! one complete command exchange; commands that read back a response do so
//! before returning, so the chip is never left mid-command on success.

pub mod command;
pub mod link;

use embedded_hal::delay::DelayNs;

use crate::config::{timing, ChipConfig};
use crate::error::ChipError;

use command::{
    cmd, status, ConnectState, Pid, RetryPolicy, UsbMode, UsbSpeed,
    CHECK_EXIST_ANSWER, CHECK_EXIST_PROBE, CMD_RET_SUCCESS, DEV_RATE_LOW_SPEED_BIT,
    GET_DEV_RATE_DATA, MAX_BLOCK_LEN, SET_RETRY_DATA,
};
use link::{ChipLink, Transport};

/// One block read out of the chip buffer
pub type Block = heapless::Vec<u8, MAX_BLOCK_LEN>;

/// Command-level driver for a single CH375
pub struct Ch375<T: Transport, D: DelayNs> {
    link: ChipLink<T>,
    delay: D,
    config: ChipConfig,
}

impl<T: Transport, D: DelayNs> Ch375<T, D> {
    /// Bind a transport and delay source
    pub fn new(transport: T, delay: D, config: ChipConfig) -> Self {
        Self {
            link: ChipLink::new(transport, config.io_timeout_ms),
            delay,
            config,
        }
    }

    /// Verify the chip answers the echo probe
    pub fn check_alive(&mut self) -> Result<(), ChipError> {
        self.link.write_command(cmd::CHECK_EXIST)?;
        self.link.write_data(CHECK_EXIST_PROBE)?;
        let answer = self.link.read_data()?;

        if answer != CHECK_EXIST_ANSWER {
            #[cfg(feature = "defmt")]
            defmt::warn!("CH375 probe answered {:#x}", answer);
            return Err(ChipError::NotPresent);
        }
        Ok(())
    }

    /// Firmware version (low 6 bits of GET_IC_VER)
    pub fn get_firmware_version(&mut self) -> Result<u8, ChipError> {
        self.link.write_command(cmd::GET_IC_VER)?;
        Ok(self.link.read_data()? & 0x3F)
    }

    /// Switch operating mode and check the acknowledgement
    pub fn set_mode(&mut self, mode: UsbMode) -> Result<(), ChipError> {
        self.link.write_command(cmd::SET_USB_MODE)?;
        self.link.write_data(mode as u8)?;
        self.delay.delay_ms(timing::MODE_SWITCH_DELAY_MS);

        let ack = self.link.read_data()?;
        if ack != CMD_RET_SUCCESS {
            #[cfg(feature = "defmt")]
            defmt::error!("SET_USB_MODE {} rejected: {:#x}", mode, ack);
            return Err(ChipError::ModeRejected(ack));
        }
        Ok(())
    }

    /// Query the device connect state
    ///
    /// A disconnect also latches an interrupt status; it is read back here so
    /// the next token does not see a stale event.
    pub fn test_connect(&mut self) -> Result<ConnectState, ChipError> {
        self.link.write_command(cmd::TEST_CONNECT)?;
        self.delay.delay_ms(timing::MODE_SWITCH_DELAY_MS);

        let raw = self.link.read_data()?;
        let state = ConnectState::from_status(raw).ok_or(ChipError::UnexpectedResponse(raw))?;

        if state == ConnectState::Disconnected {
            self.get_status()?;
        }
        Ok(state)
    }

    /// Speed of the attached device
    pub fn get_device_speed(&mut self) -> Result<UsbSpeed, ChipError> {
        self.link.write_command(cmd::GET_DEV_RATE)?;
        self.link.write_data(GET_DEV_RATE_DATA)?;
        let rate = self.link.read_data()?;

        if rate & DEV_RATE_LOW_SPEED_BIT != 0 {
            Ok(UsbSpeed::Low)
        } else {
            Ok(UsbSpeed::Full)
        }
    }

    /// Tell the chip which speed to signal at
    pub fn set_device_speed(&mut self, speed: UsbSpeed) -> Result<(), ChipError> {
        self.link.write_command(cmd::SET_USB_SPEED)?;
        self.link.write_data(speed.set_speed_code())?;
        Ok(())
    }

    /// Configure how the chip handles NAK answers
    pub fn set_retry_policy(&mut self, policy: RetryPolicy) -> Result<(), ChipError> {
        self.link.write_command(cmd::SET_RETRY)?;
        self.link.write_data(SET_RETRY_DATA)?;
        self.link.write_data(policy.param())?;
        Ok(())
    }

    /// Set the device address used in subsequent tokens
    pub fn set_usb_address(&mut self, address: u8) -> Result<(), ChipError> {
        if address > 127 {
            return Err(ChipError::InvalidParam);
        }
        self.link.write_command(cmd::SET_USB_ADDR)?;
        self.link.write_data(address)?;
        Ok(())
    }

    /// Read and clear the interrupt status
    pub fn get_status(&mut self) -> Result<u8, ChipError> {
        self.link.write_command(cmd::GET_STATUS)?;
        Ok(self.link.read_data()?)
    }

    /// Stop a NAK retry loop in progress
    pub fn abort_nak(&mut self) -> Result<(), ChipError> {
        self.link.write_command(cmd::ABORT_NAK)?;
        Ok(())
    }

    /// Read the endpoint buffer
    ///
    /// The whole buffer is always drained so the chip stays in step; if it holds
    /// more than `max_len` bytes the read fails with [`ChipError::Overflow`].
    pub fn read_block(&mut self, max_len: usize) -> Result<Block, ChipError> {
        self.link.write_command(cmd::RD_USB_DATA)?;
        let len = self.link.read_data()? as usize;
        if len > MAX_BLOCK_LEN {
            return Err(ChipError::UnexpectedResponse(len as u8));
        }

        let mut block = Block::new();
        for _ in 0..len {
            let byte = self.link.read_data()?;
            // len <= capacity, push cannot fail
            let _ = block.push(byte);
        }

        if len > max_len {
            #[cfg(feature = "defmt")]
            defmt::warn!("Chip returned {} bytes, expected at most {}", len, max_len);
            return Err(ChipError::Overflow);
        }
        Ok(block)
    }

    /// Load the transmit buffer
    pub fn write_block(&mut self, data: &[u8]) -> Result<(), ChipError> {
        if data.len() > MAX_BLOCK_LEN {
            return Err(ChipError::InvalidParam);
        }

        self.link.write_command(cmd::WR_USB_DATA7)?;
        self.link.write_data(data.len() as u8)?;
        for &byte in data {
            self.link.write_data(byte)?;
        }
        Ok(())
    }

    /// Issue a token and wait for it to complete
    ///
    /// Waits at most the configured token bound for the interrupt line, then
    /// reads the status. Anything but success becomes
    /// [`ChipError::TransactionFailed`] carrying the raw code.
    pub fn send_token(&mut self, endpoint: u8, toggle: bool, pid: Pid) -> Result<(), ChipError> {
        if endpoint > 0x0F {
            return Err(ChipError::InvalidParam);
        }

        self.link.write_command(cmd::ISSUE_TKN_X)?;
        self.link.write_data(command::token_toggle_byte(toggle))?;
        self.link.write_data(command::token_ep_pid_byte(endpoint, pid))?;

        self.wait_interrupt(self.config.token_timeout_ms)?;

        let code = self.get_status()?;
        if code != status::USB_INT_SUCCESS {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "Token {} ep{} failed: {:#x} ({})",
                pid,
                endpoint,
                code,
                command::TokenStatus::from_status(code)
            );
            return Err(ChipError::TransactionFailed(code));
        }
        Ok(())
    }

    /// Poll the interrupt line once per millisecond until it asserts
    pub fn wait_interrupt(&mut self, timeout_ms: u32) -> Result<(), ChipError> {
        let mut waited = 0;
        loop {
            if self.link.poll_interrupt() {
                return Ok(());
            }
            if waited >= timeout_ms {
                #[cfg(feature = "defmt")]
                defmt::warn!("No interrupt after {} ms", timeout_ms);
                return Err(ChipError::Timeout);
            }
            self.delay.delay_ms(1);
            waited += 1;
        }
    }

    /// Block for `ms` milliseconds on the chip's delay source
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Active configuration
    pub fn config(&self) -> &ChipConfig {
        &self.config
    }

    /// Borrow the link
    pub fn link(&self) -> &ChipLink<T> {
        &self.link
    }

    /// Mutably borrow the link
    pub fn link_mut(&mut self) -> &mut ChipLink<T> {
        &mut self.link
    }

    /// Borrow the delay source
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Release transport and delay
    pub fn release(self) -> (T, D) {
        (self.link.into_inner(), self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;
    use link::{frame_command, frame_data};

    /// Replays a fixed reply script and records everything sent
    struct Scripted {
        sent: heapless::Vec<u16, 96>,
        replies: heapless::Deque<u8, 96>,
        irq: bool,
    }

    impl Scripted {
        fn new(replies: &[u8]) -> Self {
            let mut q = heapless::Deque::new();
            for &r in replies {
                q.push_back(r).unwrap();
            }
            Self { sent: heapless::Vec::new(), replies: q, irq: false }
        }
    }

    impl Transport for Scripted {
        fn send_word(&mut self, word: u16, _timeout_ms: u32) -> Result<(), LinkError> {
            self.sent.push(word).map_err(|_| LinkError::Transport)
        }

        fn recv_word(&mut self, _timeout_ms: u32) -> Result<u16, LinkError> {
            self.replies.pop_front().map(u16::from).ok_or(LinkError::Timeout)
        }

        fn interrupt_asserted(&mut self) -> bool {
            self.irq
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_ms: u32,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ms += ns / 1_000_000;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += ms;
        }
    }

    fn chip(replies: &[u8]) -> Ch375<Scripted, CountingDelay> {
        Ch375::new(Scripted::new(replies), CountingDelay::default(), ChipConfig::default())
    }

    #[test]
    fn test_check_alive() {
        let mut c = chip(&[0x9A]);
        assert_eq!(c.check_alive(), Ok(()));
        assert_eq!(&c.link().transport().sent[..], &[frame_command(0x06), frame_data(0x65)]);

        // Floating bus echoes the probe back
        let mut c = chip(&[0x65]);
        assert_eq!(c.check_alive(), Err(ChipError::NotPresent));
    }

    #[test]
    fn test_version_masks_high_bits() {
        let mut c = chip(&[0xC3]);
        assert_eq!(c.get_firmware_version(), Ok(0x03));
    }

    #[test]
    fn test_set_mode_ack() {
        let mut c = chip(&[0x51]);
        assert_eq!(c.set_mode(UsbMode::HostAutoSof), Ok(()));
        assert_eq!(c.delay().total_ms, 1);

        let mut c = chip(&[0x5F]);
        assert_eq!(c.set_mode(UsbMode::HostReset), Err(ChipError::ModeRejected(0x5F)));
    }

    #[test]
    fn test_connect_states() {
        let mut c = chip(&[0x15]);
        assert_eq!(c.test_connect(), Ok(ConnectState::Connected));

        // Disconnect drains the latched status
        let mut c = chip(&[0x16, 0x16]);
        assert_eq!(c.test_connect(), Ok(ConnectState::Disconnected));
        assert_eq!(c.link().transport().sent.last(), Some(&frame_command(cmd::GET_STATUS)));

        let mut c = chip(&[0x42]);
        assert_eq!(c.test_connect(), Err(ChipError::UnexpectedResponse(0x42)));
    }

    #[test]
    fn test_device_speed() {
        let mut c = chip(&[0x10]);
        assert_eq!(c.get_device_speed(), Ok(UsbSpeed::Low));
        let mut c = chip(&[0x00]);
        assert_eq!(c.get_device_speed(), Ok(UsbSpeed::Full));
        assert_eq!(&c.link().transport().sent[..], &[frame_command(0x0A), frame_data(0x07)]);
    }

    #[test]
    fn test_retry_policy_bytes() {
        let mut c = chip(&[]);
        c.set_retry_policy(RetryPolicy::Infinite).unwrap();
        assert_eq!(
            &c.link().transport().sent[..],
            &[frame_command(0x0B), frame_data(0x25), frame_data(0x85)]
        );
    }

    #[test]
    fn test_read_block() {
        let mut c = chip(&[3, 0xAA, 0xBB, 0xCC]);
        let block = c.read_block(8).unwrap();
        assert_eq!(&block[..], &[0xAA, 0xBB, 0xCC]);

        let mut c = chip(&[4, 1, 2, 3, 4]);
        assert_eq!(c.read_block(2), Err(ChipError::Overflow));
        // All four bytes consumed
        assert!(c.link().transport().replies.is_empty());

        let mut c = chip(&[65]);
        assert_eq!(c.read_block(64), Err(ChipError::UnexpectedResponse(65)));
    }

    #[test]
    fn test_write_block_limits() {
        let mut c = chip(&[]);
        assert_eq!(c.write_block(&[0u8; 65]), Err(ChipError::InvalidParam));
        assert!(c.link().transport().sent.is_empty());

        c.write_block(&[0x11, 0x22]).unwrap();
        assert_eq!(
            &c.link().transport().sent[..],
            &[frame_command(0x2B), frame_data(2), frame_data(0x11), frame_data(0x22)]
        );
    }

    #[test]
    fn test_send_token_success_and_failure() {
        let mut c = chip(&[0x14]);
        c.link_mut().transport_mut().irq = true;
        assert_eq!(c.send_token(1, true, Pid::In), Ok(()));
        assert_eq!(
            &c.link().transport().sent[..3],
            &[frame_command(0x4E), frame_data(0xC0), frame_data(0x19)]
        );

        let mut c = chip(&[0x2E]);
        c.link_mut().transport_mut().irq = true;
        assert_eq!(c.send_token(0, false, Pid::Setup), Err(ChipError::TransactionFailed(0x2E)));
    }

    #[test]
    fn test_send_token_times_out() {
        let cfg = ChipConfig::new().token_timeout_ms(20);
        let mut c = Ch375::new(Scripted::new(&[]), CountingDelay::default(), cfg);
        assert_eq!(c.send_token(1, false, Pid::In), Err(ChipError::Timeout));
        assert_eq!(c.delay().total_ms, 20);
    }
}
