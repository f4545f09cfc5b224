//! Simulated CH375 with a USB device behind it
//!
//! [`FakeCh375`] implements [`Transport`] by decoding the 9-bit command
//! stream the driver sends and answering the way the chip does. Tokens are
//! routed to a [`FakeDevice`] that serves descriptors from a table, accepts
//! standard and HID class requests, and hands out interrupt reports from a
//! queue (NAK when the queue is empty).

use std::collections::VecDeque;

use ch375_hidbridge::chip::command::{cmd, status};
use ch375_hidbridge::chip::link::{is_command, unframe, Transport};
use ch375_hidbridge::LinkError;
use embedded_hal::delay::DelayNs;

const PID_OUT: u8 = 0x01;
const PID_IN: u8 = 0x09;
const PID_SETUP: u8 = 0x0D;

/// Token status for a NAK answer
pub const STATUS_NAK: u8 = 0x2A;
/// Token status for a STALL answer
pub const STATUS_STALL: u8 = 0x2E;

/// One token as the chip saw it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub endpoint: u8,
    pub pid: u8,
    pub toggle: bool,
}

/// Device side of the bus
#[derive(Debug, Default)]
pub struct FakeDevice {
    /// `(descriptor type, index, bytes)`; report descriptors are keyed by interface
    pub descriptors: Vec<(u8, u16, Vec<u8>)>,
    /// Interrupt IN reports, popped one per IN token
    pub reports: VecDeque<Vec<u8>>,
    /// Address from SET_ADDRESS
    pub address: u8,
    /// Value from SET_CONFIGURATION
    pub configuration: u8,
    /// SET_IDLE requests received
    pub idle_requests: usize,
    /// STALL every SET_IDLE
    pub stall_set_idle: bool,
    /// Output report payloads from SET_REPORT
    pub output_reports: Vec<Vec<u8>>,
    /// Every setup block received
    pub setups: Vec<[u8; 8]>,

    control_in: Vec<u8>,
    control_pos: usize,
    control_out_request: Option<u8>,
}

impl FakeDevice {
    fn ep0_max_packet(&self) -> usize {
        self.descriptor(0x01, 0)
            .and_then(|d| d.get(7).copied())
            .map(usize::from)
            .unwrap_or(8)
    }

    fn descriptor(&self, kind: u8, index: u16) -> Option<&[u8]> {
        self.descriptors
            .iter()
            .find(|(k, i, _)| *k == kind && *i == index)
            .map(|(_, _, d)| d.as_slice())
    }

    fn setup(&mut self, block: &[u8]) -> u8 {
        let Ok(setup) = <[u8; 8]>::try_from(block) else {
            return status::USB_INT_BUF_OVER;
        };
        self.setups.push(setup);

        let request_type = setup[0];
        let request = setup[1];
        let value = u16::from_le_bytes([setup[2], setup[3]]);
        let index = u16::from_le_bytes([setup[4], setup[5]]);
        let length = u16::from_le_bytes([setup[6], setup[7]]) as usize;

        self.control_in.clear();
        self.control_pos = 0;
        self.control_out_request = None;

        match (request_type, request) {
            // GET_DESCRIPTOR, standard device or interface recipient
            (0x80 | 0x81, 0x06) => {
                let kind = (value >> 8) as u8;
                let key = if kind == 0x22 { index } else { value & 0xFF };
                match self.descriptor(kind, key) {
                    Some(d) => {
                        let n = d.len().min(length);
                        self.control_in = d[..n].to_vec();
                    }
                    None => return STATUS_STALL,
                }
            }
            (0x00, 0x05) => self.address = value as u8,
            (0x00, 0x09) => self.configuration = value as u8,
            (0x21, 0x0A) => {
                self.idle_requests += 1;
                if self.stall_set_idle {
                    return STATUS_STALL;
                }
            }
            (0x21, 0x09) => self.control_out_request = Some(request),
            _ => return STATUS_STALL,
        }
        status::USB_INT_SUCCESS
    }

    fn control_in_packet(&mut self) -> Vec<u8> {
        let end = (self.control_pos + self.ep0_max_packet()).min(self.control_in.len());
        let packet = self.control_in[self.control_pos..end].to_vec();
        self.control_pos = end;
        packet
    }
}

/// CH375 model
#[derive(Debug)]
pub struct FakeCh375 {
    /// Answer the probe; when false the byte is echoed back unchanged
    pub present: bool,
    /// GET_IC_VER answer
    pub version: u8,
    /// Report a low-speed device
    pub low_speed: bool,
    /// TEST_CONNECT answers, used before `connect_default`
    pub connect_script: VecDeque<u8>,
    /// TEST_CONNECT answer once the script is spent
    pub connect_default: u8,
    /// Device pulled: tokens fail with the disconnect status
    pub unplugged: bool,
    /// Every send fails
    pub broken: bool,
    /// Tokens never raise the interrupt line
    pub silent: bool,
    /// SET_USB_MODE value answered with a failure ack
    pub rejected_mode: Option<u8>,
    /// The device behind the chip
    pub device: FakeDevice,

    /// SET_USB_MODE values in order
    pub modes: Vec<u8>,
    /// SET_RETRY parameter bytes in order
    pub retry_params: Vec<u8>,
    /// SET_USB_ADDR values in order
    pub chip_addresses: Vec<u8>,
    /// SET_USB_SPEED values in order
    pub speeds: Vec<u8>,
    /// Tokens issued
    pub tokens: Vec<Token>,
    /// Blocks loaded with WR_USB_DATA7
    pub written_blocks: Vec<Vec<u8>>,

    command: Option<u8>,
    args: Vec<u8>,
    replies: VecDeque<u8>,
    irq: bool,
    status: u8,
    rx: Vec<u8>,
    tx: Vec<u8>,
}

impl FakeCh375 {
    /// Chip with `device` attached at full speed
    pub fn new(device: FakeDevice) -> Self {
        Self {
            present: true,
            version: 0x42,
            low_speed: false,
            connect_script: VecDeque::new(),
            connect_default: status::USB_INT_CONNECT,
            unplugged: false,
            broken: false,
            silent: false,
            rejected_mode: None,
            device,
            modes: Vec::new(),
            retry_params: Vec::new(),
            chip_addresses: Vec::new(),
            speeds: Vec::new(),
            tokens: Vec::new(),
            written_blocks: Vec::new(),
            command: None,
            args: Vec::new(),
            replies: VecDeque::new(),
            irq: false,
            status: status::USB_INT_DISCONNECT,
            rx: Vec::new(),
            tx: Vec::new(),
        }
    }

    /// Chip with nothing attached
    pub fn empty() -> Self {
        let mut chip = Self::new(FakeDevice::default());
        chip.connect_default = status::USB_INT_DISCONNECT;
        chip
    }

    fn start_command(&mut self, command: u8) {
        self.command = Some(command);
        self.args.clear();

        match command {
            cmd::GET_IC_VER => self.replies.push_back(0x40 | self.version),
            cmd::TEST_CONNECT => {
                let answer = if self.unplugged {
                    status::USB_INT_DISCONNECT
                } else {
                    self.connect_script.pop_front().unwrap_or(self.connect_default)
                };
                if answer == status::USB_INT_DISCONNECT {
                    self.status = status::USB_INT_DISCONNECT;
                }
                self.replies.push_back(answer);
            }
            cmd::GET_STATUS => {
                self.replies.push_back(self.status);
                self.irq = false;
            }
            cmd::RD_USB_DATA => {
                self.replies.push_back(self.rx.len() as u8);
                let data = std::mem::take(&mut self.rx);
                self.replies.extend(data);
            }
            _ => {}
        }
    }

    fn data(&mut self, byte: u8) {
        let Some(command) = self.command else { return };
        self.args.push(byte);

        let complete = match command {
            cmd::SET_RETRY | cmd::ISSUE_TKN_X => self.args.len() == 2,
            cmd::WR_USB_DATA7 => self.args.len() == 1 + self.args[0] as usize,
            _ => true,
        };
        if !complete {
            return;
        }

        let args = std::mem::take(&mut self.args);
        match command {
            cmd::CHECK_EXIST => {
                let answer = if self.present { !args[0] } else { args[0] };
                self.replies.push_back(answer);
            }
            cmd::SET_USB_MODE => {
                self.modes.push(args[0]);
                let ack = if self.rejected_mode == Some(args[0]) { 0x5F } else { 0x51 };
                self.replies.push_back(ack);
            }
            cmd::GET_DEV_RATE => self.replies.push_back(if self.low_speed { 0x10 } else { 0x00 }),
            cmd::SET_USB_SPEED => self.speeds.push(args[0]),
            cmd::SET_RETRY => self.retry_params.push(args[1]),
            cmd::SET_USB_ADDR => self.chip_addresses.push(args[0]),
            cmd::WR_USB_DATA7 => {
                self.tx = args[1..].to_vec();
                self.written_blocks.push(self.tx.clone());
            }
            cmd::ISSUE_TKN_X => self.token(args[0] != 0, args[1] >> 4, args[1] & 0x0F),
            _ => {}
        }
        self.command = None;
    }

    fn token(&mut self, toggle: bool, endpoint: u8, pid: u8) {
        self.tokens.push(Token { endpoint, pid, toggle });
        if self.silent {
            return;
        }
        self.irq = true;

        if self.unplugged {
            self.status = status::USB_INT_DISCONNECT;
            return;
        }

        let tx = std::mem::take(&mut self.tx);
        self.status = match (endpoint, pid) {
            (0, PID_SETUP) => self.device.setup(&tx),
            (0, PID_IN) => {
                self.rx = self.device.control_in_packet();
                status::USB_INT_SUCCESS
            }
            (0, PID_OUT) => {
                if !tx.is_empty() && self.device.control_out_request.take().is_some() {
                    self.device.output_reports.push(tx);
                }
                status::USB_INT_SUCCESS
            }
            (_, PID_IN) => match self.device.reports.pop_front() {
                Some(report) => {
                    self.rx = report;
                    status::USB_INT_SUCCESS
                }
                None => STATUS_NAK,
            },
            _ => STATUS_STALL,
        };
    }
}

impl Transport for FakeCh375 {
    fn send_word(&mut self, word: u16, _timeout_ms: u32) -> Result<(), LinkError> {
        if self.broken {
            return Err(LinkError::Transport);
        }
        if is_command(word) {
            self.start_command(unframe(word));
        } else {
            self.data(unframe(word));
        }
        Ok(())
    }

    fn recv_word(&mut self, _timeout_ms: u32) -> Result<u16, LinkError> {
        self.replies.pop_front().map(u16::from).ok_or(LinkError::Timeout)
    }

    fn interrupt_asserted(&mut self) -> bool {
        self.irq
    }
}

/// Delay source that only adds up what it was asked to wait
#[derive(Debug, Default)]
pub struct RecordingDelay {
    total_ns: u64,
}

impl RecordingDelay {
    /// Milliseconds waited so far
    pub fn elapsed_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns += u64::from(us) * 1_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}
