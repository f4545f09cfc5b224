//! Command/data framing over the serial channel
//!
//! The CH375 serial interface runs 9-bit words. Bit 8 marks a command byte,
//! data bytes go out with bit 8 clear. Nothing here retries; a failed
//! exchange is reported once and the caller decides what to do.

use crate::error::LinkError;

/// Discriminator bit for command words
pub const COMMAND_BIT: u16 = 0x0100;

/// Frame a command byte
#[inline]
pub const fn frame_command(cmd: u8) -> u16 {
    COMMAND_BIT | cmd as u16
}

/// Frame a data byte
#[inline]
pub const fn frame_data(data: u8) -> u16 {
    data as u16
}

/// Strip the discriminator from a received word
#[inline]
pub const fn unframe(word: u16) -> u8 {
    (word & 0x00FF) as u8
}

/// Check whether a word carries a command
#[inline]
pub const fn is_command(word: u16) -> bool {
    word & COMMAND_BIT != 0
}

/// Raw 9-bit channel to one CH375
///
/// Implementations own whatever peripheral state they need (UART handle,
/// interrupt pin). One instance per physical chip; never shared.
pub trait Transport {
    /// Send one 9-bit word, waiting at most `timeout_ms`
    fn send_word(&mut self, word: u16, timeout_ms: u32) -> Result<(), LinkError>;

    /// Receive one 9-bit word, waiting at most `timeout_ms`
    fn recv_word(&mut self, timeout_ms: u32) -> Result<u16, LinkError>;

    /// Level of the chip's active-low INT# line (`true` when asserted)
    fn interrupt_asserted(&mut self) -> bool;
}

/// Framed command/data link
pub struct ChipLink<T: Transport> {
    transport: T,
    io_timeout_ms: u32,
}

impl<T: Transport> ChipLink<T> {
    /// Wrap a transport
    pub fn new(transport: T, io_timeout_ms: u32) -> Self {
        Self {
            transport,
            io_timeout_ms,
        }
    }

    /// Send a command byte
    pub fn write_command(&mut self, cmd: u8) -> Result<(), LinkError> {
        self.transport.send_word(frame_command(cmd), self.io_timeout_ms)
    }

    /// Send a data byte
    pub fn write_data(&mut self, data: u8) -> Result<(), LinkError> {
        self.transport.send_word(frame_data(data), self.io_timeout_ms)
    }

    /// Receive a data byte
    pub fn read_data(&mut self) -> Result<u8, LinkError> {
        self.transport.recv_word(self.io_timeout_ms).map(unframe)
    }

    /// Sample the interrupt line once
    pub fn poll_interrupt(&mut self) -> bool {
        self.transport.interrupt_asserted()
    }

    /// Per-exchange timeout in use
    pub fn io_timeout_ms(&self) -> u32 {
        self.io_timeout_ms
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}
