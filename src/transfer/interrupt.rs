//! Interrupt and bulk transfers
//!
//! Both are a single token plus one data block. The chip is told to hand NAKs
//! straight back so an idle endpoint reports [`HostError::Nak`] instead of
//! stalling the caller for the whole token bound.

use embedded_hal::delay::DelayNs;

use super::{DataToggle, Direction, TransferType};
use crate::chip::command::RetryPolicy;
use crate::chip::link::Transport;
use crate::device::UsbEndpoint;
use crate::error::{HostError, Result};
use crate::host::UsbHost;

/// One interrupt transaction
///
/// IN endpoints fill `buffer` and return the received length; OUT endpoints
/// send all of `buffer`. `toggle` advances only on success. A disconnect seen
/// by the chip comes back as [`HostError::Disconnected`].
pub fn interrupt_transfer<T: Transport, D: DelayNs>(
    host: &mut UsbHost<T, D>,
    endpoint: &UsbEndpoint,
    toggle: &mut DataToggle,
    buffer: &mut [u8],
) -> Result<usize> {
    if endpoint.transfer_type != TransferType::Interrupt {
        return Err(HostError::InvalidParam);
    }
    single_packet(host, endpoint, toggle, buffer)
}

/// One bulk transaction
///
/// Identical on the wire to [`interrupt_transfer`].
pub fn bulk_transfer<T: Transport, D: DelayNs>(
    host: &mut UsbHost<T, D>,
    endpoint: &UsbEndpoint,
    toggle: &mut DataToggle,
    buffer: &mut [u8],
) -> Result<usize> {
    if endpoint.transfer_type != TransferType::Bulk {
        return Err(HostError::InvalidParam);
    }
    single_packet(host, endpoint, toggle, buffer)
}

fn single_packet<T: Transport, D: DelayNs>(
    host: &mut UsbHost<T, D>,
    endpoint: &UsbEndpoint,
    toggle: &mut DataToggle,
    buffer: &mut [u8],
) -> Result<usize> {
    let max_packet = endpoint.max_packet_size as usize;

    host.set_retry_policy(RetryPolicy::None)?;

    let len = match endpoint.direction {
        Direction::In => {
            let block = host.transact_in(endpoint.number, toggle.get(), buffer.len().min(max_packet))?;
            buffer[..block.len()].copy_from_slice(&block);
            block.len()
        }
        Direction::Out => {
            if buffer.len() > max_packet {
                return Err(HostError::InvalidParam);
            }
            host.transact_out(endpoint.number, toggle.get(), buffer)?;
            buffer.len()
        }
    };

    toggle.flip();
    Ok(len)
}
