//! Control transfers on endpoint 0
//!
//! Three stages: SETUP (DATA0), an optional DATA stage alternating from DATA1
//! in `ep0_max_packet` chunks, and a zero-length STATUS stage in the opposite
//! direction with DATA1.

use embedded_hal::delay::DelayNs;

use super::{DataToggle, Direction, SetupPacket};
use crate::chip::command::{RetryPolicy, MAX_BLOCK_LEN};
use crate::chip::link::Transport;
use crate::error::{HostError, Result};
use crate::host::UsbHost;

/// Run one control transfer
///
/// `data` must hold at least `wLength` bytes. For IN requests it receives the
/// data stage; for OUT requests its first `wLength` bytes are sent. An IN data
/// stage ends early on a short packet. Returns the bytes actually moved.
pub fn control_transfer<T: Transport, D: DelayNs>(
    host: &mut UsbHost<T, D>,
    ep0_max_packet: u8,
    setup: &SetupPacket,
    data: &mut [u8],
) -> Result<usize> {
    let length = setup.wLength as usize;
    let max_packet = ep0_max_packet as usize;
    if length > data.len() || max_packet == 0 || max_packet > MAX_BLOCK_LEN {
        return Err(HostError::InvalidParam);
    }

    // Devices may NAK control stages while busy; let the chip keep retrying
    host.set_retry_policy(RetryPolicy::Infinite)?;

    host.transact_setup(&setup.to_bytes())?;

    let mut toggle = DataToggle::DATA1;
    let mut transferred = 0;

    match setup.direction() {
        Direction::In => {
            while transferred < length {
                let block = host.transact_in(0, toggle.get(), max_packet)?;
                toggle.flip();

                let n = block.len().min(length - transferred);
                data[transferred..transferred + n].copy_from_slice(&block[..n]);
                transferred += n;

                if block.len() < max_packet {
                    break;
                }
            }
            host.transact_out(0, true, &[])?;
        }
        Direction::Out => {
            while transferred < length {
                let n = (length - transferred).min(max_packet);
                host.transact_out(0, toggle.get(), &data[transferred..transferred + n])?;
                toggle.flip();
                transferred += n;
            }
            host.transact_in(0, true, 0)?;
        }
    }

    Ok(transferred)
}

/// Run a control transfer, retrying transient failures
///
/// Makes up to `attempts` tries (at least one). A disconnect or a caller
/// error ends the loop immediately.
pub fn control_transfer_with_retry<T: Transport, D: DelayNs>(
    host: &mut UsbHost<T, D>,
    ep0_max_packet: u8,
    setup: &SetupPacket,
    data: &mut [u8],
    attempts: u8,
) -> Result<usize> {
    let attempts = attempts.max(1);
    let mut last = HostError::Timeout;

    for _attempt in 0..attempts {
        match control_transfer(host, ep0_max_packet, setup, data) {
            Ok(n) => return Ok(n),
            Err(e) if e.is_transient() => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Control request {:#x} attempt {} failed: {}", setup.bRequest, _attempt, e);
                last = e;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last)
}
