//! Upstream-to-downstream report forwarding
//!
//! A [`ReportRelay`] drives one open HID interface: each poll fetches a report
//! and, if one arrived, hands it to the [`ReportSink`] under the relay's slot.

use core::fmt;

use embedded_hal::delay::DelayNs;

use crate::chip::link::Transport;
use crate::composite::ReportSink;
use crate::error::{HidError, HostError};
use crate::hid::device::{HidEndpoint, ReportSlot};
use crate::host::UsbHost;

/// Consecutive transient failures tolerated before the relay gives up
pub const DEFAULT_MAX_FAILURES: u8 = 8;

/// Result of one relay poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayPoll {
    /// A report was fetched and passed to the sink
    Sent,
    /// Device NAK'd: nothing new since the last report
    Idle,
    /// Transient failure, still within the retry budget
    Retrying(HidError),
}

/// Why the relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RelayError<E> {
    /// Fetch failed terminally or ran out of retries
    Hid(HidError),
    /// The downstream stack refused the report
    Sink(E),
}

impl<E: fmt::Debug> fmt::Display for RelayError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hid(e) => write!(f, "Relay fetch failed: {}", e),
            Self::Sink(e) => write!(f, "Report sink failed: {:?}", e),
        }
    }
}

/// Bounded-retry forwarder for one slot
#[derive(Debug, Clone)]
pub struct ReportRelay {
    slot: usize,
    max_failures: u8,
    failures: u8,
}

impl ReportRelay {
    /// Relay into `slot` with the default retry bound
    pub const fn new(slot: usize) -> Self {
        Self {
            slot,
            max_failures: DEFAULT_MAX_FAILURES,
            failures: 0,
        }
    }

    /// Set how many consecutive transient failures are tolerated
    pub fn max_failures(mut self, max: u8) -> Self {
        self.max_failures = max.max(1);
        self
    }

    /// Downstream slot
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Current run of consecutive failures
    pub fn failures(&self) -> u8 {
        self.failures
    }

    /// Fetch once and forward what arrived
    ///
    /// `NoDevice` and non-transient errors end the session immediately; a
    /// transient error ends it once `max_failures` happen back to back.
    pub fn poll<T, D, S>(
        &mut self,
        host: &mut UsbHost<T, D>,
        hid: &mut HidEndpoint,
        sink: &mut S,
    ) -> Result<RelayPoll, RelayError<S::Error>>
    where
        T: Transport,
        D: DelayNs,
        S: ReportSink,
    {
        match hid.fetch_report(host) {
            Ok(()) => {
                self.failures = 0;
                sink.send_report(self.slot, hid.report(ReportSlot::Current))
                    .map_err(RelayError::Sink)?;
                Ok(RelayPoll::Sent)
            }
            Err(HidError::Host(HostError::Nak)) => {
                self.failures = 0;
                Ok(RelayPoll::Idle)
            }
            Err(HidError::Host(e)) if e.is_transient() => {
                self.failures = self.failures.saturating_add(1);

                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "Slot {} fetch failed ({}), {} of {}",
                    self.slot,
                    e,
                    self.failures,
                    self.max_failures
                );

                if self.failures >= self.max_failures {
                    Err(RelayError::Hid(HidError::Host(e)))
                } else {
                    Ok(RelayPoll::Retrying(HidError::Host(e)))
                }
            }
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::error!("Slot {} session ended: {}", self.slot, e);
                Err(RelayError::Hid(e))
            }
        }
    }

    /// Poll until the session ends, returning why it ended
    pub fn run<T, D, S>(&mut self, host: &mut UsbHost<T, D>, hid: &mut HidEndpoint, sink: &mut S) -> RelayError<S::Error>
    where
        T: Transport,
        D: DelayNs,
        S: ReportSink,
    {
        loop {
            if let Err(e) = self.poll(host, hid, sink) {
                return e;
            }
        }
    }
}
