#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! USB host driver for the WCH CH375 serial host controller
//!
//! The CH375 does the USB signalling itself and is driven over a 9-bit serial
//! link. This crate sits on top of that link and turns an upstream mouse or
//! keyboard into decoded HID reports that can be republished through a
//! composite HID device on the downstream side.
//!
//! # Layers
//!
//! - [`chip`] - command framing ([`chip::link`]) and the CH375 command set
//! - [`host`] - token transactions on one chip
//! - [`transfer`] - control, interrupt and bulk transfers built from tokens
//! - [`enumeration`] - reset, addressing and descriptor walk
//! - [`hid`] - report descriptor parsing, field decoding, double-buffered reports
//! - [`composite`] - downstream configuration descriptor synthesis
//! - [`relay`] - forwarding fetched reports to the downstream stack
//! - [`error`] - per-layer error types
//!
//! # Bring-up
//!
//! ```no_run
//! # use ch375_hidbridge::chip::link::Transport;
//! # fn run<T: Transport, D: embedded_hal::delay::DelayNs>(uart: T, delay: D) -> Result<(), ch375_hidbridge::HostError> {
//! use ch375_hidbridge::{ChipConfig, Enumerator, UsbHost};
//!
//! let mut host = UsbHost::with_transport(uart, delay, ChipConfig::default());
//! host.init()?;
//! host.wait_for_connect(5_000)?;
//!
//! let device = Enumerator::default().enumerate(&mut host)?;
//! # let _ = device;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "defmt")]
use defmt as _;

pub mod chip;
pub mod composite;
pub mod config;
pub mod device;
pub mod enumeration;
pub mod error;
pub mod hid;
pub mod host;
pub mod relay;
pub mod transfer;

pub use chip::command::{ConnectState, RetryPolicy, UsbMode, UsbSpeed};
pub use chip::link::{ChipLink, Transport};
pub use chip::Ch375;
pub use composite::{CompositeRegistry, ReportSink};
pub use config::{ChipConfig, EnumerationConfig};
pub use device::{ConnectionState, UsbDevice, UsbEndpoint, UsbInterface};
pub use enumeration::{EnumerationState, Enumerator};
pub use error::{ChipError, CompositeError, HidError, HostError, LinkError, Result};
pub use hid::{HidEndpoint, HidKind, KeyboardReport, MouseReport, ReportSlot};
pub use host::UsbHost;
pub use relay::{RelayError, RelayPoll, ReportRelay};
pub use transfer::{DataToggle, Direction, SetupPacket, TransferType};
