//! HID class support
//!
//! Opening a HID interface reads its report descriptor, decides whether it is
//! a mouse or a keyboard and binds the interrupt IN endpoint. Reports are then
//! fetched into a two-slot buffer and decoded through fixed per-class field
//! tables.
//!
//! ```no_run
//! # use ch375_hidbridge::{UsbHost, UsbDevice, HidError};
//! # use ch375_hidbridge::chip::link::Transport;
//! # fn run<T: Transport, D: embedded_hal::delay::DelayNs>(
//! #     host: &mut UsbHost<T, D>,
//! #     device: &UsbDevice,
//! # ) -> Result<(), HidError> {
//! use ch375_hidbridge::hid::{HidEndpoint, MouseReport, ReportSlot};
//!
//! let mut mouse = HidEndpoint::open(host, device, 0)?;
//! mouse.fetch_report(host)?;
//! let now = MouseReport::from_endpoint(&mouse, ReportSlot::Current)?;
//! let last = MouseReport::from_endpoint(&mouse, ReportSlot::Last)?;
//! if now.pressed_since(&last).left() {
//!     // left click
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Reference
//!
//! - USB HID Specification 1.11: <https://www.usb.org/document-library/device-class-definition-hid-111>
//! - HID Usage Tables: <https://usb.org/document-library/hid-usage-tables-15>

pub mod constants;
pub mod device;
pub mod field;
pub mod item;
pub mod keyboard;
pub mod mouse;

pub use constants::{HidDescriptorType, HidReportType, HidRequest, HID_CLASS};
pub use device::{HidEndpoint, ReportSlot};
pub use field::{decode_field, HidFieldDescriptor};
pub use item::{classify, next_item, validate_mouse, HidKind, Item, ItemReader, ItemType};
pub use keyboard::{KeyCode, KeyModifiers, KeyboardLeds, KeyboardReport};
pub use mouse::{MouseButtons, MouseReport};
