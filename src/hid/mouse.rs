//! Mouse report view

use bitflags::bitflags;

use super::device::{HidEndpoint, ReportSlot};
use super::field::{decode_field, MOUSE_BUTTONS, MOUSE_WHEEL, MOUSE_X, MOUSE_Y};
use super::item::HidKind;
use crate::error::HidError;

bitflags! {
    /// Mouse buttons, bit n is button n+1
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MouseButtons: u16 {
        const LEFT     = 1 << 0;
        const RIGHT    = 1 << 1;
        /// Middle button / wheel click
        const MIDDLE   = 1 << 2;
        /// Side button (back)
        const BUTTON_4 = 1 << 3;
        /// Side button (forward)
        const BUTTON_5 = 1 << 4;
    }
}

impl MouseButtons {
    /// Left button held
    pub fn left(&self) -> bool {
        self.contains(Self::LEFT)
    }

    /// Right button held
    pub fn right(&self) -> bool {
        self.contains(Self::RIGHT)
    }

    /// Middle button held
    pub fn middle(&self) -> bool {
        self.contains(Self::MIDDLE)
    }

    /// Number of buttons held
    pub fn count(&self) -> u32 {
        self.bits().count_ones()
    }
}

/// Decoded mouse report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MouseReport {
    /// Button states (up to 16)
    pub buttons: MouseButtons,
    /// X displacement
    pub x: i16,
    /// Y displacement
    pub y: i16,
    /// Wheel displacement
    pub wheel: i8,
}

impl MouseReport {
    /// Decode a raw report through the mouse field table
    pub fn parse(report: &[u8]) -> Result<Self, HidError> {
        let mut buttons = 0u16;
        for bit in 0..MOUSE_BUTTONS.count {
            if decode_field(report, &MOUSE_BUTTONS, bit)? != 0 {
                buttons |= 1 << bit;
            }
        }

        Ok(Self {
            buttons: MouseButtons::from_bits_retain(buttons),
            x: decode_field(report, &MOUSE_X, 0)? as i16,
            y: decode_field(report, &MOUSE_Y, 0)? as i16,
            wheel: decode_field(report, &MOUSE_WHEEL, 0)? as i8,
        })
    }

    /// Decode the report held in `slot` of an open mouse
    pub fn from_endpoint(hid: &HidEndpoint, slot: ReportSlot) -> Result<Self, HidError> {
        if hid.kind() != HidKind::Mouse {
            return Err(HidError::Unsupported);
        }
        Self::parse(hid.report(slot))
    }

    /// Any axis moved
    pub fn has_movement(&self) -> bool {
        self.x != 0 || self.y != 0 || self.wheel != 0
    }

    /// Buttons down now that were up in `last`
    pub fn pressed_since(&self, last: &Self) -> MouseButtons {
        self.buttons.difference(last.buttons)
    }

    /// Buttons up now that were down in `last`
    pub fn released_since(&self, last: &Self) -> MouseButtons {
        last.buttons.difference(self.buttons)
    }
}
