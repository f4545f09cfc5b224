//! Report field layouts and decoding
//!
//! Field positions are fixed per device class rather than derived from the
//! report descriptor. The tables match the 8-byte report format of common
//! gaming mice and keyboards.

use super::item::HidKind;
use crate::error::HidError;

/// Position and shape of one logical field inside a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HidFieldDescriptor {
    /// Offset of element 0 from the start of the report, in bits
    pub bit_offset: u16,
    /// Width of one element: 1, 8, 16 or 32 bits
    pub bit_width: u8,
    /// Number of elements
    pub count: u8,
    /// Logical minimum
    pub logical_min: i32,
    /// Logical maximum
    pub logical_max: i32,
    /// Elements are two's complement
    pub signed: bool,
}

impl HidFieldDescriptor {
    const fn bits(bit_offset: u16, count: u8) -> Self {
        Self {
            bit_offset,
            bit_width: 1,
            count,
            logical_min: 0,
            logical_max: 1,
            signed: false,
        }
    }

    /// Bytes from the start of the report up to the end of the last element
    pub const fn end_byte(&self) -> usize {
        (self.bit_offset as usize + self.bit_width as usize * self.count as usize + 7) / 8
    }
}

/// Mouse report length in bytes
pub const MOUSE_REPORT_LEN: usize = 8;
/// Keyboard report length in bytes
pub const KEYBOARD_REPORT_LEN: usize = 8;

/// Mouse buttons, one bit each
pub const MOUSE_BUTTONS: HidFieldDescriptor = HidFieldDescriptor::bits(0, 16);
/// Mouse X displacement
pub const MOUSE_X: HidFieldDescriptor = HidFieldDescriptor {
    bit_offset: 16,
    bit_width: 16,
    count: 1,
    logical_min: -32767,
    logical_max: 32767,
    signed: true,
};
/// Mouse Y displacement
pub const MOUSE_Y: HidFieldDescriptor = HidFieldDescriptor {
    bit_offset: 32,
    ..MOUSE_X
};
/// Mouse wheel
pub const MOUSE_WHEEL: HidFieldDescriptor = HidFieldDescriptor {
    bit_offset: 48,
    bit_width: 8,
    count: 1,
    logical_min: -127,
    logical_max: 127,
    signed: true,
};

/// Keyboard modifier keys, one bit each
pub const KEYBOARD_MODIFIERS: HidFieldDescriptor = HidFieldDescriptor::bits(0, 8);
/// Keyboard LED byte (5 LEDs + padding)
pub const KEYBOARD_LEDS: HidFieldDescriptor = HidFieldDescriptor {
    bit_offset: 8,
    bit_width: 8,
    count: 1,
    logical_min: 0,
    logical_max: 1,
    signed: false,
};
/// Keyboard keycode array
pub const KEYBOARD_KEYCODES: HidFieldDescriptor = HidFieldDescriptor {
    bit_offset: 16,
    bit_width: 8,
    count: 6,
    logical_min: 0,
    logical_max: 255,
    signed: false,
};

impl HidKind {
    /// Report length for this class
    pub const fn report_len(self) -> usize {
        match self {
            Self::Mouse => MOUSE_REPORT_LEN,
            Self::Keyboard => KEYBOARD_REPORT_LEN,
        }
    }

    /// Fields making up this class's report
    pub const fn fields(self) -> &'static [HidFieldDescriptor] {
        match self {
            Self::Mouse => &[MOUSE_BUTTONS, MOUSE_X, MOUSE_Y, MOUSE_WHEEL],
            Self::Keyboard => &[KEYBOARD_MODIFIERS, KEYBOARD_LEDS, KEYBOARD_KEYCODES],
        }
    }
}

/// Read element `index` of `field` from `report`
///
/// Single-bit fields read bit `bit_offset + index`. Wider fields read
/// `bit_width / 8` little-endian bytes at byte `bit_offset / 8 + index * bit_width / 8`.
pub fn decode_field(report: &[u8], field: &HidFieldDescriptor, index: u8) -> Result<i64, HidError> {
    if index >= field.count {
        return Err(HidError::InvalidParam);
    }

    if field.bit_width == 1 {
        let bit = field.bit_offset as usize + index as usize;
        let byte = report.get(bit / 8).ok_or(HidError::InvalidParam)?;
        return Ok(((byte >> (bit % 8)) & 1) as i64);
    }

    let width = match field.bit_width {
        8 => 1,
        16 => 2,
        32 => 4,
        _ => return Err(HidError::InvalidParam),
    };
    let offset = field.bit_offset as usize / 8 + index as usize * width;
    let bytes = report.get(offset..offset + width).ok_or(HidError::InvalidParam)?;

    let value = match (width, field.signed) {
        (1, true) => bytes[0] as i8 as i64,
        (1, false) => bytes[0] as i64,
        (2, true) => i16::from_le_bytes([bytes[0], bytes[1]]) as i64,
        (2, false) => u16::from_le_bytes([bytes[0], bytes[1]]) as i64,
        (_, true) => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
        (_, false) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
    };
    Ok(value)
}
