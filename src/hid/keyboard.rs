//! Keyboard report view
//!
//! Decodes the fixed keyboard layout (modifier bits, LED byte, six keycodes)
//! out of either report slot of a [`HidEndpoint`].

use bitflags::bitflags;

use super::device::{HidEndpoint, ReportSlot};
use super::field::{decode_field, KEYBOARD_KEYCODES, KEYBOARD_LEDS, KEYBOARD_MODIFIERS};
use super::item::HidKind;
use crate::error::HidError;

/// Number of keycode slots in a report
pub const KEYCODE_SLOTS: usize = KEYBOARD_KEYCODES.count as usize;

bitflags! {
    /// Keyboard modifier keys
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyModifiers: u8 {
        const LEFT_CTRL   = 0b0000_0001;
        const LEFT_SHIFT  = 0b0000_0010;
        const LEFT_ALT    = 0b0000_0100;
        /// Left Windows/Command key
        const LEFT_GUI    = 0b0000_1000;
        const RIGHT_CTRL  = 0b0001_0000;
        const RIGHT_SHIFT = 0b0010_0000;
        const RIGHT_ALT   = 0b0100_0000;
        /// Right Windows/Command key
        const RIGHT_GUI   = 0b1000_0000;
    }
}

impl KeyModifiers {
    /// Either Ctrl key
    pub fn ctrl(&self) -> bool {
        self.intersects(Self::LEFT_CTRL | Self::RIGHT_CTRL)
    }

    /// Either Shift key
    pub fn shift(&self) -> bool {
        self.intersects(Self::LEFT_SHIFT | Self::RIGHT_SHIFT)
    }

    /// Either Alt key
    pub fn alt(&self) -> bool {
        self.intersects(Self::LEFT_ALT | Self::RIGHT_ALT)
    }

    /// Either GUI key
    pub fn gui(&self) -> bool {
        self.intersects(Self::LEFT_GUI | Self::RIGHT_GUI)
    }
}

bitflags! {
    /// Keyboard LED output report bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyboardLeds: u8 {
        const NUM_LOCK    = 0x01;
        const CAPS_LOCK   = 0x02;
        const SCROLL_LOCK = 0x04;
        const COMPOSE     = 0x08;
        const KANA        = 0x10;
    }
}

/// Keyboard usage (HID Usage Tables, page 0x07)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyCode(pub u8);

impl KeyCode {
    /// Rollover marker sent when too many keys are held
    pub const ERROR_ROLLOVER: Self = Self(0x01);

    /// a and A
    pub const A: Self = Self(0x04);
    /// z and Z
    pub const Z: Self = Self(0x1D);
    /// 1 and !
    pub const KEY_1: Self = Self(0x1E);
    /// 0 and )
    pub const KEY_0: Self = Self(0x27);
    /// Return
    pub const ENTER: Self = Self(0x28);
    /// Escape
    pub const ESCAPE: Self = Self(0x29);
    /// Backspace
    pub const BACKSPACE: Self = Self(0x2A);
    /// Tab
    pub const TAB: Self = Self(0x2B);
    /// Spacebar
    pub const SPACE: Self = Self(0x2C);
    /// Caps Lock
    pub const CAPS_LOCK: Self = Self(0x39);
    /// F1
    pub const F1: Self = Self(0x3A);
    /// F12
    pub const F12: Self = Self(0x45);
    /// Scroll Lock
    pub const SCROLL_LOCK: Self = Self(0x47);
    /// Keypad Num Lock
    pub const NUM_LOCK: Self = Self(0x53);

    /// Punctuation row 0x2D..=0x38 as (unshifted, shifted); 0x32 is the
    /// non-US hash key and has no mapping
    const PUNCTUATION: [Option<(char, char)>; 12] = [
        Some(('-', '_')),
        Some(('=', '+')),
        Some(('[', '{')),
        Some((']', '}')),
        Some(('\\', '|')),
        None,
        Some((';', ':')),
        Some(('\'', '"')),
        Some(('`', '~')),
        Some((',', '<')),
        Some(('.', '>')),
        Some(('/', '?')),
    ];

    const SHIFTED_DIGITS: [char; 10] = ['!', '@', '#', '$', '%', '^', '&', '*', '(', ')'];

    /// Raw usage value
    pub fn raw(&self) -> u8 {
        self.0
    }

    /// Printable character for this key, honoring shift
    ///
    /// Returns `None` for keys without a character (function keys, arrows,
    /// modifiers, rollover).
    pub fn to_char(&self, shift: bool) -> Option<char> {
        match self.0 {
            0x04..=0x1D => {
                let base = if shift { b'A' } else { b'a' };
                Some((base + (self.0 - 0x04)) as char)
            }
            0x1E..=0x27 => {
                let i = (self.0 - 0x1E) as usize;
                if shift {
                    Some(Self::SHIFTED_DIGITS[i])
                } else {
                    // 0x27 is '0', the rest run from '1'
                    Some(if i == 9 { '0' } else { (b'1' + i as u8) as char })
                }
            }
            0x28 => Some('\n'),
            0x2B => Some('\t'),
            0x2C => Some(' '),
            0x2D..=0x38 => Self::PUNCTUATION[(self.0 - 0x2D) as usize].map(|(plain, shifted)| {
                if shift {
                    shifted
                } else {
                    plain
                }
            }),
            _ => None,
        }
    }
}

/// Decoded keyboard report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyboardReport {
    /// Modifier key states
    pub modifiers: KeyModifiers,
    /// LED byte as echoed by the device
    pub leds: u8,
    keycodes: [u8; KEYCODE_SLOTS],
}

impl KeyboardReport {
    /// Decode a raw report through the keyboard field table
    pub fn parse(report: &[u8]) -> Result<Self, HidError> {
        let mut modifiers = KeyModifiers::empty();
        for bit in 0..KEYBOARD_MODIFIERS.count {
            if decode_field(report, &KEYBOARD_MODIFIERS, bit)? != 0 {
                modifiers |= KeyModifiers::from_bits_retain(1 << bit);
            }
        }

        let mut keycodes = [0u8; KEYCODE_SLOTS];
        for (i, code) in keycodes.iter_mut().enumerate() {
            *code = decode_field(report, &KEYBOARD_KEYCODES, i as u8)? as u8;
        }

        Ok(Self {
            modifiers,
            leds: decode_field(report, &KEYBOARD_LEDS, 0)? as u8,
            keycodes,
        })
    }

    /// Decode the report held in `slot` of an open keyboard
    pub fn from_endpoint(hid: &HidEndpoint, slot: ReportSlot) -> Result<Self, HidError> {
        if hid.kind() != HidKind::Keyboard {
            return Err(HidError::Unsupported);
        }
        Self::parse(hid.report(slot))
    }

    /// Keys held in this report, in slot order
    pub fn keys_pressed(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.keycodes
            .iter()
            .filter(|&&code| code > KeyCode::ERROR_ROLLOVER.0)
            .map(|&code| KeyCode(code))
    }

    /// Key held in this report
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed().any(|k| k == key)
    }

    /// Device reported more keys than the report can hold
    pub fn is_rollover(&self) -> bool {
        self.keycodes.iter().all(|&code| code == KeyCode::ERROR_ROLLOVER.0)
    }

    /// Keys held now that were not held in `last`
    pub fn pressed_since<'a>(&'a self, last: &'a Self) -> impl Iterator<Item = KeyCode> + 'a {
        self.keys_pressed().filter(move |&k| !last.is_key_pressed(k))
    }

    /// Keys held in `last` that are no longer held
    pub fn released_since<'a>(&'a self, last: &'a Self) -> impl Iterator<Item = KeyCode> + 'a {
        last.keys_pressed().filter(move |&k| !self.is_key_pressed(k))
    }
}
