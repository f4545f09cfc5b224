//! Report descriptor items
//!
//! Short items are one prefix byte (size in bits 1..0, type in bits 3..2,
//! tag in bits 7..4) followed by 0, 1, 2 or 4 payload bytes. Long items are
//! walked over but carry no decoded payload.
//!
//! The parser is only used to tell mice from keyboards and to sanity-check a
//! mouse descriptor; field positions come from the fixed tables in
//! [`super::field`].

use super::constants::{collection, global_tag, local_tag, main_tag, usage, usage_page, LONG_ITEM_PREFIX};
use crate::error::HidError;

/// Item type from prefix bits 3..2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ItemType {
    /// Input, Output, Feature and collections
    Main,
    /// State shared by following main items
    Global,
    /// State for the next main item only
    Local,
    /// Type 3
    Reserved,
}

impl ItemType {
    const fn from_prefix(prefix: u8) -> Self {
        match (prefix >> 2) & 0x03 {
            0 => Self::Main,
            1 => Self::Global,
            2 => Self::Local,
            _ => Self::Reserved,
        }
    }
}

/// One decoded item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Item {
    /// Item type
    pub item_type: ItemType,
    /// Tag within the type
    pub tag: u8,
    /// Payload length in bytes
    pub size: u8,
    /// Payload, little-endian, zero-extended
    pub data: u32,
    /// Long item (payload not decoded)
    pub long: bool,
}

impl Item {
    /// Payload sign-extended from its encoded size
    pub fn signed_data(&self) -> i32 {
        match self.size {
            1 => self.data as u8 as i8 as i32,
            2 => self.data as u16 as i16 as i32,
            _ => self.data as i32,
        }
    }

    /// Short item with this type, tag and a one-byte payload equal to `value`
    fn is(&self, item_type: ItemType, tag: u8, value: u32) -> bool {
        !self.long && self.item_type == item_type && self.tag == tag && self.size == 1 && self.data == value
    }
}

/// Decode the item at `*cursor` and advance past it
///
/// Returns `None` at the end of the descriptor or when the item's payload
/// would run past the end; the cursor is left untouched in that case.
pub fn next_item(descriptor: &[u8], cursor: &mut usize) -> Option<Item> {
    let start = *cursor;
    let prefix = *descriptor.get(start)?;

    if prefix == LONG_ITEM_PREFIX {
        let size = *descriptor.get(start + 1)?;
        let tag = *descriptor.get(start + 2)?;
        let end = start + 3 + size as usize;
        if end > descriptor.len() {
            return None;
        }
        *cursor = end;
        return Some(Item {
            item_type: ItemType::Reserved,
            tag,
            size,
            data: 0,
            long: true,
        });
    }

    let size: u8 = match prefix & 0x03 {
        3 => 4,
        n => n,
    };
    let payload = descriptor.get(start + 1..start + 1 + size as usize)?;
    let data = payload
        .iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | b as u32);

    *cursor = start + 1 + size as usize;
    Some(Item {
        item_type: ItemType::from_prefix(prefix),
        tag: prefix >> 4,
        size,
        data,
        long: false,
    })
}

/// Iterator over the items of a report descriptor
pub struct ItemReader<'a> {
    descriptor: &'a [u8],
    cursor: usize,
}

impl<'a> ItemReader<'a> {
    /// Start at the first item
    pub fn new(descriptor: &'a [u8]) -> Self {
        Self { descriptor, cursor: 0 }
    }

    /// Byte offset of the next item
    pub fn position(&self) -> usize {
        self.cursor
    }
}

impl Iterator for ItemReader<'_> {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        next_item(self.descriptor, &mut self.cursor)
    }
}

/// Device class derived from the report descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidKind {
    /// Pointer with buttons
    Mouse,
    /// Keyboard with LED output
    Keyboard,
}

/// Classify a report descriptor
///
/// The first item must be `Usage Page (Generic Desktop)` and the second
/// `Usage (Mouse)` or `Usage (Keyboard)`, both with one-byte payloads.
pub fn classify(descriptor: &[u8]) -> Result<HidKind, HidError> {
    let mut items = ItemReader::new(descriptor);

    let first = items.next().ok_or(HidError::Unsupported)?;
    if !first.is(ItemType::Global, global_tag::USAGE_PAGE, usage_page::GENERIC_DESKTOP) {
        #[cfg(feature = "defmt")]
        defmt::warn!("First item is not Usage Page (Generic Desktop)");
        return Err(HidError::Unsupported);
    }

    let second = items.next().ok_or(HidError::Unsupported)?;
    if second.is(ItemType::Local, local_tag::USAGE, usage::MOUSE) {
        Ok(HidKind::Mouse)
    } else if second.is(ItemType::Local, local_tag::USAGE, usage::KEYBOARD) {
        Ok(HidKind::Keyboard)
    } else {
        #[cfg(feature = "defmt")]
        defmt::warn!("Unsupported usage {:#x}", second.data);
        Err(HidError::Unsupported)
    }
}

/// Find a one-byte short item at or after `from`; returns the offset just past it
fn find_item(descriptor: &[u8], from: usize, item_type: ItemType, tag: u8, value: u32) -> Option<usize> {
    let mut cursor = from;
    while let Some(item) = next_item(descriptor, &mut cursor) {
        if item.is(item_type, tag, value) {
            return Some(cursor);
        }
    }
    None
}

/// Check a mouse descriptor has the expected collection structure
///
/// After `Collection (Application)` there must be a `Usage (Pointer)` and a
/// `Collection (Physical)`; inside the physical collection both a
/// `Usage Page (Button)` and a `Usage Page (Generic Desktop)` must follow.
pub fn validate_mouse(descriptor: &[u8]) -> Result<(), HidError> {
    let application = find_item(descriptor, 0, ItemType::Main, main_tag::COLLECTION, collection::APPLICATION)
        .ok_or(HidError::Unsupported)?;

    find_item(descriptor, application, ItemType::Local, local_tag::USAGE, usage::POINTER)
        .ok_or(HidError::Unsupported)?;

    let physical = find_item(descriptor, application, ItemType::Main, main_tag::COLLECTION, collection::PHYSICAL)
        .ok_or(HidError::Unsupported)?;

    find_item(descriptor, physical, ItemType::Global, global_tag::USAGE_PAGE, usage_page::BUTTON)
        .ok_or(HidError::Unsupported)?;
    find_item(descriptor, physical, ItemType::Global, global_tag::USAGE_PAGE, usage_page::GENERIC_DESKTOP)
        .ok_or(HidError::Unsupported)?;

    Ok(())
}
