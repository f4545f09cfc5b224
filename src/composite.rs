//! Downstream composite HID descriptor
//!
//! Each upstream HID interface that should be republished is registered into
//! a numbered slot. [`CompositeRegistry::build`] then lays out one
//! configuration descriptor with an interface, HID and interrupt IN endpoint
//! descriptor per populated slot, for the device-side USB stack to serve.
//!
//! ```text
//! Config(9) + N * (Interface(9) + HID(9) + Endpoint(7))
//! ```

use crate::error::CompositeError;
use crate::hid::constants::HID_CLASS;
use crate::hid::device::{HidEndpoint, MAX_REPORT_DESCRIPTOR_LEN};
use crate::transfer::descriptor_type;

/// Configuration descriptor length
pub const CONFIG_DESCRIPTOR_LEN: usize = 9;
/// Interface descriptor length
pub const INTERFACE_DESCRIPTOR_LEN: usize = 9;
/// HID class descriptor length
pub const HID_DESCRIPTOR_LEN: usize = 9;
/// Endpoint descriptor length
pub const ENDPOINT_DESCRIPTOR_LEN: usize = 7;
/// Bytes added per registered slot
pub const SLOT_DESCRIPTOR_LEN: usize = INTERFACE_DESCRIPTOR_LEN + HID_DESCRIPTOR_LEN + ENDPOINT_DESCRIPTOR_LEN;

/// Capacity of the built configuration descriptor
pub const MAX_COMPOSITE_DESCRIPTOR_LEN: usize = 256;

/// Slots that map onto IN endpoints 1..=15
const MAX_SLOT_ENDPOINTS: usize = 15;

/// bcdHID advertised downstream
const BCD_HID: u16 = 0x0111;
/// bmAttributes: bus powered
const CONFIG_ATTRIBUTES: u8 = 0x80;
/// bMaxPower in 2mA units (100mA)
const CONFIG_MAX_POWER: u8 = 50;
/// bConfigurationValue of the only configuration
const CONFIG_VALUE: u8 = 1;
/// bmAttributes of an interrupt endpoint
const INTERRUPT_ATTRIBUTES: u8 = 0x03;

/// Downstream consumer of relayed reports
///
/// Implemented by the device-stack glue: each call should queue `report` as
/// an IN transfer on the endpoint of `slot`.
pub trait ReportSink {
    /// Error reported by the device stack
    type Error;

    /// Send one report on the endpoint belonging to `slot`
    fn send_report(&mut self, slot: usize, report: &[u8]) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone)]
struct InterfaceSlot {
    report_descriptor: heapless::Vec<u8, MAX_REPORT_DESCRIPTOR_LEN>,
    endpoint_address: u8,
    max_packet: u16,
    interval: u8,
}

/// Registry of republished interfaces, `N` slots
#[derive(Debug, Clone)]
pub struct CompositeRegistry<const N: usize> {
    slots: [Option<InterfaceSlot>; N],
    config: heapless::Vec<u8, MAX_COMPOSITE_DESCRIPTOR_LEN>,
    hid_offsets: [Option<usize>; N],
    built: bool,
}

impl<const N: usize> CompositeRegistry<N> {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            config: heapless::Vec::new(),
            hid_offsets: [None; N],
            built: false,
        }
    }

    /// Endpoint address assigned to `slot`: `slot + 1` with the IN bit set
    ///
    /// `None` when the slot is outside the registry or past endpoint 15.
    pub const fn endpoint_address_for(slot: usize) -> Option<u8> {
        if slot >= N || slot >= MAX_SLOT_ENDPOINTS {
            return None;
        }
        Some((slot as u8 + 1) | 0x80)
    }

    /// Store an interface in `slot`, replacing any earlier registration
    ///
    /// A previously built descriptor is discarded and must be rebuilt.
    pub fn register(
        &mut self,
        slot: usize,
        report_descriptor: &[u8],
        max_packet: u16,
        interval: u8,
    ) -> Result<(), CompositeError> {
        let endpoint_address = Self::endpoint_address_for(slot).ok_or(CompositeError::InvalidSlot)?;

        let mut stored = heapless::Vec::new();
        stored
            .extend_from_slice(report_descriptor)
            .map_err(|_| CompositeError::DescriptorTooLarge)?;

        self.slots[slot] = Some(InterfaceSlot {
            report_descriptor: stored,
            endpoint_address,
            max_packet,
            interval,
        });
        self.invalidate();

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "Registered slot {}: report descriptor {} bytes, ep {:#x}",
            slot,
            report_descriptor.len(),
            endpoint_address
        );

        Ok(())
    }

    /// Register an open upstream HID interface, mirroring its report
    /// descriptor and interrupt endpoint parameters
    pub fn register_endpoint(&mut self, slot: usize, hid: &HidEndpoint) -> Result<(), CompositeError> {
        let endpoint = hid.endpoint();
        self.register(slot, hid.report_descriptor(), endpoint.max_packet_size, endpoint.interval)
    }

    /// Empty `slot`
    pub fn unregister(&mut self, slot: usize) -> Result<(), CompositeError> {
        let entry = self.slots.get_mut(slot).ok_or(CompositeError::InvalidSlot)?;
        *entry = None;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&mut self) {
        self.config.clear();
        self.hid_offsets = [None; N];
        self.built = false;
    }

    /// Number of populated slots
    pub fn interface_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Serialize the configuration descriptor
    ///
    /// Slots are emitted in ascending order with the slot index as the
    /// interface number. The result stays owned by the registry until the
    /// next registration change.
    pub fn build(&mut self) -> Result<&[u8], CompositeError> {
        let count = self.interface_count();
        if count == 0 {
            #[cfg(feature = "defmt")]
            defmt::error!("No interfaces registered");
            return Err(CompositeError::NoInterfaces);
        }

        let total = CONFIG_DESCRIPTOR_LEN + count * SLOT_DESCRIPTOR_LEN;
        if total > MAX_COMPOSITE_DESCRIPTOR_LEN {
            return Err(CompositeError::DescriptorTooLarge);
        }

        self.invalidate();
        let mut config: heapless::Vec<u8, MAX_COMPOSITE_DESCRIPTOR_LEN> = heapless::Vec::new();
        let mut hid_offsets = [None; N];

        let total_bytes = (total as u16).to_le_bytes();
        push(
            &mut config,
            &[
                CONFIG_DESCRIPTOR_LEN as u8,
                descriptor_type::CONFIGURATION,
                total_bytes[0],
                total_bytes[1],
                count as u8,
                CONFIG_VALUE,
                0, // iConfiguration
                CONFIG_ATTRIBUTES,
                CONFIG_MAX_POWER,
            ],
        )?;

        for (index, slot) in self.slots.iter().enumerate() {
            let Some(slot) = slot else { continue };

            push(
                &mut config,
                &[
                    INTERFACE_DESCRIPTOR_LEN as u8,
                    descriptor_type::INTERFACE,
                    index as u8,
                    0, // bAlternateSetting
                    1, // bNumEndpoints
                    HID_CLASS,
                    0, // no boot subclass
                    0,
                    0, // iInterface
                ],
            )?;

            hid_offsets[index] = Some(config.len());
            let bcd = BCD_HID.to_le_bytes();
            let report_len = (slot.report_descriptor.len() as u16).to_le_bytes();
            push(
                &mut config,
                &[
                    HID_DESCRIPTOR_LEN as u8,
                    descriptor_type::HID,
                    bcd[0],
                    bcd[1],
                    0, // bCountryCode
                    1, // bNumDescriptors
                    descriptor_type::REPORT,
                    report_len[0],
                    report_len[1],
                ],
            )?;

            let mps = slot.max_packet.to_le_bytes();
            push(
                &mut config,
                &[
                    ENDPOINT_DESCRIPTOR_LEN as u8,
                    descriptor_type::ENDPOINT,
                    slot.endpoint_address,
                    INTERRUPT_ATTRIBUTES,
                    mps[0],
                    mps[1],
                    slot.interval,
                ],
            )?;
        }

        #[cfg(feature = "defmt")]
        defmt::info!("Composite descriptor built: {} interfaces, {} bytes", count, total);

        self.config = config;
        self.hid_offsets = hid_offsets;
        self.built = true;
        Ok(&self.config)
    }

    /// Built configuration descriptor, if [`build`](Self::build) succeeded
    /// since the last registration change
    pub fn config_descriptor(&self) -> Option<&[u8]> {
        self.built.then_some(self.config.as_slice())
    }

    /// Endpoint address of a populated slot
    pub fn endpoint_address(&self, slot: usize) -> Option<u8> {
        self.slot(slot).map(|s| s.endpoint_address)
    }

    /// Report descriptor of a populated slot, served for GET_DESCRIPTOR(Report)
    pub fn report_descriptor(&self, slot: usize) -> Option<&[u8]> {
        self.slot(slot).map(|s| s.report_descriptor.as_slice())
    }

    /// The slot's 9-byte HID descriptor inside the built configuration,
    /// served for GET_DESCRIPTOR(HID)
    pub fn hid_descriptor(&self, slot: usize) -> Option<&[u8]> {
        let offset = (*self.hid_offsets.get(slot)?)?;
        self.config.get(offset..offset + HID_DESCRIPTOR_LEN)
    }

    /// Slot whose endpoint has this address
    pub fn slot_for_endpoint(&self, address: u8) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.endpoint_address == address))
    }

    fn slot(&self, slot: usize) -> Option<&InterfaceSlot> {
        self.slots.get(slot)?.as_ref()
    }
}

impl<const N: usize> Default for CompositeRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn push(buf: &mut heapless::Vec<u8, MAX_COMPOSITE_DESCRIPTOR_LEN>, bytes: &[u8]) -> Result<(), CompositeError> {
    buf.extend_from_slice(bytes)
        .map_err(|_| CompositeError::DescriptorTooLarge)
}
