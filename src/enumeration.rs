//! USB device enumeration
//!
//! Resets the attached device, reads its descriptors, assigns an address and
//! selects its configuration. Progress is tracked as an explicit state so a
//! caller can tell how far a failed attempt got.
//!
//! Failure handling: a timeout is reported as [`HostError::Timeout`] and says
//! nothing about the device being gone. Chip or bus failures end the attempt
//! with [`HostError::Disconnected`].

use embedded_hal::delay::DelayNs;

use crate::chip::command::UsbMode;
use crate::chip::link::Transport;
use crate::config::{timing, EnumerationConfig};
use crate::device::{
    ConnectionState, HidClassDescriptor, UsbDevice, UsbEndpoint, UsbInterface, MAX_CONFIG_DESCRIPTOR_LEN,
    MAX_INTERFACES,
};
use crate::error::{ChipError, HostError, Result};
use crate::host::UsbHost;
use crate::transfer::control::{control_transfer, control_transfer_with_retry};
use crate::transfer::{descriptor_type, SetupPacket};

/// Minimum record sizes for the descriptor walk
const CONFIG_DESC_LEN: usize = 9;
const INTERFACE_DESC_LEN: usize = 9;
const HID_DESC_LEN: usize = 9;
const ENDPOINT_DESC_LEN: usize = 7;
const DEVICE_DESC_LEN: usize = 18;

/// Max packet size every device accepts on endpoint 0 before it is known
const DEFAULT_EP0_MAX_PACKET: u8 = 8;

/// Enumeration progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnumerationState {
    /// No device, or the last attempt failed
    Disconnected,
    /// Device seen and its speed read
    SpeedDetected,
    /// Bus reset driven and SOF generation restarted
    Reset,
    /// Device came back after reset and settled
    Reconnected,
    /// Device answers at its assigned address
    AddressKnown,
}

/// USB device descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceDescriptor {
    /// USB release, BCD
    pub bcd_usb: u16,
    /// bDeviceClass
    pub device_class: u8,
    /// bDeviceSubClass
    pub device_sub_class: u8,
    /// bDeviceProtocol
    pub device_protocol: u8,
    /// Endpoint 0 max packet size
    pub max_packet_size0: u8,
    /// Vendor ID
    pub id_vendor: u16,
    /// Product ID
    pub id_product: u16,
    /// Device release, BCD
    pub bcd_device: u16,
    /// Number of configurations
    pub num_configurations: u8,
}

impl DeviceDescriptor {
    /// Parse from raw bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < DEVICE_DESC_LEN || data[1] != descriptor_type::DEVICE {
            return Err(HostError::Protocol);
        }

        Ok(Self {
            bcd_usb: u16::from_le_bytes([data[2], data[3]]),
            device_class: data[4],
            device_sub_class: data[5],
            device_protocol: data[6],
            max_packet_size0: data[7],
            id_vendor: u16::from_le_bytes([data[8], data[9]]),
            id_product: u16::from_le_bytes([data[10], data[11]]),
            bcd_device: u16::from_le_bytes([data[12], data[13]]),
            num_configurations: data[17],
        })
    }
}

/// Configuration descriptor header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationHeader {
    /// wTotalLength of the whole configuration
    pub total_length: u16,
    /// bNumInterfaces
    pub num_interfaces: u8,
    /// Value for SET_CONFIGURATION
    pub configuration_value: u8,
    /// bmAttributes
    pub attributes: u8,
    /// bMaxPower in 2mA units
    pub max_power: u8,
}

impl ConfigurationHeader {
    /// Parse the leading 9-byte record
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < CONFIG_DESC_LEN
            || (data[0] as usize) < CONFIG_DESC_LEN
            || data[1] != descriptor_type::CONFIGURATION
        {
            return Err(HostError::Protocol);
        }

        Ok(Self {
            total_length: u16::from_le_bytes([data[2], data[3]]),
            num_interfaces: data[4],
            configuration_value: data[5],
            attributes: data[7],
            max_power: data[8],
        })
    }
}

/// Walk a full configuration descriptor and build the interface table
///
/// Each record is checked against its minimum size and the end of the buffer
/// before the cursor moves past it. Alternate settings other than 0 are
/// skipped along with their endpoints.
pub fn parse_configuration(data: &[u8]) -> Result<(ConfigurationHeader, heapless::Vec<UsbInterface, MAX_INTERFACES>)> {
    let header = ConfigurationHeader::from_bytes(data)?;
    let end = header.total_length as usize;
    if end < CONFIG_DESC_LEN || end > data.len() {
        return Err(HostError::Protocol);
    }
    let data = &data[..end];

    let mut interfaces: heapless::Vec<UsbInterface, MAX_INTERFACES> = heapless::Vec::new();
    let mut current: Option<usize> = None;
    let mut cursor = data[0] as usize;

    while cursor < end {
        if cursor + 2 > end {
            return Err(HostError::Protocol);
        }
        let len = data[cursor] as usize;
        let kind = data[cursor + 1];
        if len < 2 || cursor + len > end {
            return Err(HostError::Protocol);
        }
        let record = &data[cursor..cursor + len];

        match kind {
            descriptor_type::INTERFACE => {
                let record: &[u8; INTERFACE_DESC_LEN] = record
                    .get(..INTERFACE_DESC_LEN)
                    .and_then(|r| r.try_into().ok())
                    .ok_or(HostError::Protocol)?;
                let interface = UsbInterface::from_descriptor(record);

                current = None;
                if interface.alternate_setting == 0 {
                    if interfaces.push(interface).is_ok() {
                        current = Some(interfaces.len() - 1);
                    } else {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("Interface table full, ignoring interface {}", record[2]);
                    }
                }
            }
            descriptor_type::HID => {
                let record: &[u8; HID_DESC_LEN] = record
                    .get(..HID_DESC_LEN)
                    .and_then(|r| r.try_into().ok())
                    .ok_or(HostError::Protocol)?;
                if let Some(interface) = current.and_then(|i| interfaces.get_mut(i)) {
                    if interface.hid.is_none() {
                        interface.hid = Some(HidClassDescriptor::from_descriptor(record));
                    }
                }
            }
            descriptor_type::ENDPOINT => {
                let record: &[u8; ENDPOINT_DESC_LEN] = record
                    .get(..ENDPOINT_DESC_LEN)
                    .and_then(|r| r.try_into().ok())
                    .ok_or(HostError::Protocol)?;
                if let Some(interface) = current.and_then(|i| interfaces.get_mut(i)) {
                    if interface.endpoints.push(UsbEndpoint::from_descriptor(record)).is_err() {
                        #[cfg(feature = "defmt")]
                        defmt::warn!(
                            "Endpoint table full, ignoring endpoint {:#x} of interface {}",
                            record[2],
                            interface.number
                        );
                    }
                }
            }
            _ => {}
        }

        cursor += len;
    }

    Ok((header, interfaces))
}

/// Chip command failure during enumeration
///
/// Only a timeout keeps its kind; a rejected or garbled chip command means
/// the port is no longer usable for this device.
fn chip_step(err: ChipError) -> HostError {
    match HostError::from(err) {
        HostError::Timeout => HostError::Timeout,
        _ => HostError::Disconnected,
    }
}

/// Drives a device from attach to configured
pub struct Enumerator {
    state: EnumerationState,
    config: EnumerationConfig,
}

impl Enumerator {
    /// Create an enumerator
    pub const fn new(config: EnumerationConfig) -> Self {
        Self {
            state: EnumerationState::Disconnected,
            config,
        }
    }

    /// Progress of the last attempt
    pub fn state(&self) -> EnumerationState {
        self.state
    }

    /// Active configuration
    pub fn config(&self) -> &EnumerationConfig {
        &self.config
    }

    /// Enumerate the device on the host's port
    ///
    /// On success the returned device is `Ready`. On failure the state drops
    /// back to `Disconnected` and the host's cached chip state is cleared.
    pub fn enumerate<T: Transport, D: DelayNs>(&mut self, host: &mut UsbHost<T, D>) -> Result<UsbDevice> {
        self.state = EnumerationState::Disconnected;

        match self.run(host) {
            Ok(device) => Ok(device),
            Err(e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Enumeration failed in {}: {}", self.state, e);

                self.state = EnumerationState::Disconnected;
                host.reset_session();
                Err(match e {
                    HostError::Timeout => HostError::Timeout,
                    HostError::Protocol => HostError::Protocol,
                    HostError::InvalidParam => HostError::InvalidParam,
                    _ => HostError::Disconnected,
                })
            }
        }
    }

    fn run<T: Transport, D: DelayNs>(&mut self, host: &mut UsbHost<T, D>) -> Result<UsbDevice> {
        let mut device = UsbDevice::new();

        if !host.chip_mut().test_connect().map_err(chip_step)?.is_attached() {
            return Err(HostError::Disconnected);
        }

        let speed = host.chip_mut().get_device_speed().map_err(chip_step)?;
        device.speed = speed;
        self.state = EnumerationState::SpeedDetected;

        #[cfg(feature = "defmt")]
        defmt::info!("Device speed {}", speed);

        host.chip_mut().set_mode(UsbMode::HostReset).map_err(chip_step)?;
        host.delay_ms(self.config.reset_hold_ms);
        host.chip_mut().set_mode(UsbMode::HostAutoSof).map_err(chip_step)?;
        self.state = EnumerationState::Reset;

        match host.poll_connect(self.config.reconnect_timeout_ms, self.config.settle_ms) {
            Ok(_) => {}
            Err(HostError::Timeout) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Device did not reconnect after reset");

                host.chip_mut().set_mode(UsbMode::HostNoSof).map_err(chip_step)?;
                return Err(HostError::Timeout);
            }
            // Only the chip command itself can fail here
            Err(_) => return Err(HostError::Disconnected),
        }
        device.state = ConnectionState::Connected;
        self.state = EnumerationState::Reconnected;

        host.chip_mut().set_device_speed(speed).map_err(chip_step)?;
        host.delay_ms(self.config.speed_settle_ms);
        host.chip_mut().set_usb_address(0).map_err(chip_step)?;

        let descriptor = self.read_device_descriptor(host)?;
        device.ep0_max_packet = descriptor.max_packet_size0;
        device.vendor_id = descriptor.id_vendor;
        device.product_id = descriptor.id_product;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Device {:#x}:{:#x}, ep0 max packet {}",
            descriptor.id_vendor,
            descriptor.id_product,
            descriptor.max_packet_size0
        );

        let address = self.config.device_address;
        if address == 0 || address > 127 {
            return Err(HostError::InvalidParam);
        }
        control_transfer(host, device.ep0_max_packet, &SetupPacket::set_address(address), &mut [])?;
        host.delay_ms(timing::SET_ADDRESS_RECOVERY_MS);
        host.chip_mut().set_usb_address(address).map_err(chip_step)?;
        device.address = address;
        self.state = EnumerationState::AddressKnown;

        self.read_configuration(host, &mut device)?;

        control_transfer(
            host,
            device.ep0_max_packet,
            &SetupPacket::set_configuration(device.config_value),
            &mut [],
        )?;
        device.state = ConnectionState::Ready;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Configuration {} selected, {} interface(s)",
            device.config_value,
            device.interfaces.len()
        );

        Ok(device)
    }

    /// Read bMaxPacketSize0 with an 8-byte request, then the whole descriptor
    fn read_device_descriptor<T: Transport, D: DelayNs>(&mut self, host: &mut UsbHost<T, D>) -> Result<DeviceDescriptor> {
        let retries = self.config.descriptor_retries;
        let mut buf = [0u8; DEVICE_DESC_LEN];

        let setup = SetupPacket::get_descriptor(descriptor_type::DEVICE, 0, 8);
        let n = control_transfer_with_retry(host, DEFAULT_EP0_MAX_PACKET, &setup, &mut buf, retries)?;
        if n < 8 {
            return Err(HostError::Protocol);
        }
        let max_packet = buf[7];
        if !matches!(max_packet, 8 | 16 | 32 | 64) {
            return Err(HostError::Protocol);
        }

        let setup = SetupPacket::get_descriptor(descriptor_type::DEVICE, 0, DEVICE_DESC_LEN as u16);
        let n = control_transfer_with_retry(host, max_packet, &setup, &mut buf, retries)?;
        if n != DEVICE_DESC_LEN {
            return Err(HostError::Protocol);
        }

        DeviceDescriptor::from_bytes(&buf)
    }

    /// Two-pass configuration read: header for wTotalLength, then everything
    fn read_configuration<T: Transport, D: DelayNs>(
        &mut self,
        host: &mut UsbHost<T, D>,
        device: &mut UsbDevice,
    ) -> Result<()> {
        let retries = self.config.descriptor_retries;
        let mps = device.ep0_max_packet;
        let mut buf = [0u8; MAX_CONFIG_DESCRIPTOR_LEN];

        let setup = SetupPacket::get_descriptor(descriptor_type::CONFIGURATION, 0, CONFIG_DESC_LEN as u16);
        let n = control_transfer_with_retry(host, mps, &setup, &mut buf, retries)?;
        let header = ConfigurationHeader::from_bytes(&buf[..n])?;

        let total = header.total_length as usize;
        if total < CONFIG_DESC_LEN || total > MAX_CONFIG_DESCRIPTOR_LEN {
            #[cfg(feature = "defmt")]
            defmt::error!("Configuration descriptor length {} unsupported", total);
            return Err(HostError::Protocol);
        }

        let setup = SetupPacket::get_descriptor(descriptor_type::CONFIGURATION, 0, total as u16);
        let n = control_transfer_with_retry(host, mps, &setup, &mut buf, retries)?;
        if n != total {
            return Err(HostError::Protocol);
        }

        let (header, interfaces) = parse_configuration(&buf[..n])?;
        device.config_value = header.configuration_value;
        device.interfaces = interfaces;
        device.config_descriptor.clear();
        device
            .config_descriptor
            .extend_from_slice(&buf[..n])
            .map_err(|_| HostError::Protocol)?;

        Ok(())
    }
}

impl Default for Enumerator {
    fn default() -> Self {
        Self::new(EnumerationConfig::default())
    }
}
