//! Republishing upstream interfaces and relaying their reports

mod common;

use ch375_hidbridge::{
    CompositeRegistry, HidEndpoint, HidError, HostError, RelayError, RelayPoll, ReportRelay, ReportSink,
};
use common::*;

/// Sink that records what it was given
#[derive(Default)]
struct Recorder {
    sent: Vec<(usize, Vec<u8>)>,
    refuse: bool,
}

impl ReportSink for Recorder {
    type Error = &'static str;

    fn send_report(&mut self, slot: usize, report: &[u8]) -> Result<(), Self::Error> {
        if self.refuse {
            return Err("endpoint busy");
        }
        self.sent.push((slot, report.to_vec()));
        Ok(())
    }
}

#[test]
fn test_registry_mirrors_upstream_interfaces() {
    let (mut host, device) = enumerated(hid_device(
        8,
        &[HidInterfaceSpec::mouse(0, 0x81), HidInterfaceSpec::keyboard(1, 0x82)],
    ));
    let mouse = HidEndpoint::open(&mut host, &device, 0).unwrap();
    let keyboard = HidEndpoint::open(&mut host, &device, 1).unwrap();

    let mut registry = CompositeRegistry::<4>::new();
    registry.register_endpoint(0, &mouse).unwrap();
    registry.register_endpoint(1, &keyboard).unwrap();

    let config = registry.build().unwrap().to_vec();
    assert_eq!(config.len(), 9 + 2 * 25);
    assert_eq!(u16::from_le_bytes([config[2], config[3]]) as usize, config.len());
    assert_eq!(config[4], 2);

    // Endpoint descriptors: address, interrupt, upstream mps and interval
    assert_eq!(&config[27..34], &[7, 0x05, 0x81, 0x03, 8, 0, 10]);
    assert_eq!(&config[52..59], &[7, 0x05, 0x82, 0x03, 8, 0, 10]);

    assert_eq!(registry.report_descriptor(0), Some(MOUSE_REPORT_DESCRIPTOR));
    assert_eq!(registry.report_descriptor(1), Some(KEYBOARD_REPORT_DESCRIPTOR));

    let hid = registry.hid_descriptor(1).unwrap();
    let report_len = KEYBOARD_REPORT_DESCRIPTOR.len() as u16;
    assert_eq!(u16::from_le_bytes([hid[7], hid[8]]), report_len);
    assert_eq!(registry.slot_for_endpoint(0x82), Some(1));
}

#[test]
fn test_relay_forwards_reports() {
    let (mut host, device) = enumerated(mouse_device());
    let mut mouse = HidEndpoint::open(&mut host, &device, 0).unwrap();
    let mut relay = ReportRelay::new(2);
    let mut sink = Recorder::default();

    let report = vec![0x01, 0x00, 0x05, 0x00, 0xFB, 0xFF, 0x00, 0x00];
    fake_mut(&mut host).device.reports.push_back(report.clone());

    assert_eq!(relay.poll(&mut host, &mut mouse, &mut sink), Ok(RelayPoll::Sent));
    // Nothing queued: the device NAKs
    assert_eq!(relay.poll(&mut host, &mut mouse, &mut sink), Ok(RelayPoll::Idle));
    assert_eq!(relay.failures(), 0);

    assert_eq!(sink.sent, vec![(2, report)]);
}

#[test]
fn test_relay_stops_on_unplug() {
    let (mut host, device) = enumerated(mouse_device());
    let mut mouse = HidEndpoint::open(&mut host, &device, 0).unwrap();
    let mut relay = ReportRelay::new(0);
    let mut sink = Recorder::default();

    fake_mut(&mut host).device.reports.push_back(vec![0; 8]);
    fake_mut(&mut host).device.reports.push_back(vec![0; 8]);
    fake_mut(&mut host).unplugged = true;

    assert_eq!(relay.run(&mut host, &mut mouse, &mut sink), RelayError::Hid(HidError::NoDevice));
    assert!(sink.sent.is_empty());
}

#[test]
fn test_relay_gives_up_after_repeated_timeouts() {
    let (mut host, device) = enumerated(mouse_device());
    let mut mouse = HidEndpoint::open(&mut host, &device, 0).unwrap();
    let mut relay = ReportRelay::new(0).max_failures(3);
    let mut sink = Recorder::default();

    fake_mut(&mut host).silent = true;

    let timeout = HidError::Host(HostError::Timeout);
    assert_eq!(relay.poll(&mut host, &mut mouse, &mut sink), Ok(RelayPoll::Retrying(timeout)));
    assert_eq!(relay.poll(&mut host, &mut mouse, &mut sink), Ok(RelayPoll::Retrying(timeout)));
    assert_eq!(relay.failures(), 2);
    assert_eq!(relay.poll(&mut host, &mut mouse, &mut sink), Err(RelayError::Hid(timeout)));
}

#[test]
fn test_relay_recovers_between_timeouts() {
    let (mut host, device) = enumerated(mouse_device());
    let mut mouse = HidEndpoint::open(&mut host, &device, 0).unwrap();
    let mut relay = ReportRelay::new(0).max_failures(2);
    let mut sink = Recorder::default();

    fake_mut(&mut host).silent = true;
    assert!(matches!(relay.poll(&mut host, &mut mouse, &mut sink), Ok(RelayPoll::Retrying(_))));

    fake_mut(&mut host).silent = false;
    fake_mut(&mut host).device.reports.push_back(vec![0; 8]);
    assert_eq!(relay.poll(&mut host, &mut mouse, &mut sink), Ok(RelayPoll::Sent));
    assert_eq!(relay.failures(), 0);
}

#[test]
fn test_sink_error_ends_relay() {
    let (mut host, device) = enumerated(mouse_device());
    let mut mouse = HidEndpoint::open(&mut host, &device, 0).unwrap();
    let mut relay = ReportRelay::new(0);
    let mut sink = Recorder {
        refuse: true,
        ..Recorder::default()
    };

    fake_mut(&mut host).device.reports.push_back(vec![0; 8]);
    assert_eq!(relay.run(&mut host, &mut mouse, &mut sink), RelayError::Sink("endpoint busy"));
}
