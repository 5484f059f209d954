//! Protocol-level behaviour of the dome driver against the mock controller.
//!
//! Every test runs on a `ManualClock`, so full reply budgets elapse instantly.

use photon_dome::adapters::{Connector, LinkSettings, MockDevice, SimulatedDome};
use photon_dome::clock::ManualClock;
use photon_dome::dome::{ConnectionState, Dome};
use photon_dome::engine::{CommandEngine, EngineSettings, DEFAULT_BUDGET};
use photon_dome::protocol::{Command, ShutterState, Tag};
use photon_dome::DomeError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Device answering every line from a fixed reply list, keyed by the written frame.
fn scripted(replies: &'static [(&'static str, &'static str)]) -> MockDevice {
    MockDevice::responding(move |line| {
        replies
            .iter()
            .filter(|(frame, _)| *frame == line)
            .map(|(_, reply)| reply.to_string())
            .collect()
    })
}

#[test]
fn test_disconnected_commands_write_nothing() {
    let device = MockDevice::simulated();
    let mut engine = CommandEngine::new(device.clock(), EngineSettings::default());
    engine.attach(device.open("SIM", &LinkSettings::default()).unwrap());

    for tag in Tag::ALL {
        let result =
            engine.execute(ConnectionState::Disconnected, &Command::new(tag), DEFAULT_BUDGET);
        assert!(matches!(result, Err(DomeError::NotConnected(_))), "{tag}");
    }
    assert_eq!(device.bytes_written(), 0);
}

#[test]
fn test_facade_operations_require_connection() {
    let device = MockDevice::simulated();
    let dome = Dome::simulated(&device);

    assert!(matches!(dome.get_azimuth(), Err(DomeError::NotConnected(_))));
    assert!(matches!(dome.slew_to(10.0), Err(DomeError::NotConnected(_))));
    assert!(matches!(dome.open_shutter(), Err(DomeError::NotConnected(_))));
    assert!(matches!(dome.is_parked(), Err(DomeError::NotConnected(_))));
    assert!(matches!(dome.action("DC:AZ", ""), Err(DomeError::NotConnected(_))));
    assert_eq!(device.bytes_written(), 0);
    assert_eq!(device.open_count(), 0);
}

#[test]
fn test_cached_azimuth_is_normalized() {
    for reported in ["0.00", "359.99", "360.00", "725.50", "-15.00", "AZ:-0.01"] {
        let reply = format!("DCR:{reported}");
        let device = MockDevice::responding(move |line| {
            if line == "DC:AZ" {
                vec![reply.clone()]
            } else {
                Vec::new()
            }
        });
        let dome = Dome::simulated(&device);
        dome.connect("SIM").unwrap();

        let azimuth = dome.get_azimuth().unwrap();
        assert!((0.0..360.0).contains(&azimuth), "{reported} -> {azimuth}");
        assert_eq!(dome.cached_state().azimuth, Some(azimuth));
    }
}

#[test]
fn test_slew_target_round_trips_within_precision() {
    let device = MockDevice::simulated();
    let dome = Dome::simulated(&device);
    dome.connect("SIM").unwrap();

    for target in [0.0, 0.004, 12.345, 183.5, 271.999, 359.994] {
        dome.slew_to(target).unwrap();
        let read_back = dome.get_azimuth().unwrap();
        assert!((read_back - target).abs() <= 0.01, "{target} -> {read_back}");
    }

    // 359.999 rounds to the full turn and wraps
    dome.slew_to(359.999).unwrap();
    assert_eq!(device.written().last().unwrap(), "DC:SLEWAZ:0.00");
}

#[test]
fn test_silent_budget_returns_empty_payload() {
    let clock = ManualClock::new();
    let device = MockDevice::silent().with_clock(Arc::new(clock.clone()));
    let mut engine = CommandEngine::new(device.clock(), EngineSettings::default());
    engine.attach(device.open("SIM", &LinkSettings::default()).unwrap());

    let payload = engine
        .execute(ConnectionState::Connected, &Command::new(Tag::GetSlew), DEFAULT_BUDGET)
        .unwrap();
    assert!(payload.is_empty());
    assert!(clock.elapsed() >= DEFAULT_BUDGET);
}

#[test]
fn test_noise_interleaved_with_reply() {
    let device = MockDevice::responding(|line| match line {
        "DC:AZ" => ["Photon booting...", "", "DBG:encoder 1234", "DCRX:nope", "DCR:45.00"]
            .map(String::from)
            .to_vec(),
        _ => Vec::new(),
    });
    let dome = Dome::simulated(&device);
    dome.connect("SIM").unwrap();

    assert_eq!(dome.get_azimuth().unwrap(), 45.0);
}

#[test]
fn test_late_reply_is_not_taken_for_the_next_answer() {
    let device = scripted(&[("DC:AZ", "DCR:180.00")]);
    let dome = Dome::simulated(&device);
    dome.connect("SIM").unwrap();

    assert!(matches!(
        dome.get_shutter_status(),
        Err(DomeError::Timeout { .. })
    ));
    // shutter code arriving after its budget ran out
    device.push_line("DCR:2");

    assert_eq!(dome.get_azimuth().unwrap(), 180.0);
    assert_eq!(dome.cached_state().azimuth, Some(180.0));
    assert_eq!(dome.cached_state().shutter, ShutterState::Unknown);
}

#[test]
fn test_connect_scenario_caches_azimuth() {
    let device = scripted(&[("DC:AZ", "DCR:45.00")]);
    let dome = Dome::simulated(&device);

    dome.connect("COM3").unwrap();
    assert_eq!(dome.connection_state(), ConnectionState::Connected);
    assert_eq!(dome.port().as_deref(), Some("COM3"));
    assert_eq!(dome.cached_state().azimuth, Some(45.0));

    assert_eq!(dome.get_azimuth().unwrap(), 45.0);
    assert_eq!(dome.cached_state().azimuth, Some(45.0));
}

#[test]
fn test_connect_to_silent_device_fails() {
    let device = MockDevice::silent();
    let dome = Dome::simulated(&device);

    let result = dome.connect("COM3");
    assert!(matches!(result, Err(DomeError::NotConnected(_))));
    assert_eq!(dome.connection_state(), ConnectionState::Disconnected);
    assert!(!device.is_open());
    assert_eq!(device.close_count(), 1);
    assert_eq!(device.written(), vec!["DC:AZ"]);
}

#[test]
fn test_connect_open_failure_is_port_unavailable() {
    let device = MockDevice::simulated();
    device.fail_next_open();
    let dome = Dome::simulated(&device);

    assert!(matches!(
        dome.connect("COM9"),
        Err(DomeError::PortUnavailable { .. })
    ));
    assert_eq!(dome.connection_state(), ConnectionState::Disconnected);

    dome.connect("COM9").unwrap();
    assert!(dome.is_connected());
}

#[test]
fn test_slew_sends_exact_frame() {
    let device = MockDevice::simulated();
    let dome = Dome::simulated(&device);
    dome.connect("SIM").unwrap();
    device.clear_written();

    dome.slew_to(183.5).unwrap();
    assert_eq!(device.written(), vec!["DC:SLEWAZ:183.50"]);
}

#[test]
fn test_shutter_codes() {
    let code = Arc::new(Mutex::new("2"));
    let shared = Arc::clone(&code);
    let device = MockDevice::responding(move |line| match line {
        "DC:AZ" => vec!["DCR:0.00".to_string()],
        "DC:S" => vec![format!("DCR:{}", shared.lock().unwrap())],
        _ => Vec::new(),
    });
    let dome = Dome::simulated(&device);
    dome.connect("SIM").unwrap();

    assert_eq!(dome.get_shutter_status().unwrap(), ShutterState::Opening);
    assert_eq!(dome.cached_state().shutter, ShutterState::Opening);

    *code.lock().unwrap() = "9";
    assert!(matches!(
        dome.get_shutter_status(),
        Err(DomeError::ProtocolParse { .. })
    ));
    assert_eq!(dome.cached_state().shutter, ShutterState::Opening);
}

#[test]
fn test_persistent_read_failure_surfaces() {
    let device = MockDevice::simulated();
    let dome = Dome::simulated(&device);
    dome.connect("SIM").unwrap();

    device.fail_all_reads();
    assert!(matches!(dome.get_azimuth(), Err(DomeError::TransportRead(_))));

    device.fail_reads(3);
    assert_eq!(dome.get_azimuth().unwrap(), 0.0);
}

#[test]
fn test_motion_budget_applies_to_slew() {
    let clock = ManualClock::new();
    let device = MockDevice::responding(|line| {
        if line == "DC:AZ" {
            vec!["DCR:0.00".to_string()]
        } else {
            Vec::new()
        }
    })
    .with_clock(Arc::new(clock.clone()));
    let settings = EngineSettings {
        motion_budget: Duration::from_secs(20),
        ..Default::default()
    };
    let dome = Dome::with_settings(
        Box::new(device.clone()),
        device.clock(),
        LinkSettings::default(),
        settings,
    );
    dome.connect("SIM").unwrap();

    let before = clock.elapsed();
    dome.slew_to(90.0).unwrap();
    assert!(clock.elapsed() - before >= Duration::from_secs(20));
}

#[test]
fn test_simulated_park_sequence() {
    let device = MockDevice::simulated_with(SimulatedDome {
        azimuth: 42.0,
        ..Default::default()
    });
    let dome = Dome::simulated(&device);
    dome.connect("SIM").unwrap();

    dome.set_park().unwrap();
    dome.slew_to(200.0).unwrap();
    assert!(!dome.is_parked().unwrap());

    dome.park().unwrap();
    assert!(dome.is_parked().unwrap());
    assert!((dome.get_azimuth().unwrap() - 42.0).abs() < 0.01);
    assert_eq!(device.dome().unwrap().park_azimuth, 42.0);
}
