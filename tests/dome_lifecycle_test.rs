//! Connection lifecycle and the async handle.

use photon_dome::adapters::MockDevice;
use photon_dome::dome::{identity, ConnectionState, DomeCapabilities};
use photon_dome::{AsyncDome, Dome, DomeError};
use std::time::Duration;

#[test]
fn test_disconnect_is_idempotent() {
    let device = MockDevice::simulated();
    let dome = Dome::simulated(&device);

    dome.disconnect();
    dome.connect("SIM").unwrap();
    dome.disconnect();
    dome.disconnect();

    assert_eq!(dome.connection_state(), ConnectionState::Disconnected);
    assert_eq!(dome.port(), None);
    assert_eq!(device.close_count(), 1);
}

#[test]
fn test_connect_twice_keeps_one_transport() {
    let device = MockDevice::simulated();
    let dome = Dome::simulated(&device);

    dome.connect("SIM").unwrap();
    dome.connect("SIM").unwrap();
    assert_eq!(device.open_count(), 1);
    assert_eq!(device.written(), vec!["DC:AZ"]);
}

#[test]
fn test_reconnect_after_disconnect() {
    let device = MockDevice::simulated();
    let dome = Dome::simulated(&device);

    dome.connect("COM1").unwrap();
    dome.slew_to(90.0).unwrap();
    dome.disconnect();
    assert!(matches!(dome.get_azimuth(), Err(DomeError::NotConnected(_))));

    dome.connect("COM2").unwrap();
    assert_eq!(device.last_port().as_deref(), Some("COM2"));
    assert_eq!(dome.cached_state().azimuth, Some(90.0));
}

#[test]
fn test_identity_and_capabilities() {
    assert_eq!(identity::NAME, "Arduino+Photon Dome Controller");
    assert_eq!(
        identity::DESCRIPTION,
        "Arduino+Photon Dome Driver for Explora-Dome"
    );
    assert_eq!(identity::INTERFACE_VERSION, 2);

    let caps = Dome::simulated(&MockDevice::simulated()).capabilities();
    assert_eq!(caps, DomeCapabilities::PHOTON);
    assert!(!caps.can_set_altitude && !caps.can_slave);
    assert!(caps.can_set_shutter && caps.can_set_park && caps.can_set_azimuth);
}

#[tokio::test]
async fn test_async_handle_concurrent_queries() {
    let device = MockDevice::simulated();
    let dome = AsyncDome::new(Dome::simulated(&device));
    dome.connect("SIM").await.unwrap();
    dome.slew_to(45.0).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dome = dome.clone();
            tokio::spawn(async move { dome.get_azimuth().await })
        })
        .collect();
    for handle in handles {
        let azimuth = handle.await.unwrap().unwrap();
        assert!((azimuth - 45.0).abs() < 0.01);
    }
    assert_eq!(device.written().len(), 2 + 8);
}

#[tokio::test]
async fn test_async_action_and_command_string() {
    let device = MockDevice::simulated();
    let dome = AsyncDome::new(Dome::simulated(&device));
    dome.connect("SIM").await.unwrap();

    assert_eq!(dome.action("DC:SETP", "15.00").await.unwrap(), "SETP");
    assert_eq!(dome.action("DC:T", "").await.unwrap(), "12.5");
    assert_eq!(dome.command_string("VS").await.unwrap(), "Photon Dome Simulator 1.0");
    assert!(matches!(
        dome.action("DC:HOME", "").await,
        Err(DomeError::UnsupportedAction(_))
    ));

    dome.wait_for_slew(Duration::from_millis(1), Duration::from_millis(50))
        .await
        .unwrap();
}
