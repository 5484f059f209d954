//! Connection lifecycle and the cached view of the dome.

use crate::protocol::{normalize_azimuth, ShutterState};
use std::fmt;

/// Link lifecycle owned by the facade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No transport held.
    #[default]
    Disconnected,
    /// Transport open, handshake in progress.
    Connecting,
    /// Handshake answered; domain operations allowed.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Last values observed from, or commanded to, the controller.
///
/// Refreshed only by the matching query; stale in between.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    /// Degrees in `[0, 360)`; `None` until first observed.
    pub azimuth: Option<f64>,
    /// `Unknown` until first observed.
    pub shutter: ShutterState,
    /// Last reported or commanded park flag.
    pub parked: bool,
    /// Degrees in `[0, 360)`; `None` until set.
    pub park_azimuth: Option<f64>,
}

impl DeviceState {
    pub(crate) fn record_azimuth(&mut self, degrees: f64) -> f64 {
        let degrees = normalize_azimuth(degrees);
        self.azimuth = Some(degrees);
        degrees
    }

    pub(crate) fn record_park_azimuth(&mut self, degrees: f64) {
        self.park_azimuth = Some(normalize_azimuth(degrees));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_is_unobserved() {
        let state = DeviceState::default();
        assert_eq!(state.azimuth, None);
        assert_eq!(state.shutter, ShutterState::Unknown);
        assert!(!state.parked);
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_recorded_angles_are_normalized() {
        let mut state = DeviceState::default();
        assert_eq!(state.record_azimuth(-45.0), 315.0);
        state.record_park_azimuth(360.0);
        assert_eq!(state.azimuth, Some(315.0));
        assert_eq!(state.park_azimuth, Some(0.0));
    }
}
