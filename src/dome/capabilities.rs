//! What the controller can and cannot do.
//!
//! The firmware only moves in azimuth and has no home sensor or slaving loop; every
//! operation outside that is rejected with [`Capability`] before touching the link.

use serde::Serialize;
use std::fmt;

/// Operations the standard dome surface defines but this controller lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Reading shutter altitude.
    Altitude,
    /// Moving the shutter to an altitude.
    SlewAltitude,
    /// Homing.
    FindHome,
    /// Telescope slaving.
    Slaving,
    /// Raw commands without a reply.
    BlindCommand,
    /// Raw commands with a boolean reply.
    BoolCommand,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Altitude => "altitude",
            Capability::SlewAltitude => "slew to altitude",
            Capability::FindHome => "find home",
            Capability::Slaving => "slaving",
            Capability::BlindCommand => "blind command",
            Capability::BoolCommand => "boolean command",
        };
        f.write_str(name)
    }
}

/// Static capability flags reported to the host.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DomeCapabilities {
    pub can_find_home: bool,
    pub can_park: bool,
    pub can_set_altitude: bool,
    pub can_set_azimuth: bool,
    pub can_set_park: bool,
    pub can_set_shutter: bool,
    pub can_slave: bool,
    pub can_sync_azimuth: bool,
}

impl DomeCapabilities {
    /// Flags for the Photon controller.
    pub const PHOTON: DomeCapabilities = DomeCapabilities {
        can_find_home: false,
        can_park: true,
        can_set_altitude: false,
        can_set_azimuth: true,
        can_set_park: true,
        can_set_shutter: true,
        can_slave: false,
        can_sync_azimuth: true,
    };
}

impl Default for DomeCapabilities {
    fn default() -> Self {
        Self::PHOTON
    }
}
