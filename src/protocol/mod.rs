//! Wire protocol between the driver and the dome controller.
//!
//! The link is line-oriented ASCII. Every outbound line carries the command envelope and
//! every reply the driver accepts carries the response envelope:
//!
//! ```text
//! -> DC:SLEWAZ:183.50
//! <- DCR:SLEWAZ
//! -> DC:AZ
//! <- DCR:183.50
//! ```
//!
//! - [`command`]: the closed tag catalog and command framing
//! - [`response`]: reply lines, payloads and typed payload decoding

pub mod command;
pub mod response;

pub use command::{Command, ReplyKind, Tag};
pub use response::{ResponseLine, ResponsePayload, ShutterState};

/// Envelope tag on every outbound command line.
pub const COMMAND_ENVELOPE: &str = "DC";

/// Envelope tag on every reply the engine accepts.
pub const RESPONSE_ENVELOPE: &str = "DCR";

/// Separator between envelope, tag and arguments.
pub const FIELD_SEPARATOR: char = ':';

/// Wrap an angle into `[0, 360)`.
///
/// Non-finite input is returned unchanged; callers reject it before it reaches the wire.
pub fn normalize_azimuth(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return degrees;
    }
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.0
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_azimuth() {
        assert_eq!(normalize_azimuth(0.0), 0.0);
        assert_eq!(normalize_azimuth(359.5), 359.5);
        assert_eq!(normalize_azimuth(360.0), 0.0);
        assert_eq!(normalize_azimuth(370.25), 10.25);
        assert_eq!(normalize_azimuth(-90.0), 270.0);
        assert_eq!(normalize_azimuth(-1e-20), 0.0);
        assert!(normalize_azimuth(f64::NAN).is_nan());
    }
}
