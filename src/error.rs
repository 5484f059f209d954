//! Custom error types for the dome driver.
//!
//! This module defines the primary error type, `DomeError`, used by every layer of the
//! crate. Using the `thiserror` crate, it gives a single, typed taxonomy for the failures
//! the driver can report, from a missing serial port to a malformed controller reply.
//!
//! ## Error Hierarchy
//!
//! - **`NotConnected`**: an operation was attempted while the driver is not connected.
//!   Raised before any bytes are written.
//! - **`PortUnavailable`**: the serial port could not be claimed.
//! - **`TransportWrite`** / **`TransportRead`**: I/O failures on the open link. Read
//!   failures are retried inside the engine's polling loop and only surface when every
//!   attempt in a budget failed.
//! - **`Timeout`**: no matching reply within the budget. The engine collapses this into an
//!   empty payload; the facade raises it for queries that need a value.
//! - **`ProtocolParse`**: the controller replied, but the payload has the wrong shape.
//! - **`CapabilityNotSupported`**: the operation has no counterpart in the wire protocol.
//! - **`Config`** / **`Configuration`**: profile loading and validation failures.

use crate::dome::Capability;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type DomeResult<T> = std::result::Result<T, DomeError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum DomeError {
    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Serial port '{port}' unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    #[error("Serial write failed: {0}")]
    TransportWrite(#[source] std::io::Error),

    #[error("Serial read failed: {0}")]
    TransportRead(#[source] std::io::Error),

    #[error("No reply to '{command}' within {budget:?}")]
    Timeout { command: String, budget: Duration },

    #[error("Malformed reply to '{command}': payload '{payload}' ({reason})")]
    ProtocolParse {
        command: String,
        payload: String,
        reason: String,
    },

    #[error("Capability not supported: {0}")]
    CapabilityNotSupported(Capability),

    #[error("Unsupported action '{0}'")]
    UnsupportedAction(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize profile: {0}")]
    ProfileSerialize(#[from] toml::ser::Error),

    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    #[error("Blocking worker failed: {0}")]
    Worker(String),
}

impl DomeError {
    /// Whether a fresh `disconnect` + `connect` cycle could plausibly clear the error.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            DomeError::PortUnavailable { .. }
                | DomeError::TransportWrite(_)
                | DomeError::TransportRead(_)
                | DomeError::Timeout { .. }
        )
    }

    pub(crate) fn parse(
        command: impl Into<String>,
        payload: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DomeError::ProtocolParse {
            command: command.into(),
            payload: payload.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_failure_classification() {
        let timeout = DomeError::Timeout {
            command: "DC:AZ".into(),
            budget: Duration::from_millis(5000),
        };
        assert!(timeout.is_link_failure());
        assert!(DomeError::TransportRead(std::io::ErrorKind::BrokenPipe.into()).is_link_failure());

        assert!(!DomeError::NotConnected("get_azimuth".into()).is_link_failure());
        assert!(!DomeError::parse("DC:S", "9", "out of range").is_link_failure());
    }

    #[test]
    fn test_error_messages() {
        let err = DomeError::parse("DC:S", "9", "shutter code out of range");
        assert_eq!(
            err.to_string(),
            "Malformed reply to 'DC:S': payload '9' (shutter code out of range)"
        );

        let err = DomeError::CapabilityNotSupported(Capability::Altitude);
        assert_eq!(err.to_string(), "Capability not supported: altitude");
    }
}
