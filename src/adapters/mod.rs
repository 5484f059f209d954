//! Byte-level links to the dome controller.
//!
//! A [`Connector`] claims a port by name and hands back a [`Transport`]; the engine only
//! ever talks to the trait objects, so the real serial port and the simulated device are
//! interchangeable.
//!
//! - [`serial_adapter`]: RS-232/USB-serial via the `serialport` crate
//! - [`mock_adapter`]: in-memory device with call logging and fault injection

use crate::error::DomeResult;
use crate::protocol::ResponseLine;
use std::time::Duration;

pub mod mock_adapter;
pub mod serial_adapter;

pub use mock_adapter::{MockDevice, SimulatedDome};
pub use serial_adapter::{SerialConnector, SerialTransport};

/// Controller link speed.
pub const BAUD_RATE: u32 = 57_600;

/// Default blocking read timeout for one line.
pub const READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Appended to every outbound line.
pub const LINE_TERMINATOR: &str = "\n";

/// Line settings applied when a port is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Baud rate (8N1, no flow control).
    pub baud_rate: u32,
    /// Upper bound for a single `read_line` call.
    pub read_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: BAUD_RATE,
            read_timeout: READ_TIMEOUT,
        }
    }
}

/// An open, line-oriented link.
pub trait Transport: Send {
    /// Port identifier this transport was opened on.
    fn port_name(&self) -> &str;

    /// Write `line` plus terminator and flush.
    fn write_line(&mut self, line: &str) -> DomeResult<()>;

    /// Block for up to `timeout` for one complete line.
    ///
    /// `Ok(None)` means nothing complete arrived in time; partial input is kept for the
    /// next call.
    fn read_line(&mut self, timeout: Duration) -> DomeResult<Option<ResponseLine>>;

    /// Drop everything received but not yet read, partial lines included.
    fn discard_input(&mut self) -> DomeResult<()>;

    /// Release the port. Safe to call more than once.
    fn close(&mut self);

    /// Whether the port is still held.
    fn is_open(&self) -> bool;
}

/// Opens transports by port name.
pub trait Connector: Send + Sync {
    /// Claim `port` with the given line settings.
    fn open(&self, port: &str, settings: &LinkSettings) -> DomeResult<Box<dyn Transport>>;
}
