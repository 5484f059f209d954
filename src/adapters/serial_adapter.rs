//! Serial hardware adapter for the dome controller
//!
//! Wraps the `serialport` crate. Reads are blocking with a bounded timeout; the engine
//! decides how often to retry. Without the `instrument_serial` feature the connector
//! still exists but every open fails with [`DomeError::SerialFeatureDisabled`].

use super::{Connector, LinkSettings, Transport};
use crate::error::{DomeError, DomeResult};
use crate::protocol::ResponseLine;
use std::time::Duration;

#[cfg(feature = "instrument_serial")]
use {
    super::LINE_TERMINATOR,
    serialport::SerialPort,
    std::io::{Read, Write},
    std::time::Instant,
    tracing::{debug, trace},
};

/// Longest partial line kept while waiting for a terminator.
pub const MAX_PENDING: usize = 4096;

/// Opens [`SerialTransport`]s on real ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    #[cfg(feature = "instrument_serial")]
    fn open(&self, port: &str, settings: &LinkSettings) -> DomeResult<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(port, settings)?))
    }

    #[cfg(not(feature = "instrument_serial"))]
    fn open(&self, _port: &str, _settings: &LinkSettings) -> DomeResult<Box<dyn Transport>> {
        Err(DomeError::SerialFeatureDisabled)
    }
}

/// One claimed serial port.
pub struct SerialTransport {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    port_name: String,

    /// Read timeout ceiling
    read_timeout: Duration,

    /// Bytes received after the last complete line
    pending: LineBuffer,

    #[cfg(feature = "instrument_serial")]
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open `port_name` at the configured baud rate, 8N1, no flow control.
    #[cfg(feature = "instrument_serial")]
    pub fn open(port_name: &str, settings: &LinkSettings) -> DomeResult<Self> {
        let port = serialport::new(port_name, settings.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| DomeError::PortUnavailable {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;

        debug!(port = port_name, baud = settings.baud_rate, "serial port opened");

        Ok(Self {
            port_name: port_name.to_string(),
            read_timeout: settings.read_timeout,
            pending: LineBuffer::default(),
            port: Some(port),
        })
    }

    /// Open `port_name`; always fails without serial support compiled in.
    #[cfg(not(feature = "instrument_serial"))]
    pub fn open(_port_name: &str, _settings: &LinkSettings) -> DomeResult<Self> {
        Err(DomeError::SerialFeatureDisabled)
    }
}

#[cfg(feature = "instrument_serial")]
impl Transport for SerialTransport {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn write_line(&mut self, line: &str) -> DomeResult<()> {
        let port = self.port.as_mut().ok_or_else(|| {
            DomeError::TransportWrite(std::io::ErrorKind::NotConnected.into())
        })?;

        let framed = format!("{}{}", line, LINE_TERMINATOR);
        port.write_all(framed.as_bytes())
            .map_err(DomeError::TransportWrite)?;
        port.flush().map_err(DomeError::TransportWrite)?;

        trace!(port = %self.port_name, line, "wrote line");
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> DomeResult<Option<ResponseLine>> {
        if let Some(line) = self.pending.take_line() {
            return Ok(Some(line));
        }
        let deadline = Instant::now() + timeout.min(self.read_timeout);
        self.read_until(deadline)
    }

    fn discard_input(&mut self) -> DomeResult<()> {
        let port = self.port.as_mut().ok_or_else(|| {
            DomeError::TransportRead(std::io::ErrorKind::NotConnected.into())
        })?;
        port.clear(serialport::ClearBuffer::Input)
            .map_err(|e| DomeError::TransportRead(e.into()))?;
        if !self.pending.is_empty() {
            trace!(port = %self.port_name, bytes = self.pending.len(), "dropping stale input");
            self.pending.clear();
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            self.pending.clear();
            debug!(port = %self.port_name, "serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

#[cfg(feature = "instrument_serial")]
impl SerialTransport {
    /// Keep reading until a line completes or `deadline` passes.
    fn read_until(&mut self, deadline: Instant) -> DomeResult<Option<ResponseLine>> {
        let mut buffer = [0u8; 256];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let port = self.port.as_mut().ok_or_else(|| {
                DomeError::TransportRead(std::io::ErrorKind::NotConnected.into())
            })?;
            port.set_timeout(remaining)
                .map_err(|e| DomeError::TransportRead(e.into()))?;
            match port.read(&mut buffer) {
                Ok(n) => {
                    let dropped = self.pending.extend(&buffer[..n]);
                    if dropped > 0 {
                        debug!(port = %self.port_name, dropped, "unterminated input over limit");
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(DomeError::TransportRead(e)),
            }
            if let Some(line) = self.pending.take_line() {
                return Ok(Some(line));
            }
        }
    }
}

#[cfg(not(feature = "instrument_serial"))]
impl Transport for SerialTransport {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn write_line(&mut self, _line: &str) -> DomeResult<()> {
        Err(DomeError::SerialFeatureDisabled)
    }

    fn read_line(&mut self, _timeout: Duration) -> DomeResult<Option<ResponseLine>> {
        Err(DomeError::SerialFeatureDisabled)
    }

    fn discard_input(&mut self) -> DomeResult<()> {
        Err(DomeError::SerialFeatureDisabled)
    }

    fn close(&mut self) {
        self.pending.clear();
    }

    fn is_open(&self) -> bool {
        false
    }
}

/// Received bytes not yet split into lines, bounded by [`MAX_PENDING`].
#[derive(Debug, Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

#[cfg_attr(not(feature = "instrument_serial"), allow(dead_code))]
impl LineBuffer {
    /// Append `data`; returns how many of the oldest bytes were dropped to stay in bounds.
    ///
    /// Only an unterminated tail can exceed the bound, since complete lines are taken
    /// before more input is read.
    fn extend(&mut self, data: &[u8]) -> usize {
        self.bytes.extend_from_slice(data);
        let last_line_start = self
            .bytes
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |end| end + 1);
        let tail = self.bytes.len() - last_line_start;
        if tail <= MAX_PENDING {
            return 0;
        }
        let excess = tail - MAX_PENDING;
        self.bytes.drain(last_line_start..last_line_start + excess);
        excess
    }

    /// Take one complete line, if there is one.
    fn take_line(&mut self) -> Option<ResponseLine> {
        let end = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=end).collect();
        Some(ResponseLine::parse(String::from_utf8_lossy(&line[..end]).into_owned()))
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port_name", &self.port_name)
            .field("read_timeout", &self.read_timeout)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_is_unavailable() {
        let result = SerialConnector.open("/dev/photon-dome-does-not-exist", &LinkSettings::default());
        #[cfg(feature = "instrument_serial")]
        assert!(matches!(result, Err(DomeError::PortUnavailable { .. })));
        #[cfg(not(feature = "instrument_serial"))]
        assert!(matches!(result, Err(DomeError::SerialFeatureDisabled)));
    }

    #[test]
    fn test_line_buffer_splits_lines() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.extend(b"DCR:45.00\r\nDCR:"), 0);
        assert_eq!(buffer.take_line().unwrap().payload(), "45.00");
        assert!(buffer.take_line().is_none());
        buffer.extend(b"OS\n");
        assert_eq!(buffer.take_line().unwrap().raw(), "DCR:OS");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_unterminated_input_is_bounded() {
        let mut buffer = LineBuffer::default();
        assert_eq!(buffer.extend(&[b'x'; MAX_PENDING]), 0);
        assert_eq!(buffer.extend(b"yyDCR:90.00"), 11);
        assert_eq!(buffer.len(), MAX_PENDING);

        buffer.extend(b"\n");
        let line = buffer.take_line().unwrap();
        assert!(line.raw().ends_with("yyDCR:90.00"));
        assert_eq!(line.raw().len(), MAX_PENDING);
    }
}
