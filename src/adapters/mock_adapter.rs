//! Mock dome controller for testing
//!
//! [`MockDevice`] stands in for the serial port and the firmware behind it. It provides:
//! - A simulated dome that answers the full command catalog
//! - Silent and custom responders for timeout and parse scenarios
//! - Controllable failure injection (open, write, read)
//! - Call logging for test verification
//!
//! Time only passes through the injected [`Clock`]: a read that finds nothing sleeps the
//! full read timeout on it, so a [`ManualClock`] runs a 5 s budget instantly.

use super::{Connector, LinkSettings, Transport, LINE_TERMINATOR};
use crate::clock::{Clock, ManualClock};
use crate::error::{DomeError, DomeResult};
use crate::protocol::{normalize_azimuth, ResponseLine, Tag, COMMAND_ENVELOPE, FIELD_SEPARATOR};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

type ReplyFn = Box<dyn FnMut(&str) -> Vec<String> + Send>;

enum Responder {
    Simulated(SimulatedDome),
    Silent,
    Custom(ReplyFn),
}

struct MockState {
    responder: Responder,
    inbox: VecDeque<String>,
    written: Vec<String>,
    bytes_written: usize,
    fail_next_open: bool,
    fail_writes: bool,
    read_failures: Option<usize>,
    open: bool,
    opens: usize,
    closes: usize,
    last_port: Option<String>,
}

/// Shared handle to a mock controller. Clones observe the same device.
///
/// # Example
///
/// ```
/// use photon_dome::adapters::{Connector, LinkSettings, MockDevice, Transport};
/// use std::time::Duration;
///
/// let device = MockDevice::simulated();
/// let mut link = device.open("SIM", &LinkSettings::default()).unwrap();
/// link.write_line("DC:AZ").unwrap();
/// let reply = link.read_line(Duration::from_millis(100)).unwrap().unwrap();
/// assert_eq!(reply.raw(), "DCR:0.00");
/// ```
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
    clock: Arc<dyn Clock>,
}

impl MockDevice {
    fn with_responder(responder: Responder, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                responder,
                inbox: VecDeque::new(),
                written: Vec::new(),
                bytes_written: 0,
                fail_next_open: false,
                fail_writes: false,
                read_failures: Some(0),
                open: false,
                opens: 0,
                closes: 0,
                last_port: None,
            })),
            clock,
        }
    }

    /// Simulated dome on a fresh [`ManualClock`].
    pub fn simulated() -> Self {
        Self::simulated_with(SimulatedDome::default())
    }

    /// Simulated dome with a preset mechanical state.
    pub fn simulated_with(dome: SimulatedDome) -> Self {
        Self::with_responder(Responder::Simulated(dome), Arc::new(ManualClock::new()))
    }

    /// Device that accepts every write and never answers.
    pub fn silent() -> Self {
        Self::with_responder(Responder::Silent, Arc::new(ManualClock::new()))
    }

    /// Device whose replies are produced by `reply` for each written line.
    pub fn responding<F>(reply: F) -> Self
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        Self::with_responder(Responder::Custom(Box::new(reply)), Arc::new(ManualClock::new()))
    }

    /// Replace the clock reads sleep on.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Clock this device sleeps on; hand the same one to the driver.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Queue a raw line for the next read, as if it arrived unsolicited.
    ///
    /// The engine drops queued input before writing each command, so this models a late
    /// or spontaneous line rather than an answer to the next command.
    pub fn push_line(&self, line: impl Into<String>) {
        self.state.lock().inbox.push_back(line.into());
    }

    /// Make the next `open` fail with `PortUnavailable`.
    pub fn fail_next_open(&self) {
        self.state.lock().fail_next_open = true;
    }

    /// Make every write fail until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Fail the next `count` reads.
    pub fn fail_reads(&self, count: usize) {
        self.state.lock().read_failures = Some(count);
    }

    /// Fail every read until [`MockDevice::fail_reads`] resets it.
    pub fn fail_all_reads(&self) {
        self.state.lock().read_failures = None;
    }

    /// Every line written so far, without terminators.
    pub fn written(&self) -> Vec<String> {
        self.state.lock().written.clone()
    }

    /// Total bytes written, terminators included.
    pub fn bytes_written(&self) -> usize {
        self.state.lock().bytes_written
    }

    /// Clear the write log.
    pub fn clear_written(&self) {
        let mut state = self.state.lock();
        state.written.clear();
        state.bytes_written = 0;
    }

    /// Whether a transport is currently open on this device.
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Successful opens so far.
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    /// Closes so far.
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Port name of the most recent successful open.
    pub fn last_port(&self) -> Option<String> {
        self.state.lock().last_port.clone()
    }

    /// Snapshot of the simulated mechanics, if this is a simulated device.
    pub fn dome(&self) -> Option<SimulatedDome> {
        match &self.state.lock().responder {
            Responder::Simulated(dome) => Some(dome.clone()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockDevice")
            .field("open", &state.open)
            .field("written", &state.written.len())
            .field("pending", &state.inbox.len())
            .finish()
    }
}

impl Connector for MockDevice {
    fn open(&self, port: &str, _settings: &LinkSettings) -> DomeResult<Box<dyn Transport>> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_open) {
            return Err(DomeError::PortUnavailable {
                port: port.to_string(),
                reason: "mock open failure".to_string(),
            });
        }
        state.open = true;
        state.opens += 1;
        state.last_port = Some(port.to_string());
        tracing::debug!(port, "mock transport opened");

        Ok(Box::new(MockTransport {
            port_name: port.to_string(),
            device: self.clone(),
            open: true,
        }))
    }
}

/// Transport end of a [`MockDevice`].
pub struct MockTransport {
    port_name: String,
    device: MockDevice,
    open: bool,
}

impl Transport for MockTransport {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn write_line(&mut self, line: &str) -> DomeResult<()> {
        if !self.open {
            return Err(DomeError::TransportWrite(std::io::ErrorKind::NotConnected.into()));
        }
        let mut state = self.device.state.lock();
        if state.fail_writes {
            return Err(DomeError::TransportWrite(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }
        state.written.push(line.to_string());
        state.bytes_written += line.len() + LINE_TERMINATOR.len();

        let replies = match &mut state.responder {
            Responder::Simulated(dome) => dome.handle(line).into_iter().collect(),
            Responder::Silent => Vec::new(),
            Responder::Custom(reply) => reply(line),
        };
        state.inbox.extend(replies);
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> DomeResult<Option<ResponseLine>> {
        if !self.open {
            return Err(DomeError::TransportRead(std::io::ErrorKind::NotConnected.into()));
        }
        let line = {
            let mut state = self.device.state.lock();
            match state.read_failures {
                None => return Err(read_failure()),
                Some(n) if n > 0 => {
                    state.read_failures = Some(n - 1);
                    return Err(read_failure());
                }
                Some(_) => state.inbox.pop_front(),
            }
        };
        match line {
            Some(line) => Ok(Some(ResponseLine::parse(line))),
            None => {
                self.device.clock.sleep(timeout);
                Ok(None)
            }
        }
    }

    fn discard_input(&mut self) -> DomeResult<()> {
        if !self.open {
            return Err(DomeError::TransportRead(std::io::ErrorKind::NotConnected.into()));
        }
        self.device.state.lock().inbox.clear();
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            let mut state = self.device.state.lock();
            state.open = false;
            state.closes += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_failure() -> DomeError {
    DomeError::TransportRead(std::io::Error::new(
        std::io::ErrorKind::Other,
        "mock read failure",
    ))
}

/// Firmware-level model of the dome: answers every catalog command.
///
/// Motion completes instantly. Lines without the command envelope, unknown tags and
/// malformed arguments get no reply at all, which is what the real controller does.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedDome {
    /// Current azimuth in degrees.
    pub azimuth: f64,
    /// Park azimuth in degrees.
    pub park_azimuth: f64,
    /// Wire shutter code (0 open .. 4 error).
    pub shutter_code: u8,
    /// At the park position.
    pub parked: bool,
    /// Reported by `GETSLEW`.
    pub slewing: bool,
    /// Reported by `VS`.
    pub firmware: String,
    /// Reported by `T`.
    pub temperature: f64,
}

impl Default for SimulatedDome {
    fn default() -> Self {
        Self {
            azimuth: 0.0,
            park_azimuth: 0.0,
            shutter_code: 1,
            parked: false,
            slewing: false,
            firmware: "Photon Dome Simulator 1.0".to_string(),
            temperature: 12.5,
        }
    }
}

impl SimulatedDome {
    /// Reply lines for one written line.
    pub fn handle(&mut self, line: &str) -> Option<String> {
        let mut fields = line.trim().split(FIELD_SEPARATOR);
        if fields.next()? != COMMAND_ENVELOPE {
            return None;
        }
        let tag = Tag::from_wire(fields.next()?)?;
        let arg = fields.next();

        let angle = || -> Option<f64> {
            let value: f64 = arg?.trim().parse().ok()?;
            value.is_finite().then(|| normalize_azimuth(value))
        };

        let payload = match tag {
            Tag::Os => {
                self.shutter_code = 0;
                tag.wire().to_string()
            }
            Tag::Cs => {
                self.shutter_code = 1;
                tag.wire().to_string()
            }
            Tag::Ss | Tag::S | Tag::Ls | Tag::Us => self.shutter_code.to_string(),
            Tag::Vs => self.firmware.clone(),
            Tag::Az => format!("{:.2}", self.azimuth),
            Tag::SlewAz => {
                self.azimuth = angle()?;
                self.parked = false;
                tag.wire().to_string()
            }
            Tag::SyncAz | Tag::Saz => {
                self.azimuth = angle()?;
                tag.wire().to_string()
            }
            Tag::StopSlew | Tag::StopAz => {
                self.slewing = false;
                tag.wire().to_string()
            }
            Tag::SetP => {
                self.park_azimuth = angle()?;
                tag.wire().to_string()
            }
            Tag::P => {
                self.azimuth = self.park_azimuth;
                self.parked = true;
                tag.wire().to_string()
            }
            Tag::GetP => self.parked.to_string(),
            Tag::GetSlew => self.slewing.to_string(),
            Tag::T => format!("{:.1}", self.temperature),
        };
        Some(format!("DCR:{payload}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(device: &MockDevice) -> Box<dyn Transport> {
        device.open("SIM", &LinkSettings::default()).unwrap()
    }

    #[test]
    fn test_simulated_dome_round_trip() {
        let device = MockDevice::simulated();
        let mut link = open(&device);

        link.write_line("DC:SLEWAZ:183.50").unwrap();
        assert_eq!(
            link.read_line(Duration::from_secs(1)).unwrap().unwrap().raw(),
            "DCR:SLEWAZ"
        );
        link.write_line("DC:AZ").unwrap();
        assert_eq!(
            link.read_line(Duration::from_secs(1)).unwrap().unwrap().payload(),
            "183.50"
        );
        assert_eq!(device.written(), vec!["DC:SLEWAZ:183.50", "DC:AZ"]);
        assert_eq!(device.bytes_written(), "DC:SLEWAZ:183.50\nDC:AZ\n".len());
    }

    #[test]
    fn test_simulated_dome_ignores_unknown_and_malformed() {
        let mut dome = SimulatedDome::default();
        assert_eq!(dome.handle("DC:FINDHOME"), None);
        assert_eq!(dome.handle("XX:AZ"), None);
        assert_eq!(dome.handle("DC:SLEWAZ:north"), None);
        assert_eq!(dome.handle("DC:SLEWAZ"), None);
        assert_eq!(dome.handle("DC:GETP").as_deref(), Some("DCR:false"));
    }

    #[test]
    fn test_park_moves_to_park_azimuth() {
        let mut dome = SimulatedDome::default();
        dome.handle("DC:SETP:90.00");
        dome.handle("DC:P");
        assert_eq!(dome.azimuth, 90.0);
        assert!(dome.parked);
    }

    #[test]
    fn test_silent_read_sleeps_on_clock() {
        let clock = ManualClock::new();
        let device = MockDevice::silent().with_clock(Arc::new(clock.clone()));
        let mut link = open(&device);

        link.write_line("DC:AZ").unwrap();
        assert!(link.read_line(Duration::from_millis(1000)).unwrap().is_none());
        assert_eq!(clock.elapsed(), Duration::from_millis(1000));
    }

    #[test]
    fn test_failure_injection_is_one_shot() {
        let device = MockDevice::simulated();

        device.fail_next_open();
        assert!(matches!(
            device.open("SIM", &LinkSettings::default()),
            Err(DomeError::PortUnavailable { .. })
        ));
        assert_eq!(device.open_count(), 0);

        let mut link = open(&device);
        device.fail_reads(1);
        assert!(matches!(
            link.read_line(Duration::from_millis(10)),
            Err(DomeError::TransportRead(_))
        ));
        assert!(link.read_line(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn test_close_is_idempotent_and_counted() {
        let device = MockDevice::simulated();
        let mut link = open(&device);
        assert!(device.is_open());

        link.close();
        link.close();
        drop(link);
        assert!(!device.is_open());
        assert_eq!(device.close_count(), 1);
    }
}
