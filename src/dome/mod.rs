//! Arduino+Photon dome facade
//!
//! Protocol Overview:
//! - Format: ASCII line protocol over RS-232/USB-serial
//! - Baud: 57600, 8N1, no flow control
//! - Commands: `DC:<TAG>[:<arg>]`, replies `DCR:<payload>`
//! - Example: `DC:SLEWAZ:183.50` -> `DCR:SLEWAZ`
//!
//! [`Dome`] owns the connection state machine, the [`CommandEngine`] and the cached
//! [`DeviceState`]. All three sit behind one mutex, so concurrent callers are serialized
//! and a command is always paired with its own reply.
//!
//! # Usage
//!
//! ```
//! use photon_dome::adapters::MockDevice;
//! use photon_dome::dome::Dome;
//!
//! # fn main() -> photon_dome::DomeResult<()> {
//! let device = MockDevice::simulated();
//! let dome = Dome::simulated(&device);
//!
//! dome.connect("SIM")?;
//! dome.slew_to(183.5)?;
//! assert!((dome.get_azimuth()? - 183.5).abs() < 0.01);
//! dome.disconnect();
//! # Ok(())
//! # }
//! ```

pub mod async_handle;
pub mod capabilities;
pub mod identity;
pub mod state;

pub use async_handle::AsyncDome;
pub use capabilities::{Capability, DomeCapabilities};
pub use state::{ConnectionState, DeviceState};

use crate::adapters::{Connector, LinkSettings, MockDevice, SerialConnector};
use crate::clock::{Clock, SystemClock};
use crate::engine::{CommandEngine, EngineSettings};
use crate::error::{DomeError, DomeResult};
use crate::protocol::{Command, ReplyKind, ResponsePayload, ShutterState, Tag};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Actions reported to the host, in reporting order.
pub const SUPPORTED_ACTIONS: [&str; 13] = [
    "OS", "CS", "VS", "SS", "SLEWAZ", "SYNCAZ", "STOPSLEW", "SETP", "P", "AZ", "LS", "US", "T",
];

/// Device prefix an action name must carry.
const ACTION_DEVICE: &str = "DC";

/// Tags reachable through [`Dome::action`].
const DISPATCHABLE: [Tag; 14] = [
    Tag::Os,
    Tag::Cs,
    Tag::Ss,
    Tag::Vs,
    Tag::SlewAz,
    Tag::SyncAz,
    Tag::StopAz,
    Tag::StopSlew,
    Tag::SetP,
    Tag::P,
    Tag::Az,
    Tag::Ls,
    Tag::Us,
    Tag::T,
];

struct Inner {
    state: ConnectionState,
    engine: CommandEngine,
    cache: DeviceState,
    port: Option<String>,
}

impl Inner {
    fn run(&mut self, command: &Command) -> DomeResult<ResponsePayload> {
        let budget = self.engine.settings().budget_for(command.tag());
        self.engine.execute(self.state, command, budget)
    }

    /// Run a command whose reply carries a value; an empty reply is a timeout.
    fn query(&mut self, command: &Command) -> DomeResult<ResponsePayload> {
        let payload = self.run(command)?;
        if payload.is_empty() {
            return Err(DomeError::Timeout {
                command: command.frame(),
                budget: self.engine.settings().budget_for(command.tag()),
            });
        }
        Ok(payload)
    }

    /// Run a command whose reply is only an acknowledgement.
    fn act(&mut self, command: &Command) -> DomeResult<()> {
        let payload = self.run(command)?;
        if payload.is_empty() {
            warn!(command = %command, "no acknowledgement from controller");
        }
        Ok(())
    }

    /// Run a raw command and hand back the payload as received.
    fn dispatch(&mut self, command: &Command) -> DomeResult<String> {
        let payload = self.run(command)?;
        if payload.is_empty() {
            match command.tag().reply() {
                ReplyKind::Ack => warn!(command = %command, "no acknowledgement from controller"),
                _ => debug!(command = %command, "empty reply"),
            }
        }
        Ok(payload.into_string())
    }

    fn azimuth(&mut self) -> DomeResult<f64> {
        let command = Command::new(Tag::Az);
        let degrees = self.query(&command)?.azimuth(&command)?;
        Ok(self.cache.record_azimuth(degrees))
    }
}

/// Driver for one dome controller on one serial endpoint.
pub struct Dome {
    connector: Box<dyn Connector>,
    link: LinkSettings,
    inner: Mutex<Inner>,
}

impl Dome {
    /// Driver with default link and engine timing.
    pub fn new(connector: Box<dyn Connector>, clock: Arc<dyn Clock>) -> Self {
        Self::with_settings(
            connector,
            clock,
            LinkSettings::default(),
            EngineSettings::default(),
        )
    }

    /// Driver with explicit timing.
    pub fn with_settings(
        connector: Box<dyn Connector>,
        clock: Arc<dyn Clock>,
        link: LinkSettings,
        engine: EngineSettings,
    ) -> Self {
        Self {
            connector,
            link,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                engine: CommandEngine::new(clock, engine),
                cache: DeviceState::default(),
                port: None,
            }),
        }
    }

    /// Driver for real serial ports on the system clock.
    pub fn serial() -> Self {
        Self::new(Box::new(SerialConnector), Arc::new(SystemClock))
    }

    /// Driver bound to a mock device, sharing its clock.
    pub fn simulated(device: &MockDevice) -> Self {
        Self::new(Box::new(device.clone()), device.clock())
    }

    /// Current lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Whether domain operations are currently allowed.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Port of the current connection.
    pub fn port(&self) -> Option<String> {
        self.inner.lock().port.clone()
    }

    /// Snapshot of the cached device state.
    pub fn cached_state(&self) -> DeviceState {
        self.inner.lock().cache.clone()
    }

    /// Open `port` and verify a controller answers `AZ`.
    ///
    /// Does nothing when already connected on `port`. Asking for a different port while
    /// connected is [`DomeError::InvalidArgument`]; disconnect first.
    #[instrument(skip(self), err)]
    pub fn connect(&self, port: &str) -> DomeResult<()> {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Connected {
            let current = inner.port.clone().unwrap_or_default();
            if current == port {
                debug!("already connected");
                return Ok(());
            }
            warn!(%current, requested = port, "connect refused while connected elsewhere");
            return Err(DomeError::InvalidArgument(format!(
                "already connected on {current}; disconnect before connecting to {port}"
            )));
        }

        inner.state = ConnectionState::Connecting;
        inner.cache = DeviceState::default();

        let transport = match self.connector.open(port, &self.link) {
            Ok(transport) => transport,
            Err(e) => {
                inner.state = ConnectionState::Disconnected;
                return Err(e);
            }
        };
        inner.engine.attach(transport);

        let command = Command::new(Tag::Az);
        let budget = inner.engine.settings().budget;
        let reason = match inner.engine.transact(&command, budget) {
            Ok(payload) if !payload.is_empty() => {
                match payload.azimuth(&command) {
                    Ok(degrees) => {
                        inner.cache.record_azimuth(degrees);
                    }
                    Err(e) => debug!(error = %e, "handshake azimuth not cached"),
                }
                inner.state = ConnectionState::Connected;
                inner.port = Some(port.to_string());
                info!(port, "dome controller connected");
                return Ok(());
            }
            Ok(_) => "empty reply".to_string(),
            Err(e) => e.to_string(),
        };

        inner.engine.detach();
        inner.state = ConnectionState::Disconnected;
        warn!(port, %reason, "controller did not answer handshake");
        Err(DomeError::NotConnected(format!(
            "no controller answered on {port}: {reason}"
        )))
    }

    /// Close the transport, if any. Always ends `Disconnected`.
    pub fn disconnect(&self) {
        let mut inner = self.inner.lock();
        let had_transport = inner.engine.detach();
        inner.state = ConnectionState::Disconnected;
        if let Some(port) = inner.port.take() {
            info!(port = %port, "dome controller disconnected");
        } else if had_transport {
            debug!("transport released");
        }
    }

    /// Current azimuth in degrees, `[0, 360)`.
    #[instrument(skip(self), err)]
    pub fn get_azimuth(&self) -> DomeResult<f64> {
        self.inner.lock().azimuth()
    }

    /// Start a slew to `azimuth` degrees.
    #[instrument(skip(self), err)]
    pub fn slew_to(&self, azimuth: f64) -> DomeResult<()> {
        check_angle(azimuth)?;
        let mut inner = self.inner.lock();
        inner.act(&Command::with_angle(Tag::SlewAz, azimuth))?;
        inner.cache.parked = false;
        Ok(())
    }

    /// Tell the controller its current azimuth is `azimuth`.
    #[instrument(skip(self), err)]
    pub fn sync_to(&self, azimuth: f64) -> DomeResult<()> {
        check_angle(azimuth)?;
        let mut inner = self.inner.lock();
        inner.act(&Command::with_angle(Tag::Saz, azimuth))?;
        inner.cache.record_azimuth(azimuth);
        Ok(())
    }

    /// Start opening the shutter.
    #[instrument(skip(self), err)]
    pub fn open_shutter(&self) -> DomeResult<()> {
        let mut inner = self.inner.lock();
        inner.act(&Command::new(Tag::Os))?;
        inner.cache.shutter = ShutterState::Opening;
        Ok(())
    }

    /// Start closing the shutter.
    #[instrument(skip(self), err)]
    pub fn close_shutter(&self) -> DomeResult<()> {
        let mut inner = self.inner.lock();
        inner.act(&Command::new(Tag::Cs))?;
        inner.cache.shutter = ShutterState::Closing;
        Ok(())
    }

    /// Move to the park position.
    #[instrument(skip(self), err)]
    pub fn park(&self) -> DomeResult<()> {
        let mut inner = self.inner.lock();
        inner.act(&Command::new(Tag::P))?;
        inner.cache.parked = true;
        Ok(())
    }

    /// Make the current azimuth the park position.
    ///
    /// Queries `AZ` first when no azimuth has been observed yet.
    #[instrument(skip(self), err)]
    pub fn set_park(&self) -> DomeResult<()> {
        let mut inner = self.inner.lock();
        let azimuth = match inner.cache.azimuth {
            Some(azimuth) => azimuth,
            None => inner.azimuth()?,
        };
        inner.act(&Command::with_angle(Tag::SetP, azimuth))?;
        inner.cache.record_park_azimuth(azimuth);
        Ok(())
    }

    /// Make `azimuth` the park position.
    #[instrument(skip(self), err)]
    pub fn set_park_to(&self, azimuth: f64) -> DomeResult<()> {
        check_angle(azimuth)?;
        let mut inner = self.inner.lock();
        inner.act(&Command::with_angle(Tag::SetP, azimuth))?;
        inner.cache.record_park_azimuth(azimuth);
        Ok(())
    }

    /// Stop any azimuth motion.
    #[instrument(skip(self), err)]
    pub fn abort_slew(&self) -> DomeResult<()> {
        self.inner.lock().act(&Command::new(Tag::StopSlew))
    }

    /// Shutter position as reported now.
    #[instrument(skip(self), err)]
    pub fn get_shutter_status(&self) -> DomeResult<ShutterState> {
        let mut inner = self.inner.lock();
        let command = Command::new(Tag::S);
        let shutter = inner.query(&command)?.shutter(&command)?;
        inner.cache.shutter = shutter;
        Ok(shutter)
    }

    /// Whether the dome reports itself parked.
    #[instrument(skip(self), err)]
    pub fn is_parked(&self) -> DomeResult<bool> {
        let mut inner = self.inner.lock();
        let command = Command::new(Tag::GetP);
        let parked = inner.query(&command)?.flag(&command)?;
        inner.cache.parked = parked;
        Ok(parked)
    }

    /// Whether the dome is moving in azimuth.
    #[instrument(skip(self), err)]
    pub fn is_slewing(&self) -> DomeResult<bool> {
        let mut inner = self.inner.lock();
        let command = Command::new(Tag::GetSlew);
        inner.query(&command)?.flag(&command)
    }

    /// Firmware version text.
    #[instrument(skip(self), err)]
    pub fn version(&self) -> DomeResult<String> {
        let mut inner = self.inner.lock();
        let command = Command::new(Tag::Vs);
        Ok(inner.query(&command)?.text(&command))
    }

    /// Shutter altitude. Not available on this controller.
    pub fn altitude(&self) -> DomeResult<f64> {
        Err(DomeError::CapabilityNotSupported(Capability::Altitude))
    }

    /// Move the shutter to an altitude. Not available on this controller.
    pub fn slew_to_altitude(&self, _altitude: f64) -> DomeResult<()> {
        Err(DomeError::CapabilityNotSupported(Capability::SlewAltitude))
    }

    /// Home the dome. Not available on this controller.
    pub fn find_home(&self) -> DomeResult<()> {
        Err(DomeError::CapabilityNotSupported(Capability::FindHome))
    }

    /// Always `false`: there is no home sensor.
    pub fn at_home(&self) -> bool {
        false
    }

    /// Always `false`: slaving is not supported.
    pub fn slaved(&self) -> bool {
        false
    }

    /// Enable or disable slaving. Not available on this controller.
    pub fn set_slaved(&self, _slaved: bool) -> DomeResult<()> {
        Err(DomeError::CapabilityNotSupported(Capability::Slaving))
    }

    /// Static capability flags.
    pub fn capabilities(&self) -> DomeCapabilities {
        DomeCapabilities::PHOTON
    }

    /// Action names accepted by [`Dome::action`], without the device prefix.
    pub fn supported_actions(&self) -> &'static [&'static str] {
        &SUPPORTED_ACTIONS
    }

    /// Run a named action (`DC:<TAG>`) and return the raw reply payload.
    ///
    /// Tags that take an argument get `params` appended verbatim. The payload is returned
    /// as received and may be empty.
    #[instrument(skip(self), err)]
    pub fn action(&self, name: &str, params: &str) -> DomeResult<String> {
        let unsupported = || DomeError::UnsupportedAction(name.to_string());
        let (device, action) = name.split_once(':').ok_or_else(unsupported)?;
        if !device.trim().eq_ignore_ascii_case(ACTION_DEVICE) {
            return Err(unsupported());
        }
        let tag = Tag::from_wire(action.trim())
            .filter(|tag| DISPATCHABLE.contains(tag))
            .ok_or_else(unsupported)?;

        let command = if tag.takes_argument() {
            Command::with_args(tag, [params])?
        } else {
            Command::new(tag)
        };
        self.inner.lock().dispatch(&command)
    }

    /// Send `DC:<text>` when `text` starts with a known tag; return the raw payload.
    #[instrument(skip(self), err)]
    pub fn command_string(&self, text: &str) -> DomeResult<String> {
        let command = Command::parse(text)?;
        self.inner.lock().dispatch(&command)
    }

    /// Raw command without a reply. Not available on this controller.
    pub fn command_blind(&self, _text: &str) -> DomeResult<()> {
        Err(DomeError::CapabilityNotSupported(Capability::BlindCommand))
    }

    /// Raw command with a boolean reply. Not available on this controller.
    pub fn command_bool(&self, _text: &str) -> DomeResult<bool> {
        Err(DomeError::CapabilityNotSupported(Capability::BoolCommand))
    }
}

impl std::fmt::Debug for Dome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Dome")
            .field("state", &inner.state)
            .field("port", &inner.port)
            .field("cache", &inner.cache)
            .finish()
    }
}

fn check_angle(degrees: f64) -> DomeResult<()> {
    if degrees.is_finite() {
        Ok(())
    } else {
        Err(DomeError::InvalidArgument(format!(
            "azimuth must be finite, got {degrees}"
        )))
    }
}
