//! Command/response engine.
//!
//! Frames a [`Command`], writes it, then polls the transport for the `DCR` reply within a
//! time budget. Everything else the controller prints (boot banners, debug chatter,
//! replies without the envelope) is dropped. One command is in flight at a time: the
//! engine is driven through `&mut self` and never pipelines.
//!
//! The polling loop never reads the system time directly; it uses the injected
//! [`Clock`], so the full budget can be exercised in tests without waiting.

use crate::adapters::{Transport, READ_TIMEOUT};
use crate::clock::Clock;
use crate::dome::ConnectionState;
use crate::error::{DomeError, DomeResult};
use crate::protocol::{Command, ResponsePayload, Tag, RESPONSE_ENVELOPE};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Default wait for a reply.
pub const DEFAULT_BUDGET: Duration = Duration::from_millis(5000);

/// Default wait for commands that start motion.
pub const DEFAULT_MOTION_BUDGET: Duration = Duration::from_millis(5000);

/// Delay between read attempts after a timeout or read error.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Timing knobs for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Ceiling for a single read attempt.
    pub read_timeout: Duration,
    /// Sleep between attempts.
    pub poll_interval: Duration,
    /// Budget for queries and non-motion commands.
    pub budget: Duration,
    /// Budget for slew, park and shutter commands.
    pub motion_budget: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            read_timeout: READ_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            budget: DEFAULT_BUDGET,
            motion_budget: DEFAULT_MOTION_BUDGET,
        }
    }
}

impl EngineSettings {
    /// Budget that applies to `tag`.
    pub fn budget_for(&self, tag: Tag) -> Duration {
        if tag.is_motion() {
            self.motion_budget
        } else {
            self.budget
        }
    }
}

/// Drives one transport on behalf of the facade.
pub struct CommandEngine {
    transport: Option<Box<dyn Transport>>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl CommandEngine {
    /// Engine with no transport attached.
    pub fn new(clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        Self {
            transport: None,
            clock,
            settings,
        }
    }

    /// Timing in effect.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Take ownership of an open transport, closing any previous one.
    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        self.detach();
        self.transport = Some(transport);
    }

    /// Close and drop the transport. Returns whether one was attached.
    pub fn detach(&mut self) -> bool {
        match self.transport.take() {
            Some(mut transport) => {
                transport.close();
                debug!(port = transport.port_name(), "transport detached");
                true
            }
            None => false,
        }
    }

    /// Whether a transport is attached and still open.
    pub fn is_attached(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_open())
    }

    /// Send `command` and wait up to `budget` for its reply.
    ///
    /// Rejects the call with [`DomeError::NotConnected`] before any I/O unless `state` is
    /// [`ConnectionState::Connected`]. A budget that runs out without a reply yields an
    /// empty payload rather than an error; see [`ResponsePayload`].
    pub fn execute(
        &mut self,
        state: ConnectionState,
        command: &Command,
        budget: Duration,
    ) -> DomeResult<ResponsePayload> {
        if state != ConnectionState::Connected {
            return Err(DomeError::NotConnected(command.frame()));
        }
        match self.transact(command, budget) {
            Err(DomeError::Timeout { command, budget }) => {
                debug!(%command, ?budget, "no reply within budget");
                Ok(ResponsePayload::empty())
            }
            other => other,
        }
    }

    /// Write and wait without the connection gate or timeout collapsing.
    ///
    /// Used by the connect handshake, which runs while the facade is still `Connecting`.
    pub(crate) fn transact(
        &mut self,
        command: &Command,
        budget: Duration,
    ) -> DomeResult<ResponsePayload> {
        let frame = command.frame();
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| DomeError::NotConnected(frame.clone()))?;

        // No correlation id on the link: anything already buffered belongs to an earlier
        // command whose budget ran out.
        transport.discard_input()?;
        debug!(frame = %frame, "sending");
        transport.write_line(&frame)?;

        let payload = await_reply(
            transport.as_mut(),
            self.clock.as_ref(),
            &self.settings,
            &frame,
            budget,
        )?;
        debug!(frame = %frame, payload = %payload, "reply");
        Ok(payload)
    }
}

impl Drop for CommandEngine {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for CommandEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEngine")
            .field("attached", &self.is_attached())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Poll until a `DCR` line arrives or `budget` runs out.
///
/// Read errors are retried; only when every attempt failed is the last one returned,
/// otherwise running out of time is a [`DomeError::Timeout`].
fn await_reply(
    transport: &mut dyn Transport,
    clock: &dyn Clock,
    settings: &EngineSettings,
    frame: &str,
    budget: Duration,
) -> DomeResult<ResponsePayload> {
    let start = clock.now();
    let mut attempts = 0usize;
    let mut failures = 0usize;
    let mut last_error = None;

    loop {
        let elapsed = clock.now().saturating_duration_since(start);
        if attempts > 0 && elapsed >= budget {
            break;
        }
        let remaining = budget.saturating_sub(elapsed);
        attempts += 1;

        match transport.read_line(settings.read_timeout.min(remaining)) {
            Ok(Some(line)) if line.tag() == Some(RESPONSE_ENVELOPE) => {
                return Ok(ResponsePayload::new(line.payload()));
            }
            Ok(Some(line)) => {
                trace!(frame, line = line.raw(), "discarding unrelated line");
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                debug!(frame, error = %e, "read failed, retrying");
                failures += 1;
                last_error = Some(e);
            }
        }
        clock.sleep(settings.poll_interval);
    }

    match last_error {
        Some(e) if failures == attempts => Err(e),
        _ => Err(DomeError::Timeout {
            command: frame.to_string(),
            budget,
        }),
    }
}
