//! Inbound reply lines and typed payload decoding.

use super::{normalize_azimuth, Command, FIELD_SEPARATOR};
use crate::error::{DomeError, DomeResult};
use std::fmt;

/// One line received from the controller, split at the first separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    raw: String,
    split: Option<usize>,
}

impl ResponseLine {
    /// Split a received line. A trailing `\r` is dropped.
    pub fn parse(raw: impl Into<String>) -> Self {
        let mut raw = raw.into();
        if raw.ends_with('\r') {
            raw.pop();
        }
        let split = raw.find(FIELD_SEPARATOR);
        Self { raw, split }
    }

    /// Leading token before the first `:`; `None` when the line has no separator.
    pub fn tag(&self) -> Option<&str> {
        self.split.map(|at| &self.raw[..at])
    }

    /// Everything after the first `:` (empty when there is no separator).
    pub fn payload(&self) -> &str {
        match self.split {
            Some(at) => &self.raw[at + 1..],
            None => "",
        }
    }

    /// The line as received, minus terminator.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ResponseLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Payload of an accepted reply.
///
/// Empty means either that the controller never answered within the budget or that it
/// answered with an empty payload; the two cannot be told apart at this level. Callers
/// that need a value treat empty as a timeout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponsePayload(String);

impl ResponsePayload {
    /// Wrap received payload text.
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The "nothing usable arrived" payload.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Whether the payload carries no text.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Payload text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the payload text.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Payload with an echoed `TAG:` prefix removed, trimmed.
    fn value_for(&self, command: &Command) -> &str {
        let text = self.0.trim();
        let wire = command.tag().wire();
        match text.split_once(FIELD_SEPARATOR) {
            Some((head, rest)) if head.trim().eq_ignore_ascii_case(wire) => rest.trim(),
            _ => text,
        }
    }

    /// Decimal degrees, normalized into `[0, 360)`.
    pub fn azimuth(&self, command: &Command) -> DomeResult<f64> {
        let value = self.value_for(command);
        let degrees: f64 = value
            .parse()
            .map_err(|_| DomeError::parse(command.frame(), &self.0, "not a decimal angle"))?;
        if !degrees.is_finite() {
            return Err(DomeError::parse(command.frame(), &self.0, "angle is not finite"));
        }
        Ok(normalize_azimuth(degrees))
    }

    /// Integer shutter code.
    pub fn shutter(&self, command: &Command) -> DomeResult<ShutterState> {
        let value = self.value_for(command);
        let code: i64 = value
            .parse()
            .map_err(|_| DomeError::parse(command.frame(), &self.0, "shutter code is not an integer"))?;
        ShutterState::from_code(code)
            .ok_or_else(|| DomeError::parse(command.frame(), &self.0, "shutter code out of range"))
    }

    /// Literal `true`/`false`, any case.
    pub fn flag(&self, command: &Command) -> DomeResult<bool> {
        let value = self.value_for(command);
        if value.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if value.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(DomeError::parse(command.frame(), &self.0, "expected true or false"))
        }
    }

    /// Free text with any echoed tag removed.
    pub fn text(&self, command: &Command) -> String {
        self.value_for(command).to_string()
    }
}

impl fmt::Display for ResponsePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shutter position as reported by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ShutterState {
    /// Fully open.
    Open,
    /// Fully closed.
    Closed,
    /// Opening in progress.
    Opening,
    /// Closing in progress.
    Closing,
    /// Controller reports a shutter fault.
    Error,
    /// Not observed since connecting.
    #[default]
    Unknown,
}

impl ShutterState {
    /// Map a wire code (0-4). Anything else is `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ShutterState::Open),
            1 => Some(ShutterState::Closed),
            2 => Some(ShutterState::Opening),
            3 => Some(ShutterState::Closing),
            4 => Some(ShutterState::Error),
            _ => None,
        }
    }

    /// Shutter is in motion.
    pub fn is_moving(self) -> bool {
        matches!(self, ShutterState::Opening | ShutterState::Closing)
    }
}

impl fmt::Display for ShutterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutterState::Open => "open",
            ShutterState::Closed => "closed",
            ShutterState::Opening => "opening",
            ShutterState::Closing => "closing",
            ShutterState::Error => "error",
            ShutterState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
