//! # Photon Dome Driver Library
//!
//! This crate drives an Arduino+Photon observatory dome controller over a serial line. It
//! exposes the standard dome control surface (azimuth positioning, shutter open/close,
//! parking) and translates each operation into the controller's `DC:`/`DCR:` line
//! protocol. The library is shared between the `photon-dome` CLI (`main.rs`) and any host
//! that embeds the driver directly.
//!
//! ## Crate Structure
//!
//! - **`adapters`**: The `Transport`/`Connector` seam with the real serial port adapter and
//!   an in-memory mock controller used by tests and `--simulate`.
//! - **`clock`**: Injectable monotonic clock; the polling loop sleeps only through it.
//! - **`config`**: The driver profile (port, trace switch, timings) loaded with Figment from
//!   defaults, a TOML file and `PHOTON_DOME_*` environment variables.
//! - **`dome`**: The `Dome` facade with its connection state machine, cached device state,
//!   capability flags, action dispatch and the `AsyncDome` handle for tokio hosts.
//! - **`engine`**: The command/response engine: framing, bounded wait-and-poll, reply
//!   matching and failure classification.
//! - **`error`**: The `DomeError` enum for centralized error handling.
//! - **`logging`**: `tracing-subscriber` setup driven by the profile.
//! - **`protocol`**: Command tags, framing and typed reply decoding.

pub mod adapters;
pub mod clock;
pub mod config;
pub mod dome;
pub mod engine;
pub mod error;
pub mod logging;
pub mod protocol;

pub use dome::{AsyncDome, Dome};
pub use error::{DomeError, DomeResult};
