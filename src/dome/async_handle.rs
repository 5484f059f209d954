//! Async handle over a [`Dome`].
//!
//! Every facade call blocks for up to its reply budget, so the handle moves each one onto
//! tokio's blocking pool. The handle is cheap to clone; clones share the driver and its
//! lock, so commands from different tasks still go out one at a time.

use super::{Dome, DomeCapabilities, ShutterState};
use crate::error::{DomeError, DomeResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cloneable async front end for a shared [`Dome`].
#[derive(Debug, Clone)]
pub struct AsyncDome {
    dome: Arc<Dome>,
}

impl AsyncDome {
    /// Take ownership of a driver.
    pub fn new(dome: Dome) -> Self {
        Self {
            dome: Arc::new(dome),
        }
    }

    /// Share an existing driver.
    pub fn from_shared(dome: Arc<Dome>) -> Self {
        Self { dome }
    }

    /// The underlying driver, for the non-blocking accessors.
    pub fn dome(&self) -> &Dome {
        &self.dome
    }

    async fn run<T, F>(&self, op: F) -> DomeResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Dome) -> DomeResult<T> + Send + 'static,
    {
        let dome = Arc::clone(&self.dome);
        tokio::task::spawn_blocking(move || op(&dome))
            .await
            .map_err(|e| DomeError::Worker(e.to_string()))?
    }

    /// See [`Dome::connect`].
    pub async fn connect(&self, port: impl Into<String>) -> DomeResult<()> {
        let port = port.into();
        self.run(move |dome| dome.connect(&port)).await
    }

    /// See [`Dome::disconnect`].
    pub async fn disconnect(&self) -> DomeResult<()> {
        self.run(|dome| {
            dome.disconnect();
            Ok(())
        })
        .await
    }

    /// See [`Dome::get_azimuth`].
    pub async fn get_azimuth(&self) -> DomeResult<f64> {
        self.run(|dome| dome.get_azimuth()).await
    }

    /// See [`Dome::slew_to`].
    pub async fn slew_to(&self, azimuth: f64) -> DomeResult<()> {
        self.run(move |dome| dome.slew_to(azimuth)).await
    }

    /// See [`Dome::sync_to`].
    pub async fn sync_to(&self, azimuth: f64) -> DomeResult<()> {
        self.run(move |dome| dome.sync_to(azimuth)).await
    }

    /// See [`Dome::open_shutter`].
    pub async fn open_shutter(&self) -> DomeResult<()> {
        self.run(|dome| dome.open_shutter()).await
    }

    /// See [`Dome::close_shutter`].
    pub async fn close_shutter(&self) -> DomeResult<()> {
        self.run(|dome| dome.close_shutter()).await
    }

    /// See [`Dome::park`].
    pub async fn park(&self) -> DomeResult<()> {
        self.run(|dome| dome.park()).await
    }

    /// See [`Dome::set_park`].
    pub async fn set_park(&self) -> DomeResult<()> {
        self.run(|dome| dome.set_park()).await
    }

    /// See [`Dome::set_park_to`].
    pub async fn set_park_to(&self, azimuth: f64) -> DomeResult<()> {
        self.run(move |dome| dome.set_park_to(azimuth)).await
    }

    /// See [`Dome::abort_slew`].
    pub async fn abort_slew(&self) -> DomeResult<()> {
        self.run(|dome| dome.abort_slew()).await
    }

    /// See [`Dome::get_shutter_status`].
    pub async fn get_shutter_status(&self) -> DomeResult<ShutterState> {
        self.run(|dome| dome.get_shutter_status()).await
    }

    /// See [`Dome::is_parked`].
    pub async fn is_parked(&self) -> DomeResult<bool> {
        self.run(|dome| dome.is_parked()).await
    }

    /// See [`Dome::is_slewing`].
    pub async fn is_slewing(&self) -> DomeResult<bool> {
        self.run(|dome| dome.is_slewing()).await
    }

    /// See [`Dome::version`].
    pub async fn version(&self) -> DomeResult<String> {
        self.run(|dome| dome.version()).await
    }

    /// See [`Dome::action`].
    pub async fn action(
        &self,
        name: impl Into<String>,
        params: impl Into<String>,
    ) -> DomeResult<String> {
        let (name, params) = (name.into(), params.into());
        self.run(move |dome| dome.action(&name, &params)).await
    }

    /// See [`Dome::command_string`].
    pub async fn command_string(&self, text: impl Into<String>) -> DomeResult<String> {
        let text = text.into();
        self.run(move |dome| dome.command_string(&text)).await
    }

    /// Static capability flags.
    pub fn capabilities(&self) -> DomeCapabilities {
        self.dome.capabilities()
    }

    /// Poll `GETSLEW` every `poll` until the dome stops or `limit` elapses.
    pub async fn wait_for_slew(&self, poll: Duration, limit: Duration) -> DomeResult<()> {
        let start = Instant::now();
        loop {
            if !self.is_slewing().await? {
                return Ok(());
            }
            if start.elapsed() >= limit {
                return Err(DomeError::Timeout {
                    command: "DC:GETSLEW".to_string(),
                    budget: limit,
                });
            }
            tokio::time::sleep(poll).await;
        }
    }
}
