//! Driver profile using Figment
//!
//! The profile holds what a host would otherwise persist for the driver: the serial port,
//! the trace switch and the protocol timings. It is layered, later sources winning:
//! 1. Built-in defaults
//! 2. `profile.toml` (by default under the user config directory)
//! 3. Environment variables prefixed `PHOTON_DOME_`, `__` between section and key
//!
//! # Example
//! ```no_run
//! use photon_dome::config::DomeConfig;
//!
//! # fn main() -> photon_dome::DomeResult<()> {
//! // PHOTON_DOME_CONNECTION__PORT=/dev/ttyACM0 overrides the file
//! let config = DomeConfig::load()?;
//! println!("Port: {}", config.connection.port);
//! # Ok(())
//! # }
//! ```

use crate::adapters::LinkSettings;
use crate::engine::EngineSettings;
use crate::error::{DomeError, DomeResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "PHOTON_DOME_";

/// Port used when nothing is configured.
pub const DEFAULT_PORT: &str = "COM1";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level driver profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomeConfig {
    /// Serial link settings
    pub connection: ConnectionConfig,
    /// Reply budgets
    pub protocol: ProtocolConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port identifier (e.g., "COM3", "/dev/ttyACM0")
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Single read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: crate::adapters::BAUD_RATE,
            read_timeout_ms: 1000,
        }
    }
}

/// Reply budgets in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Wait for a reply to a query or non-motion command
    pub budget_ms: u64,
    /// Wait for a reply to slew, park and shutter commands
    pub motion_budget_ms: u64,
    /// Delay between read attempts
    pub poll_interval_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            budget_ms: 5000,
            motion_budget_ms: 5000,
            poll_interval_ms: 100,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log every frame and reply (forces TRACE)
    pub trace: bool,
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            trace: false,
            level: "info".to_string(),
        }
    }
}

impl DomeConfig {
    /// `<config dir>/photon-dome/profile.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("photon-dome").join("profile.toml"))
    }

    /// Load from the default profile path and the environment.
    pub fn load() -> DomeResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(path),
            None => Self::extract(Self::base()),
        }
    }

    /// Load from a specific profile file and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> DomeResult<Self> {
        Self::extract(Self::base().merge(Toml::file(path.as_ref())))
    }

    fn base() -> Figment {
        Figment::from(Serialized::defaults(DomeConfig::default()))
    }

    fn extract(figment: Figment) -> DomeResult<Self> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> DomeResult<()> {
        let invalid = |msg: String| Err(DomeError::Configuration(msg));

        if self.connection.port.trim().is_empty() {
            return invalid("connection.port must not be empty".to_string());
        }
        if self.connection.baud_rate == 0 {
            return invalid("connection.baud_rate must be positive".to_string());
        }
        if self.connection.read_timeout_ms == 0 {
            return invalid("connection.read_timeout_ms must be positive".to_string());
        }
        if self.protocol.poll_interval_ms == 0 {
            return invalid("protocol.poll_interval_ms must be positive".to_string());
        }
        for (name, budget) in [
            ("budget_ms", self.protocol.budget_ms),
            ("motion_budget_ms", self.protocol.motion_budget_ms),
        ] {
            if budget < self.protocol.poll_interval_ms {
                return invalid(format!(
                    "protocol.{} ({}) is shorter than poll_interval_ms ({})",
                    name, budget, self.protocol.poll_interval_ms
                ));
            }
        }
        let level = self.logging.level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return invalid(format!(
                "Invalid logging.level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            ));
        }
        Ok(())
    }

    /// Write the profile as TOML, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> DomeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Serial settings for opening the port.
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            baud_rate: self.connection.baud_rate,
            read_timeout: Duration::from_millis(self.connection.read_timeout_ms),
        }
    }

    /// Polling timings for the engine.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            read_timeout: Duration::from_millis(self.connection.read_timeout_ms),
            poll_interval: Duration::from_millis(self.protocol.poll_interval_ms),
            budget: Duration::from_millis(self.protocol.budget_ms),
            motion_budget: Duration::from_millis(self.protocol.motion_budget_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults_are_valid() {
        let config = DomeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connection.port, "COM1");
        assert_eq!(config.link_settings(), LinkSettings::default());
        assert_eq!(config.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = DomeConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(config.validate(), Err(DomeError::Configuration(_))));
    }

    #[test]
    fn test_budget_shorter_than_poll_interval() {
        let mut config = DomeConfig::default();
        config.protocol.motion_budget_ms = 50;
        assert!(config.validate().is_err());

        let mut config = DomeConfig::default();
        config.connection.port = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profile.toml");

        let mut config = DomeConfig::default();
        config.connection.port = "/dev/ttyACM0".to_string();
        config.logging.trace = true;
        config.save(&path).unwrap();

        let loaded = DomeConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    #[serial]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(&path, "[protocol]\nmotion_budget_ms = 30000\n").unwrap();

        let loaded = DomeConfig::load_from(&path).unwrap();
        assert_eq!(loaded.protocol.motion_budget_ms, 30000);
        assert_eq!(loaded.protocol.budget_ms, 5000);
        assert_eq!(loaded.connection.port, "COM1");
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(&path, "[connection]\nport = \"COM7\"\n").unwrap();

        std::env::set_var("PHOTON_DOME_CONNECTION__PORT", "/dev/ttyUSB3");
        let loaded = DomeConfig::load_from(&path);
        std::env::remove_var("PHOTON_DOME_CONNECTION__PORT");

        assert_eq!(loaded.unwrap().connection.port, "/dev/ttyUSB3");
    }
}
