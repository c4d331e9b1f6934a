//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at all)
//! yields a working bridge-mode configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::bridge::LoopBindings;
use crate::bridge::SNAPSHOT_RATE_HZ;
use crate::error::{BridgeError, Result};
use crate::serial::{DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PORT, SUPPORTED_BAUD_RATES};

/// Path tried when no configuration file is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Largest usable stick deadzone (half the normalized range)
pub const MAX_DEADZONE: i32 = 127;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub transmission: TransmissionConfig,

    #[serde(default)]
    pub bindings: LoopBindings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What the process does with the snapshot stream
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One JSON status line per snapshot on stdout
    Json,
    /// Encoded frames on the serial port
    #[default]
    Bridge,
    /// Encoded frames decoded and printed on stdout
    Debug,
}

/// Output configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub mode: OutputMode,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    /// Empty means auto-discover
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_deadzone")]
    pub deadzone: i32,

    /// Extra profile documents; empty means built-in profiles only
    #[serde(default)]
    pub profiles_dir: String,
}

/// Transmission configuration (bridge and debug modes)
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TransmissionConfig {
    #[serde(default = "default_rate_hz")]
    pub rate_hz: u32,

    #[serde(default = "default_start_in_safety_stop")]
    pub start_in_safety_stop: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` overrides it
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; empty disables file logging
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_serial_port() -> String { DEFAULT_SERIAL_PORT.to_string() }
fn default_baud_rate() -> u32 { DEFAULT_BAUD_RATE }

fn default_deadzone() -> i32 { 10 }

fn default_rate_hz() -> u32 { 5 }
fn default_start_in_safety_stop() -> bool { true }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            deadzone: default_deadzone(),
            profiles_dir: String::new(),
        }
    }
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            start_in_safety_stop: default_start_in_safety_stop(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dualshock_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given; otherwise the default path, falling back to
    /// built-in defaults when that file does not exist.
    ///
    /// An explicitly given path that cannot be read is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.output.mode == OutputMode::Bridge && self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty in bridge mode"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            let rates: Vec<String> = SUPPORTED_BAUD_RATES.iter().map(u32::to_string).collect();
            return Err(invalid(format!("baud_rate must be one of: {}", rates.join(", "))));
        }

        if self.transmission.rate_hz == 0 || self.transmission.rate_hz > SNAPSHOT_RATE_HZ {
            return Err(invalid(format!(
                "rate_hz must be between 1 and {}",
                SNAPSHOT_RATE_HZ
            )));
        }

        if !(0..=MAX_DEADZONE).contains(&self.controller.deadzone) {
            return Err(invalid(format!("deadzone must be between 0 and {}", MAX_DEADZONE)));
        }

        if self.logging.level.trim().is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        if self.bindings.safety_stop == self.bindings.safety_resume {
            return Err(invalid("safety_stop and safety_resume must be different buttons"));
        }

        if self.bindings.wheel_up == self.bindings.wheel_down {
            return Err(invalid("wheel_up and wheel_down must be different buttons"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(msg))
}
