//! Configuration using Figment
//!
//! Settings are built from compiled-in defaults, overridden by environment
//! variables prefixed with `LIMA_ACQ_`. Nested keys are separated by a double
//! underscore:
//!
//! ```text
//! LIMA_ACQ_ITERATIONS=5
//! LIMA_ACQ_POLL_INTERVAL=100ms
//! LIMA_ACQ_ACQUISITION__NB_FRAMES=25
//! LIMA_ACQ_BACKEND__KIND=simulated
//! LIMA_ACQ_BACKEND__URL=http://gateway.lab:8080
//! LIMA_ACQ_LOG__LEVEL=debug
//! ```
//!
//! # Example
//! ```no_run
//! use lima_acq::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Running {} acquisitions", settings.iterations);
//! # Ok::<(), lima_acq::error::AcqError>(())
//! ```

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::acquisition::AcquisitionConfig;
use crate::error::{AcqError, Result};
use crate::tango::DeviceName;

/// Environment variable prefix for all settings.
pub const ENV_PREFIX: &str = "LIMA_ACQ_";

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Number of acquisitions to run
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Interval between `acq_status` reads
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// LimaCCDs device controlling the acquisition
    #[serde(default = "default_lima_device")]
    pub lima_device: DeviceName,
    /// Camera plugin device
    #[serde(default = "default_camera_device")]
    pub camera_device: DeviceName,
    /// Values pushed to the devices before every acquisition
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// How the devices are reached
    #[serde(default)]
    pub backend: BackendConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Device transport selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Tango REST API gateway
    Rest(RestBackendConfig),
    /// In-process simulated devices
    Simulated,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Rest(RestBackendConfig::default())
    }
}

/// Tango REST gateway connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestBackendConfig {
    /// Gateway root URL, e.g. `http://localhost:8080`
    #[serde(default = "default_rest_url", deserialize_with = "lenient_string::deserialize")]
    pub url: String,
    /// Tango database host the gateway should use
    #[serde(default = "default_tango_host", deserialize_with = "lenient_string::deserialize")]
    pub tango_host: String,
    /// Tango database port
    #[serde(default = "default_tango_port")]
    pub tango_port: u16,
    /// Basic auth user
    #[serde(default, deserialize_with = "lenient_string::option")]
    pub username: Option<String>,
    /// Basic auth password
    #[serde(default, deserialize_with = "lenient_string::option")]
    pub password: Option<String>,
    /// Upper bound for a single request
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RestBackendConfig {
    fn default() -> Self {
        Self {
            url: default_rest_url(),
            tango_host: default_tango_host(),
            tango_port: default_tango_port(),
            username: None,
            password: None,
            timeout: default_request_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Text settings read back as text even when the env provider parsed the
/// value as a number or boolean (`LIMA_ACQ_BACKEND__PASSWORD=12345`).
mod lenient_string {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    impl From<Scalar> for String {
        fn from(value: Scalar) -> Self {
            match value {
                Scalar::Text(s) => s,
                Scalar::Unsigned(v) => v.to_string(),
                Scalar::Signed(v) => v.to_string(),
                Scalar::Float(v) => v.to_string(),
                Scalar::Bool(v) => v.to_string(),
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Scalar::deserialize(deserializer).map(String::from)
    }

    pub fn option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Option::<Scalar>::deserialize(deserializer).map(|value| value.map(String::from))
    }
}

// Default value functions
fn default_iterations() -> usize {
    2
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_lima_device() -> DeviceName {
    DeviceName {
        tango_host: None,
        domain: "limaccd".to_string(),
        family: "tango".to_string(),
        member: "1".to_string(),
    }
}

fn default_camera_device() -> DeviceName {
    DeviceName {
        tango_host: None,
        domain: "pointgrey".to_string(),
        family: "tango".to_string(),
        member: "1".to_string(),
    }
}

fn default_rest_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_tango_host() -> String {
    "localhost".to_string()
}

fn default_tango_port() -> u16 {
    10000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            poll_interval: default_poll_interval(),
            lima_device: default_lima_device(),
            camera_device: default_camera_device(),
            acquisition: AcquisitionConfig::default(),
            backend: BackendConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from defaults and `LIMA_ACQ_*` environment variables.
    pub fn load() -> Result<Self> {
        let settings: Settings = Self::figment().extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The provider stack used by [`Settings::load`].
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate settings after loading.
    ///
    /// Acquisition values are not checked here; the device judges them.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(AcqError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.log.format.to_lowercase().as_str()) {
            return Err(AcqError::Configuration(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.log.format,
                valid_formats.join(", ")
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(AcqError::Configuration(
                "poll_interval must be greater than zero".to_string(),
            ));
        }

        if self.lima_device == self.camera_device {
            return Err(AcqError::Configuration(format!(
                "lima_device and camera_device are both '{}'",
                self.lima_device
            )));
        }

        if let BackendConfig::Rest(rest) = &self.backend {
            if rest.password.is_some() && rest.username.is_none() {
                return Err(AcqError::Configuration(
                    "backend password given without username".to_string(),
                ));
            }
        }

        Ok(())
    }
}
