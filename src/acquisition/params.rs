//! Acquisition parameters and status values as LimaCCDs names them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// LimaCCDs attribute names written or read by the runner.
pub mod attr {
    /// Number of frames in one acquisition (DevLong)
    pub const ACQ_NB_FRAMES: &str = "acq_nb_frames";
    /// Dead time between frames, seconds (DevDouble)
    pub const LATENCY_TIME: &str = "latency_time";
    /// Exposure per frame, seconds (DevDouble)
    pub const ACQ_EXPO_TIME: &str = "acq_expo_time";
    /// Trigger mode label (DevString)
    pub const ACQ_TRIGGER_MODE: &str = "acq_trigger_mode";
    /// Acquisition status label (DevString, read-only)
    pub const ACQ_STATUS: &str = "acq_status";
    /// Camera frame rate, frames per second (DevDouble, camera device)
    pub const FRAME_RATE: &str = "frame_rate";
    /// Index of the last acquired frame, -1 before the first (DevLong, read-only)
    pub const LAST_IMAGE_READY: &str = "last_image_ready";
}

/// LimaCCDs command names.
pub mod cmd {
    /// Apply the written parameters and allocate buffers
    pub const PREPARE_ACQ: &str = "prepareAcq";
    /// Start the prepared acquisition
    pub const START_ACQ: &str = "startAcq";
    /// End a running acquisition after the current frame
    pub const STOP_ACQ: &str = "stopAcq";
    /// End a running acquisition immediately
    pub const ABORT_ACQ: &str = "abortAcq";
}

/// Trigger mode as accepted by `acq_trigger_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerMode {
    /// One software start, all frames free-running
    #[default]
    InternalTrigger,
    /// One software trigger per frame
    InternalTriggerMulti,
    /// One hardware trigger starts the sequence
    ExternalTrigger,
    /// One hardware trigger per frame
    ExternalTriggerMulti,
    /// Exposure follows the external gate
    ExternalGate,
    /// External start and stop pulses
    ExternalStartStop,
}

impl TriggerMode {
    /// All modes in LimaCCDs order.
    pub const ALL: [TriggerMode; 6] = [
        TriggerMode::InternalTrigger,
        TriggerMode::InternalTriggerMulti,
        TriggerMode::ExternalTrigger,
        TriggerMode::ExternalTriggerMulti,
        TriggerMode::ExternalGate,
        TriggerMode::ExternalStartStop,
    ];

    /// Wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::InternalTrigger => "INTERNAL_TRIGGER",
            TriggerMode::InternalTriggerMulti => "INTERNAL_TRIGGER_MULTI",
            TriggerMode::ExternalTrigger => "EXTERNAL_TRIGGER",
            TriggerMode::ExternalTriggerMulti => "EXTERNAL_TRIGGER_MULTI",
            TriggerMode::ExternalGate => "EXTERNAL_GATE",
            TriggerMode::ExternalStartStop => "EXTERNAL_START_STOP",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown trigger mode '{}'", s))
    }
}

/// Values pushed to the devices before each acquisition.
///
/// Nothing here is range-checked locally; the device server is the judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// `acq_nb_frames`
    #[serde(default = "default_nb_frames")]
    pub nb_frames: i64,
    /// `latency_time`, seconds
    #[serde(default = "default_latency_time")]
    pub latency_time: f64,
    /// `acq_expo_time`, seconds
    #[serde(default = "default_expo_time")]
    pub expo_time: f64,
    /// `acq_trigger_mode`
    #[serde(default)]
    pub trigger_mode: TriggerMode,
    /// `frame_rate` on the camera device
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
}

fn default_nb_frames() -> i64 {
    50
}

fn default_latency_time() -> f64 {
    0.01
}

fn default_expo_time() -> f64 {
    0.01
}

fn default_frame_rate() -> f64 {
    10.0
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            nb_frames: default_nb_frames(),
            latency_time: default_latency_time(),
            expo_time: default_expo_time(),
            trigger_mode: TriggerMode::default(),
            frame_rate: default_frame_rate(),
        }
    }
}

/// Value of `acq_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionStatus {
    /// Idle, last acquisition (if any) finished
    Ready,
    /// Acquisition in progress
    Running,
    /// Acquisition stopped on an error
    Fault,
    /// Device is being configured
    Configuration,
    /// Any label this crate does not know
    Other(String),
}

impl AcquisitionStatus {
    /// Parse a status label. Unknown labels are kept verbatim.
    pub fn parse(label: &str) -> Self {
        match label {
            "Ready" => AcquisitionStatus::Ready,
            "Running" => AcquisitionStatus::Running,
            "Fault" => AcquisitionStatus::Fault,
            "Configuration" => AcquisitionStatus::Configuration,
            other => AcquisitionStatus::Other(other.to_string()),
        }
    }

    /// Wire label.
    pub fn as_str(&self) -> &str {
        match self {
            AcquisitionStatus::Ready => "Ready",
            AcquisitionStatus::Running => "Running",
            AcquisitionStatus::Fault => "Fault",
            AcquisitionStatus::Configuration => "Configuration",
            AcquisitionStatus::Other(label) => label,
        }
    }

    /// True while the polling loop must keep waiting.
    pub fn is_running(&self) -> bool {
        matches!(self, AcquisitionStatus::Running)
    }
}

impl fmt::Display for AcquisitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
