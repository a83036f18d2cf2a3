//! Simulated Devices
//!
//! In-process stand-ins for a LimaCCDs server and its camera plugin, for dry
//! runs without a control system. They follow the LimaCCDs rules that matter
//! to the acquisition loop:
//!
//! - `startAcq` is refused unless `prepareAcq` ran after the last parameter write
//! - parameter writes and `prepareAcq` are refused while an acquisition runs
//! - an acquisition lasts `nb_frames * (expo_time + latency_time)`
//! - `acq_nb_frames = 0` runs until `stopAcq`
//!
//! Time is taken from `tokio::time::Instant`, so a paused test clock drives
//! the simulated acquisition too.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::acquisition::params::{attr, cmd, AcquisitionStatus, TriggerMode};
use crate::error::{AcqError, Result};
use crate::tango::{AttrValue, AttributeReading, DeviceName, DeviceProxy};

const LIMA_EXCEPTION: &str = "LIMA_Exception";
const ATTR_NOT_FOUND: &str = "API_AttrNotFound";
const COMMAND_NOT_FOUND: &str = "API_CommandNotFound";
const INCOMPATIBLE_ARG: &str = "API_IncompatibleAttrArgumentType";

// =============================================================================
// SimulatedLimaDevice
// =============================================================================

#[derive(Debug)]
struct LimaState {
    nb_frames: i64,
    expo_time: f64,
    latency_time: f64,
    trigger_mode: TriggerMode,
    prepared: bool,
    started_at: Option<Instant>,
    run_length: Option<Duration>,
    fault_next: bool,
    faulted: bool,
}

impl LimaState {
    fn status(&self, now: Instant) -> AcquisitionStatus {
        match (self.started_at, self.run_length) {
            (Some(_), None) => AcquisitionStatus::Running,
            (Some(started), Some(length)) if now.duration_since(started) < length => {
                AcquisitionStatus::Running
            }
            _ if self.faulted => AcquisitionStatus::Fault,
            _ => AcquisitionStatus::Ready,
        }
    }

    fn frames_done(&self, now: Instant) -> i64 {
        let Some(started) = self.started_at else {
            return 0;
        };
        let per_frame = self.expo_time + self.latency_time;
        let elapsed = now.duration_since(started).as_secs_f64();
        let done = if per_frame > 0.0 {
            (elapsed / per_frame).floor() as i64
        } else {
            i64::MAX
        };
        if self.nb_frames > 0 {
            done.min(self.nb_frames)
        } else {
            done
        }
    }
}

/// Simulated LimaCCDs acquisition-control device.
///
/// # Example
///
/// ```rust,ignore
/// let lima = SimulatedLimaDevice::new(DeviceName::parse("limaccd/tango/1")?);
/// lima.write_attribute("acq_nb_frames", 10.into()).await?;
/// lima.command_inout("prepareAcq", None).await?;
/// lima.command_inout("startAcq", None).await?;
/// ```
pub struct SimulatedLimaDevice {
    name: DeviceName,
    state: Mutex<LimaState>,
    prepare_count: AtomicU64,
    start_count: AtomicU64,
}

impl SimulatedLimaDevice {
    /// Create an idle device with LimaCCDs power-on defaults (1 frame, 1 s
    /// exposure, no latency, internal trigger).
    pub fn new(name: DeviceName) -> Self {
        Self {
            name,
            state: Mutex::new(LimaState {
                nb_frames: 1,
                expo_time: 1.0,
                latency_time: 0.0,
                trigger_mode: TriggerMode::InternalTrigger,
                prepared: false,
                started_at: None,
                run_length: None,
                fault_next: false,
                faulted: false,
            }),
            prepare_count: AtomicU64::new(0),
            start_count: AtomicU64::new(0),
        }
    }

    /// Make the next acquisition end in `Fault` instead of `Ready`.
    pub async fn fail_next_acquisition(&self) {
        self.state.lock().await.fault_next = true;
    }

    /// Number of accepted `prepareAcq` calls.
    pub fn prepare_count(&self) -> u64 {
        self.prepare_count.load(Ordering::SeqCst)
    }

    /// Number of accepted `startAcq` calls.
    pub fn start_count(&self) -> u64 {
        self.start_count.load(Ordering::SeqCst)
    }

    /// Current status without going through `read_attribute`.
    pub async fn status(&self) -> AcquisitionStatus {
        self.state.lock().await.status(Instant::now())
    }

    fn failed(&self, reason: &str, description: impl Into<String>) -> AcqError {
        AcqError::dev_failed(self.name.to_string(), reason, description, "SimulatedLimaDevice")
    }

    fn expect_f64(&self, attribute: &str, value: &AttrValue) -> Result<f64> {
        value.as_f64().ok_or_else(|| {
            self.failed(INCOMPATIBLE_ARG, format!("{} expects a DevDouble, got {}", attribute, value))
        })
    }
}

#[async_trait]
impl DeviceProxy for SimulatedLimaDevice {
    fn name(&self) -> &DeviceName {
        &self.name
    }

    async fn write_attribute(&self, attribute: &str, value: AttrValue) -> Result<()> {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if state.status(now).is_running() {
            return Err(self.failed(
                LIMA_EXCEPTION,
                format!("Cannot write {} while acquisition is running", attribute),
            ));
        }

        match attribute {
            attr::ACQ_NB_FRAMES => {
                let frames = value.as_i64().ok_or_else(|| {
                    self.failed(INCOMPATIBLE_ARG, format!("{} expects a DevLong, got {}", attribute, value))
                })?;
                if frames < 0 {
                    return Err(self.failed(LIMA_EXCEPTION, "Invalid nb of frames"));
                }
                state.nb_frames = frames;
            }
            attr::ACQ_EXPO_TIME => {
                let expo = self.expect_f64(attribute, &value)?;
                if !expo.is_finite() || expo < 0.0 {
                    return Err(self.failed(LIMA_EXCEPTION, "Invalid exposure time"));
                }
                state.expo_time = expo;
            }
            attr::LATENCY_TIME => {
                let latency = self.expect_f64(attribute, &value)?;
                if !latency.is_finite() || latency < 0.0 {
                    return Err(self.failed(LIMA_EXCEPTION, "Invalid latency time"));
                }
                state.latency_time = latency;
            }
            attr::ACQ_TRIGGER_MODE => {
                let label = value.as_str().ok_or_else(|| {
                    self.failed(INCOMPATIBLE_ARG, format!("{} expects a DevString", attribute))
                })?;
                state.trigger_mode = label
                    .parse()
                    .map_err(|e: String| self.failed(LIMA_EXCEPTION, e))?;
            }
            attr::ACQ_STATUS => {
                return Err(self.failed(
                    "API_AttrNotWritable",
                    format!("Attribute {} is not writable", attribute),
                ));
            }
            _ => {
                return Err(self.failed(
                    ATTR_NOT_FOUND,
                    format!("Attribute {} not found", attribute),
                ));
            }
        }

        state.prepared = false;
        tracing::debug!(device = %self.name, attribute, %value, "SimulatedLimaDevice: write");
        Ok(())
    }

    async fn read_attribute(&self, attribute: &str) -> Result<AttributeReading> {
        let now = Instant::now();
        let state = self.state.lock().await;
        let value = match attribute {
            attr::ACQ_STATUS => AttrValue::from(state.status(now).as_str()),
            attr::ACQ_NB_FRAMES => AttrValue::Long(state.nb_frames),
            attr::ACQ_EXPO_TIME => AttrValue::Double(state.expo_time),
            attr::LATENCY_TIME => AttrValue::Double(state.latency_time),
            attr::ACQ_TRIGGER_MODE => AttrValue::from(state.trigger_mode.as_str()),
            attr::LAST_IMAGE_READY => AttrValue::Long(state.frames_done(now) - 1),
            _ => {
                return Err(self.failed(
                    ATTR_NOT_FOUND,
                    format!("Attribute {} not found", attribute),
                ))
            }
        };
        Ok(AttributeReading::new(attribute, value))
    }

    async fn command_inout(
        &self,
        command: &str,
        _input: Option<AttrValue>,
    ) -> Result<Option<AttrValue>> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let running = state.status(now).is_running();

        match command {
            cmd::PREPARE_ACQ => {
                if running {
                    return Err(self.failed(LIMA_EXCEPTION, "Acquisition is running"));
                }
                state.prepared = true;
                state.started_at = None;
                state.faulted = false;
                self.prepare_count.fetch_add(1, Ordering::SeqCst);
            }
            cmd::START_ACQ => {
                if running {
                    return Err(self.failed(LIMA_EXCEPTION, "Acquisition is already running"));
                }
                if !state.prepared {
                    return Err(self.failed(
                        LIMA_EXCEPTION,
                        "Run prepareAcq before starting acquisition",
                    ));
                }
                let per_frame = state.expo_time + state.latency_time;
                let run_length = if state.nb_frames > 0 {
                    let seconds = per_frame * state.nb_frames as f64;
                    Some(Duration::try_from_secs_f64(seconds).map_err(|e| {
                        self.failed(
                            LIMA_EXCEPTION,
                            format!("Acquisition of {} s is out of range: {}", seconds, e),
                        )
                    })?)
                } else {
                    None
                };
                let fault = state.fault_next;
                state.run_length = run_length;
                state.started_at = Some(now);
                state.prepared = false;
                state.fault_next = false;
                state.faulted = fault;
                self.start_count.fetch_add(1, Ordering::SeqCst);
            }
            cmd::STOP_ACQ | cmd::ABORT_ACQ => {
                if let (true, Some(started)) = (running, state.started_at) {
                    state.run_length = Some(now.duration_since(started));
                }
            }
            _ => {
                return Err(self.failed(
                    COMMAND_NOT_FOUND,
                    format!("Command {} not found", command),
                ))
            }
        }

        tracing::debug!(device = %self.name, command, "SimulatedLimaDevice: command");
        Ok(None)
    }
}

// =============================================================================
// SimulatedCamera
// =============================================================================

/// Simulated camera plugin device exposing `frame_rate`.
pub struct SimulatedCamera {
    name: DeviceName,
    frame_rate: Mutex<f64>,
}

impl SimulatedCamera {
    /// Create a camera running at 30 fps.
    pub fn new(name: DeviceName) -> Self {
        Self {
            name,
            frame_rate: Mutex::new(30.0),
        }
    }

    /// Current frame rate.
    pub async fn frame_rate(&self) -> f64 {
        *self.frame_rate.lock().await
    }
}

#[async_trait]
impl DeviceProxy for SimulatedCamera {
    fn name(&self) -> &DeviceName {
        &self.name
    }

    async fn write_attribute(&self, attribute: &str, value: AttrValue) -> Result<()> {
        if attribute != attr::FRAME_RATE {
            return Err(AcqError::dev_failed(
                self.name.to_string(),
                ATTR_NOT_FOUND,
                format!("Attribute {} not found", attribute),
                "SimulatedCamera",
            ));
        }

        let rate = value.as_f64().ok_or_else(|| {
            AcqError::dev_failed(
                self.name.to_string(),
                INCOMPATIBLE_ARG,
                format!("{} expects a DevDouble, got {}", attribute, value),
                "SimulatedCamera",
            )
        })?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(AcqError::dev_failed(
                self.name.to_string(),
                "PointGrey_Exception",
                "Frame rate must be positive",
                "SimulatedCamera",
            ));
        }

        *self.frame_rate.lock().await = rate;
        tracing::debug!(device = %self.name, rate, "SimulatedCamera: frame rate set");
        Ok(())
    }

    async fn read_attribute(&self, attribute: &str) -> Result<AttributeReading> {
        if attribute != attr::FRAME_RATE {
            return Err(AcqError::dev_failed(
                self.name.to_string(),
                ATTR_NOT_FOUND,
                format!("Attribute {} not found", attribute),
                "SimulatedCamera",
            ));
        }
        Ok(AttributeReading::new(attribute, *self.frame_rate.lock().await))
    }

    async fn command_inout(
        &self,
        command: &str,
        _input: Option<AttrValue>,
    ) -> Result<Option<AttrValue>> {
        Err(AcqError::dev_failed(
            self.name.to_string(),
            COMMAND_NOT_FOUND,
            format!("Command {} not found", command),
            "SimulatedCamera",
        ))
    }
}
