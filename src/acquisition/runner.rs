//! The acquisition loop.
//!
//! One iteration is: write parameters, `prepareAcq`, `startAcq`, poll
//! `acq_status` until it leaves `Running`, report the elapsed time. Every
//! remote call is awaited before the next one is issued, and any error ends
//! the run on the spot.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

use crate::acquisition::params::{attr, cmd, AcquisitionConfig, AcquisitionStatus};
use crate::config::Settings;
use crate::error::{AcqError, Result};
use crate::tango::{AttrValue, DeviceProxy};

/// Outcome of one completed acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Zero-based iteration index
    pub iteration: usize,
    /// Time from just before `startAcq` to the first non-`Running` status
    pub elapsed: Duration,
    /// Status that ended the polling loop
    pub final_status: AcquisitionStatus,
    /// Number of `acq_status` reads
    pub polls: usize,
}

/// Drives repeated acquisitions on a LimaCCDs device and its camera.
pub struct AcquisitionRunner<L, C> {
    lima: L,
    camera: C,
    config: AcquisitionConfig,
    poll_interval: Duration,
}

impl<L: DeviceProxy, C: DeviceProxy> AcquisitionRunner<L, C> {
    /// Create a runner over two device handles.
    pub fn new(lima: L, camera: C, config: AcquisitionConfig, poll_interval: Duration) -> Self {
        Self {
            lima,
            camera,
            config,
            poll_interval,
        }
    }

    /// Create a runner using the acquisition values and poll interval from
    /// `settings`.
    pub fn from_settings(lima: L, camera: C, settings: &Settings) -> Self {
        Self::new(lima, camera, settings.acquisition.clone(), settings.poll_interval)
    }

    /// The acquisition device.
    pub fn lima(&self) -> &L {
        &self.lima
    }

    /// The camera device.
    pub fn camera(&self) -> &C {
        &self.camera
    }

    /// Push the acquisition parameters to both devices.
    ///
    /// Order: `acq_nb_frames`, `latency_time`, `acq_expo_time`,
    /// `acq_trigger_mode` on the acquisition device, then `frame_rate` on the
    /// camera.
    #[instrument(skip_all, fields(lima = %self.lima.name(), camera = %self.camera.name()))]
    pub async fn configure(&self, config: &AcquisitionConfig) -> Result<()> {
        let lima_writes = [
            (attr::ACQ_NB_FRAMES, AttrValue::Long(config.nb_frames)),
            (attr::LATENCY_TIME, AttrValue::Double(config.latency_time)),
            (attr::ACQ_EXPO_TIME, AttrValue::Double(config.expo_time)),
            (
                attr::ACQ_TRIGGER_MODE,
                AttrValue::from(config.trigger_mode.as_str()),
            ),
        ];

        for (attribute, value) in lima_writes {
            debug!(attribute, %value, "write");
            self.lima.write_attribute(attribute, value).await?;
        }

        debug!(attribute = attr::FRAME_RATE, value = config.frame_rate, "write");
        self.camera
            .write_attribute(attr::FRAME_RATE, AttrValue::Double(config.frame_rate))
            .await?;
        Ok(())
    }

    /// Run `prepareAcq`.
    pub async fn prepare(&self) -> Result<()> {
        debug!(device = %self.lima.name(), command = cmd::PREPARE_ACQ, "command");
        self.lima.command_inout(cmd::PREPARE_ACQ, None).await?;
        Ok(())
    }

    /// Run `startAcq` and return the instant taken just before it was sent.
    pub async fn start(&self) -> Result<Instant> {
        let started = Instant::now();
        debug!(device = %self.lima.name(), command = cmd::START_ACQ, "command");
        self.lima.command_inout(cmd::START_ACQ, None).await?;
        Ok(started)
    }

    /// Read `acq_status` once.
    pub async fn read_status(&self) -> Result<AcquisitionStatus> {
        let reading = self.lima.read_attribute(attr::ACQ_STATUS).await?;
        let label = reading.value.as_str().ok_or_else(|| AcqError::UnexpectedType {
            device: self.lima.name().to_string(),
            attribute: attr::ACQ_STATUS.to_string(),
            expected: "string",
        })?;
        Ok(AcquisitionStatus::parse(label))
    }

    /// Poll `acq_status` until it is no longer `Running`.
    ///
    /// Reads at least once. Sleeps the poll interval between reads. Never
    /// times out. Returns the final status and the number of reads.
    pub async fn wait_until_done(&self) -> Result<(AcquisitionStatus, usize)> {
        let mut polls = 1;
        let mut status = self.read_status().await?;
        while status.is_running() {
            sleep(self.poll_interval).await;
            status = self.read_status().await?;
            polls += 1;
        }
        debug!(%status, polls, "acquisition left Running");
        Ok((status, polls))
    }

    /// One full acquisition.
    #[instrument(skip(self), fields(lima = %self.lima.name()))]
    pub async fn run_once(&self, iteration: usize) -> Result<RunReport> {
        let config = self.config.clone();
        self.configure(&config).await?;
        self.prepare().await?;

        let started = self.start().await?;
        println!("Running ");

        let (final_status, polls) = self.wait_until_done().await?;
        let elapsed = started.elapsed();

        if final_status == AcquisitionStatus::Fault {
            return Err(AcqError::AcquisitionFault {
                device: self.lima.name().to_string(),
                iteration,
            });
        }

        println!("Completed run in {} secs", elapsed.as_secs_f64());
        info!(
            iteration,
            elapsed_s = elapsed.as_secs_f64(),
            polls,
            status = %final_status,
            "Acquisition complete"
        );

        Ok(RunReport {
            iteration,
            elapsed,
            final_status,
            polls,
        })
    }

    /// Run `iterations` acquisitions back to back and print `Done`.
    ///
    /// Stops at the first error; no further remote call is made after it.
    pub async fn run(&self, iterations: usize) -> Result<Vec<RunReport>> {
        info!(
            iterations,
            lima = %self.lima.name(),
            camera = %self.camera.name(),
            "Starting acquisition run"
        );

        let mut reports = Vec::with_capacity(iterations);
        for iteration in 0..iterations {
            reports.push(self.run_once(iteration).await?);
        }

        println!("Done");
        Ok(reports)
    }
}
