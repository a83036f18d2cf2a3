//! Entry point for lima_acq
//!
//! Runs the configured number of acquisitions against the LimaCCDs and camera
//! devices and prints the time each one took. There are no command-line
//! arguments; everything comes from `LIMA_ACQ_*` environment variables (see
//! `lima_acq::config`).
//!
//! ```bash
//! LIMA_ACQ_BACKEND__URL=http://gateway.lab:8080 lima_acq
//! LIMA_ACQ_BACKEND__KIND=simulated LIMA_ACQ_ITERATIONS=3 lima_acq
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{anyhow, Context, Result};
use lima_acq::acquisition::AcquisitionRunner;
use lima_acq::config::{BackendConfig, Settings};
use lima_acq::logging;
use lima_acq::tango::rest::RestDeviceProxy;
use lima_acq::tango::sim::{SimulatedCamera, SimulatedLimaDevice};
use lima_acq::tango::DeviceProxy;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    logging::init_from_settings(&settings).map_err(|e| anyhow!(e))?;

    let (lima, camera) = connect(&settings)?;
    let runner = AcquisitionRunner::from_settings(lima, camera, &settings);

    runner
        .run(settings.iterations)
        .await
        .context("Acquisition run aborted")?;
    Ok(())
}

fn connect(settings: &Settings) -> Result<(Box<dyn DeviceProxy>, Box<dyn DeviceProxy>)> {
    match &settings.backend {
        BackendConfig::Rest(rest) => {
            tracing::info!(url = %rest.url, tango_host = %rest.tango_host, "Using Tango REST gateway");
            let lima = RestDeviceProxy::new(settings.lima_device.clone(), rest)
                .with_context(|| format!("Cannot reach {}", settings.lima_device))?;
            let camera = RestDeviceProxy::new(settings.camera_device.clone(), rest)
                .with_context(|| format!("Cannot reach {}", settings.camera_device))?;
            Ok((Box::new(lima), Box::new(camera)))
        }
        BackendConfig::Simulated => {
            tracing::info!("Using simulated devices");
            Ok((
                Box::new(SimulatedLimaDevice::new(settings.lima_device.clone())),
                Box::new(SimulatedCamera::new(settings.camera_device.clone())),
            ))
        }
    }
}
