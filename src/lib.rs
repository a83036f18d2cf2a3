//! # lima_acq
//!
//! Drives repeated camera acquisitions on a LIMA (LimaCCDs) Tango device and
//! reports how long each one takes. Each iteration writes the acquisition
//! parameters, runs `prepareAcq` and `startAcq`, polls `acq_status` until it
//! leaves `Running`, and prints the elapsed time.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: the `AcquisitionRunner` loop plus the LimaCCDs
//!   parameter, trigger-mode and status types.
//! - **`tango`**: the `DeviceProxy` trait over the three remote operations
//!   (write attribute, read attribute, run command), device names, values, a
//!   REST gateway client and simulated devices.
//! - **`config`**: figment-based settings (defaults + `LIMA_ACQ_*` env vars).
//! - **`error`**: the `AcqError` enum.
//! - **`logging`**: tracing subscriber setup.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod logging;
pub mod tango;

pub use acquisition::{AcquisitionConfig, AcquisitionRunner, AcquisitionStatus, RunReport};
pub use error::{AcqError, Result};
