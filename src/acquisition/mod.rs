//! Acquisition sequencing
//!
//! - [`params`]: LimaCCDs attribute/command names, [`AcquisitionConfig`],
//!   [`TriggerMode`] and [`AcquisitionStatus`]
//! - [`runner`]: [`AcquisitionRunner`], the configure / prepare / start /
//!   poll loop

pub mod params;
pub mod runner;

pub use params::{AcquisitionConfig, AcquisitionStatus, TriggerMode};
pub use runner::{AcquisitionRunner, RunReport};
