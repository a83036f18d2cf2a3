//! Tango device access
//!
//! The driver only ever needs three remote operations: write an attribute,
//! read an attribute, and run a command. They sit behind [`DeviceProxy`] so
//! the acquisition loop is independent of how the devices are reached.
//!
//! Implementations:
//! - [`rest::RestDeviceProxy`] - Tango REST API gateway (rc4) over HTTP
//! - [`sim::SimulatedLimaDevice`] / [`sim::SimulatedCamera`] - in-process
//!   simulation for dry runs
//!
//! # Contract
//! - Every call is one round trip; nothing is cached.
//! - Rejections by the device come back as [`AcqError::DevFailed`].
//! - No call retries.
//!
//! [`AcqError::DevFailed`]: crate::error::AcqError::DevFailed

pub mod name;
pub mod rest;
pub mod sim;
pub mod value;

pub use name::DeviceName;
pub use value::{AttrQuality, AttrValue, AttributeReading};

use async_trait::async_trait;

use crate::error::Result;

/// Handle to one remote device.
#[async_trait]
pub trait DeviceProxy: Send + Sync {
    /// Name the proxy was created for.
    fn name(&self) -> &DeviceName;

    /// Write a scalar attribute.
    async fn write_attribute(&self, attribute: &str, value: AttrValue) -> Result<()>;

    /// Read a scalar attribute.
    async fn read_attribute(&self, attribute: &str) -> Result<AttributeReading>;

    /// Run a command. `input` is `None` for DevVoid commands; the returned
    /// value is `None` for DevVoid outputs.
    async fn command_inout(&self, command: &str, input: Option<AttrValue>)
        -> Result<Option<AttrValue>>;
}

#[async_trait]
impl<T: DeviceProxy + ?Sized> DeviceProxy for Box<T> {
    fn name(&self) -> &DeviceName {
        (**self).name()
    }

    async fn write_attribute(&self, attribute: &str, value: AttrValue) -> Result<()> {
        (**self).write_attribute(attribute, value).await
    }

    async fn read_attribute(&self, attribute: &str) -> Result<AttributeReading> {
        (**self).read_attribute(attribute).await
    }

    async fn command_inout(
        &self,
        command: &str,
        input: Option<AttrValue>,
    ) -> Result<Option<AttrValue>> {
        (**self).command_inout(command, input).await
    }
}
