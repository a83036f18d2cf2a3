//! Error types for the acquisition driver.
//!
//! `AcqError` is the single error type of the library. Nothing here is
//! recovered from: every variant propagates with `?` up to the binary, which
//! terminates the run.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidDeviceName`**: a device name that is not `domain/family/member`.
//! - **`DevFailed`**: the middleware (or the device server behind it) rejected
//!   a request. Carries the Tango error stack's first `reason`, `description`
//!   and `origin`.
//! - **`Transport`**: the request never produced a usable answer (connection
//!   refused, timeout, bad URL).
//! - **`MalformedResponse`**: the gateway answered, but not with the JSON we
//!   expect.
//! - **`UnexpectedType`**: an attribute value came back with the wrong type.
//! - **`AcquisitionFault`**: the acquisition device ended in `Fault`.
//! - **`Config`** / **`Configuration`**: loading or validating settings.

use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type Result<T> = std::result::Result<T, AcqError>;

/// Every failure the driver can report.
#[derive(Error, Debug)]
pub enum AcqError {
    #[error("Invalid device name '{0}': expected domain/family/member")]
    InvalidDeviceName(String),

    #[error("{device}: {reason}: {description}")]
    DevFailed {
        device: String,
        reason: String,
        description: String,
        origin: String,
    },

    #[error("Transport error talking to {device}: {message}")]
    Transport { device: String, message: String },

    #[error("Malformed response from {device}: {message}")]
    MalformedResponse { device: String, message: String },

    #[error("Attribute {device}/{attribute} has unexpected type: expected {expected}")]
    UnexpectedType {
        device: String,
        attribute: String,
        expected: &'static str,
    },

    #[error("Acquisition fault on {device} (iteration {iteration})")]
    AcquisitionFault { device: String, iteration: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl From<figment::Error> for AcqError {
    fn from(value: figment::Error) -> Self {
        AcqError::Config(Box::new(value))
    }
}

impl AcqError {
    /// Build a `DevFailed` for the given device.
    ///
    /// `origin` names the server-side method that raised it.
    pub fn dev_failed(
        device: impl Into<String>,
        reason: impl Into<String>,
        description: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        AcqError::DevFailed {
            device: device.into(),
            reason: reason.into(),
            description: description.into(),
            origin: origin.into(),
        }
    }

    /// Build a `Transport` error for the given device.
    pub fn transport(device: impl Into<String>, message: impl ToString) -> Self {
        AcqError::Transport {
            device: device.into(),
            message: message.to_string(),
        }
    }

    /// Build a `MalformedResponse` error for the given device.
    pub fn malformed(device: impl Into<String>, message: impl ToString) -> Self {
        AcqError::MalformedResponse {
            device: device.into(),
            message: message.to_string(),
        }
    }
}
