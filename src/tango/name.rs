//! Tango device names.
//!
//! Devices are addressed as `domain/family/member`, optionally prefixed with
//! the database that hosts them: `tango://host:port/domain/family/member`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AcqError, Result};

/// A validated three-segment device name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceName {
    /// `host:port` of the Tango database, when given in the name.
    pub tango_host: Option<(String, u16)>,
    /// First segment, e.g. `limaccd`.
    pub domain: String,
    /// Second segment, e.g. `tango`.
    pub family: String,
    /// Third segment, e.g. `1`.
    pub member: String,
}

impl DeviceName {
    /// Parse a device name, rejecting anything that is not three non-empty
    /// segments.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || AcqError::InvalidDeviceName(raw.to_string());
        let trimmed = raw.trim();

        let (tango_host, path) = match trimmed.strip_prefix("tango://") {
            Some(rest) => {
                let (host_port, path) = rest.split_once('/').ok_or_else(invalid)?;
                let (host, port) = host_port.rsplit_once(':').ok_or_else(invalid)?;
                let port = port.parse::<u16>().map_err(|_| invalid())?;
                if host.is_empty() {
                    return Err(invalid());
                }
                (Some((host.to_string(), port)), path)
            }
            None => (None, trimmed),
        };

        let segments: Vec<&str> = path.split('/').collect();
        match segments.as_slice() {
            [domain, family, member]
                if !domain.is_empty() && !family.is_empty() && !member.is_empty() =>
            {
                Ok(Self {
                    tango_host,
                    domain: domain.to_string(),
                    family: family.to_string(),
                    member: member.to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }

    /// The `domain/family/member` part without any database prefix.
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.domain, self.family, self.member)
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tango_host {
            Some((host, port)) => write!(f, "tango://{}:{}/{}", host, port, self.path()),
            None => f.write_str(&self.path()),
        }
    }
}

impl FromStr for DeviceName {
    type Err = AcqError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DeviceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeviceName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
