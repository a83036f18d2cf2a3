//! Scalar attribute values and attribute readings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed scalar carried by an attribute write, an attribute read or a
/// command argument.
///
/// Untagged so it maps directly onto the JSON the REST gateway uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// DevBoolean
    Boolean(bool),
    /// DevLong / DevLong64
    Long(i64),
    /// DevDouble / DevFloat
    Double(f64),
    /// DevString / DevEnum label
    String(String),
}

impl AttrValue {
    /// String payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric payload as f64. Integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Double(v) => Some(*v),
            AttrValue::Long(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Boolean(v) => write!(f, "{}", v),
            AttrValue::Long(v) => write!(f, "{}", v),
            AttrValue::Double(v) => write!(f, "{}", v),
            AttrValue::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Boolean(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Long(value)
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        AttrValue::Long(i64::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Double(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

/// Attribute quality as reported by the device server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AttrQuality {
    /// Value is valid
    #[serde(rename = "ATTR_VALID")]
    #[default]
    Valid,
    /// Value could not be read
    #[serde(rename = "ATTR_INVALID")]
    Invalid,
    /// Value is outside its alarm limits
    #[serde(rename = "ATTR_ALARM")]
    Alarm,
    /// Value is being changed
    #[serde(rename = "ATTR_CHANGING")]
    Changing,
    /// Value is outside its warning limits
    #[serde(rename = "ATTR_WARNING")]
    Warning,
}

/// Result of an attribute read. Mirrors the gateway's JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeReading {
    /// Attribute name.
    pub name: String,
    /// Read value.
    pub value: AttrValue,
    /// Quality factor.
    #[serde(default)]
    pub quality: AttrQuality,
    /// Server-side timestamp in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl AttributeReading {
    /// A valid reading without timestamp.
    pub fn new(name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            quality: AttrQuality::Valid,
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_from_gateway_json() {
        let json = r#"{"name":"acq_status","value":"Running","quality":"ATTR_VALID","timestamp":1712345678901}"#;
        let reading: AttributeReading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.name, "acq_status");
        assert_eq!(reading.value.as_str(), Some("Running"));
        assert_eq!(reading.quality, AttrQuality::Valid);
        assert_eq!(reading.timestamp, Some(1712345678901));
    }

    #[test]
    fn test_untagged_numeric_values() {
        let long: AttrValue = serde_json::from_str("50").unwrap();
        assert_eq!(long, AttrValue::Long(50));

        let double: AttrValue = serde_json::from_str("0.01").unwrap();
        assert_eq!(double, AttrValue::Double(0.01));
        assert_eq!(long.as_f64(), Some(50.0));
    }

    #[test]
    fn test_display_is_wire_form() {
        assert_eq!(AttrValue::from("INTERNAL_TRIGGER").to_string(), "INTERNAL_TRIGGER");
        assert_eq!(AttrValue::from(0.01).to_string(), "0.01");
        assert_eq!(AttrValue::from(50u32).to_string(), "50");
    }
}
