//! Metric data points.
//!
//! A [`Datum`] follows the shape of a line protocol record: a measurement
//! name, a timestamp, string tags and typed fields.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};

/// Tag set attached to a datum, sorted by key.
pub type Tags = BTreeMap<String, String>;

/// Field set attached to a datum, sorted by key.
pub type Fields = BTreeMap<String, FieldValue>;

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Signed integer.
    Integer(i64),
    /// Unsigned integer. Encoded like a signed integer.
    Unsigned(u64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Boolean.
    Boolean(bool),
    /// Elapsed time, encoded as integer nanoseconds.
    Duration(TimeDelta),
    /// Absolute time, encoded as integer unix nanoseconds.
    Timestamp(DateTime<Utc>),
    /// Absent value. Rejected by the encoder.
    Null,
    /// Structured value with no line protocol rendering. Rejected by the encoder.
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Unsigned(_) => "unsigned",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Boolean(_) => "boolean",
            Self::Duration(_) => "duration",
            Self::Timestamp(_) => "timestamp",
            Self::Null => "null",
            Self::Array(_) => "array",
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Unsigned(value)
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Unsigned(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<TimeDelta> for FieldValue {
    fn from(value: TimeDelta) -> Self {
        FieldValue::Duration(value)
    }
}

impl From<std::time::Duration> for FieldValue {
    fn from(value: std::time::Duration) -> Self {
        // Saturate rather than wrap for absurdly long durations.
        FieldValue::Duration(TimeDelta::from_std(value).unwrap_or(TimeDelta::MAX))
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// One metric record produced by a source plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct Datum {
    /// Measurement name.
    pub name: String,
    /// Point in time the datum describes.
    pub time: DateTime<Utc>,
    /// Indexed string tags.
    pub tags: Tags,
    /// Typed field values.
    pub fields: Fields,
}

impl Datum {
    /// Create an empty datum for the given measurement and time.
    pub fn new(name: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            time,
            tags: Tags::new(),
            fields: Fields::new(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
