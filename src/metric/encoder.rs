//! Line protocol encoder.
//!
//! Renders a [`Datum`] as a single line:
//!
//! ```text
//! <measurement>[,<tag>=<value>...] <field>=<value>[,<field>=<value>...] <unix-nanos>
//! ```
//!
//! Tags and fields are emitted in ascending key order, so the output does not
//! depend on how the datum was assembled.

use std::fmt::Write as _;

use thiserror::Error;

use super::datum::{Datum, FieldValue};

/// Characters escaped in measurement names.
const MEASUREMENT_ESCAPES: &[char] = &[',', ' '];

/// Characters escaped in tag keys, tag values and field keys.
const LABEL_ESCAPES: &[char] = &[',', '=', ' '];

/// Errors that can occur while encoding a datum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The field value has no line protocol representation.
    #[error("unsupported field type: {0}")]
    UnsupportedFieldType(String),

    /// The field value is absent.
    #[error("field value is nil")]
    NilFieldValue,

    /// A time value does not fit into signed 64-bit nanoseconds.
    #[error("{0} out of range for nanosecond encoding")]
    OutOfRange(&'static str),

    /// Line protocol requires at least one field.
    #[error("datum '{0}' has no fields")]
    NoFields(String),

    /// The measurement name is empty.
    #[error("datum has an empty measurement name")]
    EmptyName,
}

impl Datum {
    /// Encode this datum as one line of line protocol, without a trailing newline.
    pub fn to_line_protocol(&self) -> Result<String, EncodeError> {
        let mut buf = String::with_capacity(64 + 16 * (self.tags.len() + self.fields.len()));
        write_datum(&mut buf, self)?;
        Ok(buf)
    }
}

/// Encoder that reuses one buffer across calls.
///
/// The buffer is cleared at the start of every call, so a failed encode never
/// leaks into the next line.
#[derive(Debug, Default)]
pub struct LineEncoder {
    buf: String,
}

impl LineEncoder {
    /// Create an encoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a datum, returning a view into the internal buffer.
    pub fn encode(&mut self, datum: &Datum) -> Result<&str, EncodeError> {
        self.buf.clear();
        if let Err(e) = write_datum(&mut self.buf, datum) {
            self.buf.clear();
            return Err(e);
        }
        Ok(&self.buf)
    }
}

fn write_datum(buf: &mut String, datum: &Datum) -> Result<(), EncodeError> {
    if datum.name.is_empty() {
        return Err(EncodeError::EmptyName);
    }
    if datum.fields.is_empty() {
        return Err(EncodeError::NoFields(datum.name.clone()));
    }

    escape_into(buf, &datum.name, MEASUREMENT_ESCAPES);

    for (key, value) in &datum.tags {
        buf.push(',');
        escape_into(buf, key, LABEL_ESCAPES);
        buf.push('=');
        escape_into(buf, value, LABEL_ESCAPES);
    }

    for (i, (key, value)) in datum.fields.iter().enumerate() {
        buf.push(if i == 0 { ' ' } else { ',' });
        escape_into(buf, key, LABEL_ESCAPES);
        buf.push('=');
        write_field(buf, value)?;
    }

    let nanos = datum
        .time
        .timestamp_nanos_opt()
        .ok_or(EncodeError::OutOfRange("timestamp"))?;
    let _ = write!(buf, " {nanos}");
    Ok(())
}

fn write_field(buf: &mut String, value: &FieldValue) -> Result<(), EncodeError> {
    match value {
        FieldValue::Integer(v) => {
            let _ = write!(buf, "{v}i");
        }
        // Values above i64::MAX are written as-is; consumers that only accept
        // signed integers will reject them.
        FieldValue::Unsigned(v) => {
            let _ = write!(buf, "{v}i");
        }
        // `Display` for f64 yields the shortest round-trip form without an exponent.
        FieldValue::Float(v) if v.is_finite() => {
            let _ = write!(buf, "{v}");
        }
        FieldValue::Float(_) => {
            return Err(EncodeError::UnsupportedFieldType(
                "non-finite float".to_string(),
            ));
        }
        FieldValue::String(s) => {
            buf.push('"');
            escape_into(buf, s, &['"']);
            buf.push('"');
        }
        FieldValue::Boolean(b) => buf.push(if *b { 't' } else { 'f' }),
        FieldValue::Duration(d) => {
            let nanos = d
                .num_nanoseconds()
                .ok_or(EncodeError::OutOfRange("duration"))?;
            let _ = write!(buf, "{nanos}i");
        }
        FieldValue::Timestamp(t) => {
            let nanos = t
                .timestamp_nanos_opt()
                .ok_or(EncodeError::OutOfRange("timestamp"))?;
            let _ = write!(buf, "{nanos}i");
        }
        FieldValue::Null => return Err(EncodeError::NilFieldValue),
        FieldValue::Array(_) => {
            return Err(EncodeError::UnsupportedFieldType(
                value.type_name().to_string(),
            ));
        }
    }
    Ok(())
}

/// Line breaks are written as `\n` and `\r` in every position so a datum
/// always stays on one line.
fn escape_into(buf: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        match c {
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            c => {
                if special.contains(&c) {
                    buf.push('\\');
                }
                buf.push(c);
            }
        }
    }
}
