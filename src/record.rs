// src/record.rs
//
// Record decoding: one framed line of text into a validated Sample.
// Every attempt yields either a complete Sample or a tagged rejection; nothing here
// ever stops the stream.

use chrono::{DateTime, Local};
use serde_json::Value;
use std::fmt;

/// Wire field carrying the instantaneous flow rate (L/min)
pub const FLOW_FIELD: &str = "flow";
/// Wire field carrying the accumulated volume (L)
pub const TOTAL_VOLUME_FIELD: &str = "totalVolume";

// ============================================================================
// Types
// ============================================================================

/// One validated flow measurement
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub flow: f64,
    pub total_volume: f64,
    /// Assigned at decode time, never read from the wire
    pub observed_at: DateTime<Local>,
}

/// Why a line did not produce a Sample
#[derive(Clone, Debug, PartialEq)]
pub enum Rejected {
    /// Empty after trimming. Expected filler, not logged.
    Blank,
    /// Not well-formed JSON
    NotParseable { reason: String },
    /// Well-formed, but a required field is absent
    MissingField(&'static str),
    /// Well-formed, but a required field is not a number
    InvalidField { field: &'static str, found: String },
}

impl Rejected {
    /// Whether this rejection deserves a diagnostic log line
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Rejected::Blank)
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejected::Blank => write!(f, "blank line"),
            Rejected::NotParseable { reason } => write!(f, "not parseable: {}", reason),
            Rejected::MissingField(field) => write!(f, "missing field '{}'", field),
            Rejected::InvalidField { field, found } => {
                write!(f, "field '{}' is not numeric (found {})", field, found)
            }
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode one line, stamping the Sample with the current local time.
pub fn decode(line: &str) -> Result<Sample, Rejected> {
    decode_at(line, Local::now())
}

/// Decode one line with an explicit observation time.
pub fn decode_at(line: &str, observed_at: DateTime<Local>) -> Result<Sample, Rejected> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(Rejected::Blank);
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| Rejected::NotParseable {
        reason: e.to_string(),
    })?;

    let flow = numeric_field(&value, FLOW_FIELD)?;
    let total_volume = numeric_field(&value, TOTAL_VOLUME_FIELD)?;

    Ok(Sample {
        flow,
        total_volume,
        observed_at,
    })
}

fn numeric_field(value: &Value, field: &'static str) -> Result<f64, Rejected> {
    match value.get(field) {
        None | Some(Value::Null) => Err(Rejected::MissingField(field)),
        Some(v) => v.as_f64().ok_or_else(|| Rejected::InvalidField {
            field,
            found: v.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_valid_record() {
        let sample = decode(r#"{"flow":1.5,"totalVolume":10.0}"#).unwrap();
        assert_eq!(sample.flow, 1.5);
        assert_eq!(sample.total_volume, 10.0);
    }

    #[test]
    fn test_trims_whitespace_and_carriage_return() {
        let sample = decode("  {\"flow\":2,\"totalVolume\":3.25}\r").unwrap();
        assert_eq!(sample.flow, 2.0);
        assert_eq!(sample.total_volume, 3.25);
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let sample = decode(r#"{"flow":0,"totalVolume":0,"pulses":12}"#).unwrap();
        assert_eq!(sample.flow, 0.0);
    }

    #[test]
    fn test_observed_at_comes_from_decode_time() {
        let at = Local::now();
        let sample = decode_at(r#"{"flow":1,"totalVolume":2,"observedAt":"x"}"#, at).unwrap();
        assert_eq!(sample.observed_at, at);
    }

    #[test]
    fn test_blank_lines_are_silent() {
        assert_eq!(decode(""), Err(Rejected::Blank));
        assert_eq!(decode(" \t\r"), Err(Rejected::Blank));
        assert!(!Rejected::Blank.is_reportable());
    }

    #[test]
    fn test_malformed_json_is_not_parseable() {
        let err = decode(r#"{"bad json"#).unwrap_err();
        assert!(matches!(err, Rejected::NotParseable { .. }));
        assert!(err.is_reportable());
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            decode(r#"{"totalVolume":1}"#),
            Err(Rejected::MissingField(FLOW_FIELD))
        );
        assert_eq!(
            decode(r#"{"flow":1}"#),
            Err(Rejected::MissingField(TOTAL_VOLUME_FIELD))
        );
        assert_eq!(
            decode(r#"{"flow":null,"totalVolume":1}"#),
            Err(Rejected::MissingField(FLOW_FIELD))
        );
    }

    #[test]
    fn test_non_numeric_fields_are_invalid() {
        let err = decode(r#"{"flow":"1.5","totalVolume":1}"#).unwrap_err();
        assert_eq!(
            err,
            Rejected::InvalidField {
                field: FLOW_FIELD,
                found: "\"1.5\"".to_string()
            }
        );
    }

    #[test]
    fn test_non_object_json_is_missing_fields() {
        assert_eq!(decode("42"), Err(Rejected::MissingField(FLOW_FIELD)));
        assert_eq!(decode("[1,2]"), Err(Rejected::MissingField(FLOW_FIELD)));
    }
}
