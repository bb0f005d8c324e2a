//! Stream record parsing and routing
//!
//! Records are loosely shaped JSON objects. Each field is extracted with an
//! explicit presence check so one odd field never discards the rest.

use serde_json::Value;
use std::fmt;

/// Message used when an upstream error value is not a string
pub(crate) const UNKNOWN_ERROR: &str = "Unknown error";

/// Which side of a comparison a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub(crate) const BOTH: [Side; 2] = [Side::A, Side::B];

    /// Channel tag used on the wire
    pub(crate) fn channel(self) -> &'static str {
        match self {
            Side::A => "A",
            Side::B => "B",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model {}", self.channel())
    }
}

/// One parsed `data: ` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StreamRecord {
    pub(crate) model: Option<String>,
    pub(crate) channel: Option<String>,
    pub(crate) chunk: Option<String>,
    pub(crate) complete: bool,
    pub(crate) output_id: Option<String>,
    pub(crate) error: Option<String>,
}

/// Why a payload could not be turned into a record
#[derive(Debug, thiserror::Error)]
pub(crate) enum RecordError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record is not a JSON object")]
    NotAnObject,
}

impl StreamRecord {
    /// Parse a record payload.
    pub(crate) fn parse(payload: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(payload)?;
        let Value::Object(fields) = value else {
            return Err(RecordError::NotAnObject);
        };

        let string_field = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            model: string_field("model"),
            channel: string_field("channel"),
            chunk: string_field("chunk"),
            complete: matches!(fields.get("complete"), Some(Value::Bool(true))),
            output_id: string_field("output_id"),
            error: fields.get("error").and_then(normalize_error),
        })
    }

    /// Non-empty chunk text, if any
    pub(crate) fn chunk_text(&self) -> Option<&str> {
        self.chunk.as_deref().filter(|chunk| !chunk.is_empty())
    }

    /// Attribute the record to a side by channel tag first, then by model id.
    ///
    /// Returns `None` when neither discriminator matches.
    pub(crate) fn route(&self, model_a: &str, model_b: &str) -> Option<Side> {
        if let Some(channel) = self.channel.as_deref() {
            if channel == Side::A.channel() {
                return Some(Side::A);
            }
            if channel == Side::B.channel() {
                return Some(Side::B);
            }
        }
        match self.model.as_deref() {
            Some(model) if model == model_a => Some(Side::A),
            Some(model) if model == model_b => Some(Side::B),
            _ => None,
        }
    }
}

/// Falsy values (`null`, `false`, `""`, `0`) mean "no error". Any other
/// non-string value becomes a generic message.
fn normalize_error(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) if message.is_empty() => None,
        Value::String(message) => Some(message.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        _ => Some(UNKNOWN_ERROR.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_record() {
        let record = StreamRecord::parse(
            r#"{"model":"m1","chunk":"Hi","complete":true,"output_id":"o1","error":"boom"}"#,
        )
        .expect("parse");
        assert_eq!(
            record,
            StreamRecord {
                model: Some("m1".to_string()),
                channel: None,
                chunk: Some("Hi".to_string()),
                complete: true,
                output_id: Some("o1".to_string()),
                error: Some("boom".to_string()),
            }
        );
    }

    #[test]
    fn test_loose_fields_are_tolerated() {
        // complete must be exactly `true`; a wrongly typed chunk does not drop the record
        let record =
            StreamRecord::parse(r#"{"chunk":42,"complete":"true","output_id":"o"}"#).expect("parse");
        assert_eq!(record.chunk, None);
        assert!(!record.complete);
        assert_eq!(record.output_id.as_deref(), Some("o"));
    }

    #[test]
    fn test_non_string_error_is_normalized() {
        let record = StreamRecord::parse(r#"{"error":{"code":500}}"#).expect("parse");
        assert_eq!(record.error.as_deref(), Some(UNKNOWN_ERROR));

        let record = StreamRecord::parse(r#"{"error":null}"#).expect("parse");
        assert_eq!(record.error, None);

        let record = StreamRecord::parse(r#"{"error":""}"#).expect("parse");
        assert_eq!(record.error, None);
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            StreamRecord::parse("{not json"),
            Err(RecordError::Json(_))
        ));
        assert!(matches!(
            StreamRecord::parse("[1,2]"),
            Err(RecordError::NotAnObject)
        ));
    }

    #[test]
    fn test_empty_chunk_is_ignored() {
        let record = StreamRecord::parse(r#"{"chunk":""}"#).expect("parse");
        assert_eq!(record.chunk_text(), None);
    }

    #[test]
    fn test_routing() {
        let by_model = StreamRecord {
            model: Some("gpt".to_string()),
            ..Default::default()
        };
        assert_eq!(by_model.route("gpt", "claude"), Some(Side::A));
        assert_eq!(by_model.route("claude", "gpt"), Some(Side::B));
        assert_eq!(by_model.route("x", "y"), None);

        let by_channel = StreamRecord {
            channel: Some("B".to_string()),
            model: Some("gpt".to_string()),
            ..Default::default()
        };
        assert_eq!(by_channel.route("gpt", "claude"), Some(Side::B));

        let unknown_channel = StreamRecord {
            channel: Some("C".to_string()),
            ..Default::default()
        };
        assert_eq!(unknown_channel.route("gpt", "claude"), None);
    }
}
