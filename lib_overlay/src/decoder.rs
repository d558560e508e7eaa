//! Raw frame to [`Snapshot`] decoding.
//!
//! A failed decode discards that one frame. Producers emit partial frames
//! while switching songs, so the caller logs the error and moves on.

use serde_json::Value;
use thiserror::Error;

use crate::snapshot::Snapshot;
use crate::transport::RawMessage;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("binary frame is not valid UTF-8")]
    NotUtf8,

    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    ShapeMismatch(&'static str),
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder;

impl Decoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, raw: &RawMessage) -> Result<Snapshot, DecodeError> {
        let value: Value = match raw {
            RawMessage::Text(text) => serde_json::from_str(text)?,
            RawMessage::Binary(bytes) => {
                let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
                serde_json::from_str(text)?
            }
        };

        let kind = kind_of(&value);
        Snapshot::from_value(value).ok_or(DecodeError::ShapeMismatch(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_text_and_binary_objects() {
        let decoder = Decoder::new();
        let snap = decoder
            .decode(&RawMessage::from(r#"{"state": 2, "gameplay": {"hit_100": 4}}"#))
            .unwrap();
        assert_eq!(snap.root().len(), 2);

        let bin = RawMessage::Binary(br#"{"current_pp": 12.5}"#.to_vec());
        assert!(decoder.decode(&bin).is_ok());
    }

    #[test]
    fn test_rejects_malformed_and_non_objects() {
        let decoder = Decoder::new();
        assert!(matches!(
            decoder.decode(&RawMessage::from(r#"{"state": 2"#)),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decoder.decode(&RawMessage::from("")),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decoder.decode(&RawMessage::from("[1, 2]")),
            Err(DecodeError::ShapeMismatch("an array"))
        ));
        assert!(matches!(
            decoder.decode(&RawMessage::Binary(vec![0xff, 0xfe])),
            Err(DecodeError::NotUtf8)
        ));
    }
}
