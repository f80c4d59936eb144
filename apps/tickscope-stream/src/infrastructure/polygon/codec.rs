//! Frame Codec
//!
//! Polygon batches messages into JSON arrays but control replies sometimes
//! arrive as a bare object. Both decode to a list of raw JSON values.

use serde_json::Value;

use super::messages::ControlRequest;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but neither an object nor an array.
    #[error("invalid frame format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for Polygon stock and option streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into its messages, in frame order.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or is a JSON scalar.
    pub fn decode(&self, text: &str) -> Result<Vec<Value>, CodecError> {
        match serde_json::from_str::<Value>(text.trim())? {
            Value::Array(messages) => Ok(messages),
            object @ Value::Object(_) => Ok(vec![object]),
            other => Err(CodecError::InvalidFormat(format!(
                "expected object or array, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Encode a control frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, request: &ControlRequest) -> Result<String, CodecError> {
        Ok(serde_json::to_string(request)?)
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_array_in_order() {
        let codec = JsonCodec::new();
        let messages = codec
            .decode(r#"[{"ev":"T","sym":"TSLA","p":1.0},{"ev":"Q","sym":"TSLA"}]"#)
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["ev"], "T");
        assert_eq!(messages[1]["ev"], "Q");
    }

    #[test]
    fn decodes_single_object() {
        let codec = JsonCodec::new();
        let messages = codec
            .decode(r#"  {"ev":"status","status":"connected"}  "#)
            .unwrap();

        assert_eq!(messages, vec![json!({"ev": "status", "status": "connected"})]);
    }

    #[test]
    fn empty_array_is_empty() {
        assert!(JsonCodec::new().decode("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_scalar() {
        let err = JsonCodec::new().decode("42").unwrap_err();
        assert!(matches!(err, CodecError::InvalidFormat(_)));
    }

    #[test]
    fn rejects_garbage() {
        let err = JsonCodec::new().decode("not json").unwrap_err();
        assert!(matches!(err, CodecError::Json(_)));
    }

    #[test]
    fn encodes_control_frame() {
        let text = JsonCodec::new()
            .encode(&ControlRequest::auth("k"))
            .unwrap();
        assert_eq!(text, r#"{"action":"auth","params":"k"}"#);
    }
}
