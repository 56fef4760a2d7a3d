//! JSON codec for trapper payloads using `serde_json`.
//!
//! Outbound messages are serialized compactly. Inbound payloads are decoded
//! into an untyped [`serde_json::Value`] because the reply shape is
//! server-defined and only the `info` field is interpreted.
//!
//! # Example
//!
//! ```
//! use zabbix_sender::codec::JsonCodec;
//! use serde_json::json;
//!
//! let encoded = JsonCodec::encode(&json!({"request": "sender data"})).unwrap();
//! assert_eq!(encoded, br#"{"request":"sender data"}"#);
//!
//! let decoded = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded["request"], "sender data");
//! ```

use serde_json::Value;

use crate::error::{Result, SenderError};

/// JSON codec for frame payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to compact UTF-8 JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Decode a reply payload.
    ///
    /// Any parse failure (including trailing bytes after the JSON document)
    /// is a [`SenderError::MalformedFrame`], not a JSON error: the bytes came
    /// off the wire and violate the frame format.
    pub fn decode(bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes)
            .map_err(|e| SenderError::MalformedFrame(format!("invalid json: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct Probe<'a> {
        request: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        clock: Option<i64>,
    }

    #[test]
    fn test_encode_is_compact() {
        let encoded = JsonCodec::encode(&Probe {
            request: "sender data",
            clock: Some(10),
        })
        .unwrap();
        assert_eq!(encoded, br#"{"request":"sender data","clock":10}"#);
    }

    #[test]
    fn test_encode_skips_absent_fields() {
        let encoded = JsonCodec::encode(&Probe {
            request: "sender data",
            clock: None,
        })
        .unwrap();
        assert_eq!(encoded, br#"{"request":"sender data"}"#);
    }

    #[test]
    fn test_decode_reply() {
        let decoded =
            JsonCodec::decode(br#"{"response":"success","info":"processed: 1"}"#).unwrap();
        assert_eq!(decoded, json!({"response": "success", "info": "processed: 1"}));
    }

    #[test]
    fn test_decode_empty_is_malformed() {
        let err = JsonCodec::decode(b"").unwrap_err();
        assert!(matches!(err, SenderError::MalformedFrame(_)));
        assert!(err.to_string().contains("invalid json"));
    }

    #[test]
    fn test_decode_trailing_garbage_is_malformed() {
        let err = JsonCodec::decode(br#"{"info":"x"}}"#).unwrap_err();
        assert!(matches!(err, SenderError::MalformedFrame(_)));
    }

    #[test]
    fn test_utf8_preserved() {
        let value = json!({"key": "temperatura.sala", "value": "café ☕"});
        let encoded = JsonCodec::encode(&value).unwrap();
        assert_eq!(JsonCodec::decode(&encoded).unwrap(), value);
    }
}
