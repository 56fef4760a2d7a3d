//! Outbound frame construction.
//!
//! A frame is the 13-byte header followed by the JSON payload. Frames are
//! built as a single contiguous buffer because each connection carries
//! exactly one request.
//!
//! # Example
//!
//! ```
//! use zabbix_sender::protocol::{encode_frame, HEADER_SIZE};
//!
//! let bytes = encode_frame(b"{}");
//! assert_eq!(bytes.len(), HEADER_SIZE + 2);
//! assert_eq!(&bytes[..5], b"ZBXD\x01");
//! ```

use bytes::Bytes;
use serde::Serialize;

use super::wire_format::{encode_header, HEADER_SIZE};
use crate::codec::JsonCodec;
use crate::error::Result;

/// Build a complete frame as a single byte vector.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&encode_header(payload.len()));
    buf.extend_from_slice(payload);
    buf
}

/// Serialize a message to JSON and frame it.
///
/// Returns `Bytes` so the frame can be moved into a spawned task cheaply.
pub fn encode_message<T: Serialize>(message: &T) -> Result<Bytes> {
    let payload = JsonCodec::encode(message)?;
    Ok(Bytes::from(encode_frame(&payload)))
}
