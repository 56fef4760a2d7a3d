//! Wire format encoding and decoding.
//!
//! Implements the 13-byte trapper frame header:
//! ```text
//! ┌──────────────────┬─────────────────────────────┬──────────┐
//! │ Magic            │ Length                      │ Payload  │
//! │ "ZBXD" 0x01      │ 8 bytes, uint64 LE          │ N bytes  │
//! │ 5 bytes          │ (only bytes 0-3 are read)   │ JSON     │
//! └──────────────────┴─────────────────────────────┴──────────┘
//! ```
//!
//! The length field reserves 8 bytes but is logically 32-bit: encoders write
//! all 8 bytes (upper 4 zero in practice), decoders read only the first 4.

use serde_json::Value;

use crate::codec::JsonCodec;
use crate::error::{Result, SenderError};

/// Frame marker: `"ZBXD"` followed by protocol version 1.
pub const MAGIC: [u8; MAGIC_SIZE] = *b"ZBXD\x01";

/// Magic size in bytes.
pub const MAGIC_SIZE: usize = 5;

/// Length field size in bytes.
pub const LENGTH_SIZE: usize = 8;

/// Full header size (magic + length field).
pub const HEADER_SIZE: usize = MAGIC_SIZE + LENGTH_SIZE;

/// Default maximum accepted reply payload size (1 GB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Encode the 13-byte header for a payload of `payload_len` bytes.
///
/// # Example
///
/// ```
/// use zabbix_sender::protocol::encode_header;
///
/// let header = encode_header(2);
/// assert_eq!(&header, b"ZBXD\x01\x02\x00\x00\x00\x00\x00\x00\x00");
/// ```
pub fn encode_header(payload_len: usize) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[..MAGIC_SIZE].copy_from_slice(&MAGIC);
    buf[MAGIC_SIZE..].copy_from_slice(&(payload_len as u64).to_le_bytes());
    buf
}

/// Validate the 5-byte frame marker.
///
/// # Errors
///
/// Returns [`SenderError::MalformedFrame`] if the bytes are not exactly [`MAGIC`].
pub fn check_magic(buf: &[u8]) -> Result<()> {
    if buf != MAGIC {
        return Err(SenderError::MalformedFrame(format!(
            "bad magic: {:?}",
            String::from_utf8_lossy(buf)
        )));
    }
    Ok(())
}

/// Read the payload length from the 8-byte length field.
///
/// Only bytes 0-3 are interpreted (little-endian); bytes 4-7 are ignored.
///
/// # Errors
///
/// Returns [`SenderError::MalformedFrame`] if fewer than 4 bytes are given.
pub fn decode_length(buf: &[u8]) -> Result<u32> {
    match buf.get(..4) {
        Some(low) => Ok(u32::from_le_bytes([low[0], low[1], low[2], low[3]])),
        None => Err(SenderError::MalformedFrame(format!(
            "length field too short: {} bytes",
            buf.len()
        ))),
    }
}

/// Decode a received header: validate the magic, then read the length.
///
/// # Example
///
/// ```
/// use zabbix_sender::protocol::decode_header;
///
/// let length = decode_header(b"ZBXD\x01", &[42, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
/// assert_eq!(length, 42);
/// assert!(decode_header(b"ABCD\x01", &[0; 8]).is_err());
/// ```
pub fn decode_header(magic: &[u8], length: &[u8]) -> Result<u32> {
    check_magic(magic)?;
    decode_length(length)
}

/// Reject a declared length above `max_payload_size`.
pub fn validate_length(length: u32, max_payload_size: u32) -> Result<()> {
    if length > max_payload_size {
        return Err(SenderError::MalformedFrame(format!(
            "payload size {} exceeds maximum {}",
            length, max_payload_size
        )));
    }
    Ok(())
}

/// Decode a reply payload of exactly `length` bytes into JSON.
///
/// # Errors
///
/// Returns [`SenderError::MalformedFrame`] on a length mismatch or invalid JSON.
pub fn decode_payload(data: &[u8], length: u32) -> Result<Value> {
    if data.len() != length as usize {
        return Err(SenderError::MalformedFrame(format!(
            "length mismatch: declared {}, got {}",
            length,
            data.len()
        )));
    }
    JsonCodec::decode(data)
}
