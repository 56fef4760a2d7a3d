//! Protocol module - wire format, framing and reply assembly.
//!
//! This module implements the trapper binary framing:
//! - 13-byte header encoding/decoding (magic + 8-byte length)
//! - Outbound frame construction
//! - Incremental assembler for replies arriving in pieces

mod frame;
mod frame_assembler;
mod wire_format;

pub use frame::{encode_frame, encode_message};
pub use frame_assembler::{AssemblerState, FrameAssembler};
pub use wire_format::{
    check_magic, decode_header, decode_length, decode_payload, encode_header, validate_length,
    DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, LENGTH_SIZE, MAGIC, MAGIC_SIZE,
};
