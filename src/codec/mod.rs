//! Codec module - serialization/deserialization for frame payloads.
//!
//! The trapper protocol carries UTF-8 JSON in both directions:
//!
//! - [`JsonCodec`] - `serde_json` encode for outbound messages, untyped decode
//!   for replies
//!
//! # Design
//!
//! Codecs are implemented as marker structs with static methods rather than trait objects.

mod json;

pub use json::JsonCodec;
