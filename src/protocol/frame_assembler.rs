//! Incremental assembler for reply frames.
//!
//! Uses `bytes::BytesMut` to hold the unconsumed tail between reads.
//! Implements a state machine for handling fragmented replies:
//! - `AwaitingMagic`: need 5 bytes
//! - `AwaitingHeader`: need 8 bytes (length field)
//! - `AwaitingPayload`: need the declared number of payload bytes
//! - `Done` / `Failed`: terminal, nothing more is consumed
//!
//! The trapper protocol carries exactly one reply per connection, so the
//! assembler stops after the first frame instead of looping back to
//! `AwaitingMagic`.
//!
//! # Example
//!
//! ```
//! use zabbix_sender::protocol::{encode_frame, FrameAssembler};
//!
//! let frame = encode_frame(br#"{"response":"success"}"#);
//! let mut assembler = FrameAssembler::new();
//!
//! assert!(assembler.push(&frame[..7]).unwrap().is_none());
//! let reply = assembler.push(&frame[7..]).unwrap().unwrap();
//! assert_eq!(reply["response"], "success");
//! assert!(assembler.is_done());
//! ```

use bytes::{Buf, BytesMut};
use serde_json::Value;

use super::wire_format::{
    check_magic, decode_length, decode_payload, validate_length, DEFAULT_MAX_PAYLOAD_SIZE,
    LENGTH_SIZE, MAGIC_SIZE,
};
use crate::error::Result;

/// Initial tail capacity; replies are small status objects.
const INITIAL_CAPACITY: usize = 1024;

/// Assembler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Waiting for the 5-byte marker.
    AwaitingMagic,
    /// Marker validated, waiting for the 8-byte length field.
    AwaitingHeader,
    /// Length known, waiting for `length` payload bytes.
    AwaitingPayload { length: u32 },
    /// A reply was emitted.
    Done,
    /// The reply violated the frame format.
    Failed,
}

impl AssemblerState {
    /// Whether the assembler will consume no more bytes.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssemblerState::Done | AssemblerState::Failed)
    }
}

/// Pull-based assembler that turns arbitrarily-sized chunks into one reply.
#[derive(Debug)]
pub struct FrameAssembler {
    /// Bytes received but not yet consumed by a transition.
    tail: BytesMut,
    /// Current parsing state.
    state: AssemblerState,
    /// Maximum allowed declared payload size.
    max_payload_size: u32,
    /// Bytes received after the reply was complete.
    discarded: usize,
}

impl FrameAssembler {
    /// Create a new assembler with the default payload limit (1 GB).
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new assembler with a custom payload limit.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            tail: BytesMut::with_capacity(INITIAL_CAPACITY),
            state: AssemblerState::AwaitingMagic,
            max_payload_size,
            discarded: 0,
        }
    }

    /// Feed one chunk of received bytes.
    ///
    /// Returns `Ok(Some(reply))` once the frame is complete, `Ok(None)` while
    /// more bytes are needed (and after a terminal state is reached).
    ///
    /// # Errors
    ///
    /// Returns [`SenderError::MalformedFrame`](crate::SenderError::MalformedFrame)
    /// on a bad magic, an oversized length, or an unparseable payload. The
    /// assembler is then `Failed` and ignores further input.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Value>> {
        if self.state.is_terminal() {
            self.discarded += chunk.len();
            return Ok(None);
        }

        self.tail.extend_from_slice(chunk);

        while !self.state.is_terminal() {
            let needed = self.bytes_needed();
            if self.tail.len() < needed {
                tracing::trace!(
                    state = ?self.state,
                    buffered = self.tail.len(),
                    needed,
                    "Waiting for more reply bytes"
                );
                return Ok(None);
            }

            let step = self.tail.split_to(needed);
            match self.transition(&step) {
                Ok(Some(reply)) => {
                    self.discarded += self.tail.len();
                    self.tail.clear();
                    return Ok(Some(reply));
                }
                Ok(None) => {}
                Err(e) => {
                    self.state = AssemblerState::Failed;
                    self.tail.clear();
                    return Err(e);
                }
            }
        }

        Ok(None)
    }

    /// Apply the current state's transition to exactly `bytes_needed()` bytes.
    fn transition(&mut self, step: &[u8]) -> Result<Option<Value>> {
        match self.state {
            AssemblerState::AwaitingMagic => {
                check_magic(step)?;
                self.state = AssemblerState::AwaitingHeader;
                Ok(None)
            }
            AssemblerState::AwaitingHeader => {
                let length = decode_length(step)?;
                validate_length(length, self.max_payload_size)?;
                tracing::trace!(length, "Received reply length");
                self.state = AssemblerState::AwaitingPayload { length };
                Ok(None)
            }
            AssemblerState::AwaitingPayload { length } => {
                let reply = decode_payload(step, length)?;
                self.state = AssemblerState::Done;
                Ok(Some(reply))
            }
            AssemblerState::Done | AssemblerState::Failed => Ok(None),
        }
    }

    /// Number of bytes the current state needs before it can transition.
    pub fn bytes_needed(&self) -> usize {
        match self.state {
            AssemblerState::AwaitingMagic => MAGIC_SIZE,
            AssemblerState::AwaitingHeader => LENGTH_SIZE,
            AssemblerState::AwaitingPayload { length } => length as usize,
            AssemblerState::Done | AssemblerState::Failed => 0,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Whether a reply has been emitted.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.state == AssemblerState::Done
    }

    /// Number of buffered, unconsumed bytes.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.tail.remaining()
    }

    /// Bytes received after the reply was complete and dropped.
    #[inline]
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
