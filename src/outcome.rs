//! Per-chunk send outcome.
//!
//! Every chunk of a batch ends in exactly one [`SendOutcome`]. Failures are
//! recovered here and never abort the rest of the batch; callers that prefer
//! `?` propagation use [`SendOutcome::into_result`].

use std::fmt;

use serde_json::Value;

use crate::error::{Result, SenderError};
use crate::response::Reply;

/// Why a reply was not accepted as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// Bytes received violated the magic/length/JSON expectations.
    MalformedFrame,
    /// The reply's `info` text did not contain the expected counters.
    UnparseableResponse,
    /// Strict policy: the server rejected one or more data points.
    DataRejected,
}

/// Why the exchange itself did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Could not connect.
    Connect,
    /// Connection failed or closed mid-exchange.
    Dropped,
    /// Connect or exchange exceeded the timeout.
    Timeout,
    /// The aggregate send was dropped before this chunk was transmitted.
    Cancelled,
}

/// Result of sending one chunk.
#[derive(Debug)]
pub enum SendOutcome {
    /// The server replied with parseable counters.
    Success(Reply),
    /// A reply arrived but could not be accepted.
    ProtocolError {
        kind: ProtocolErrorKind,
        detail: String,
        /// Raw reply object, when one was decoded.
        response: Option<Value>,
    },
    /// No reply could be obtained.
    ConnectionError {
        kind: ConnectionErrorKind,
        detail: String,
    },
}

impl SendOutcome {
    /// Classify the result of one exchange.
    pub fn from_result(result: Result<Reply>) -> Self {
        match result {
            Ok(reply) => SendOutcome::Success(reply),
            Err(e) => Self::from_error(e),
        }
    }

    fn from_error(error: SenderError) -> Self {
        let detail = error.to_string();

        let connection_kind = match &error {
            SenderError::Connect { .. } => Some(ConnectionErrorKind::Connect),
            SenderError::Timeout => Some(ConnectionErrorKind::Timeout),
            SenderError::Cancelled => Some(ConnectionErrorKind::Cancelled),
            SenderError::ConnectionClosed => Some(ConnectionErrorKind::Dropped),
            SenderError::Io(e) if is_timeout(e) => Some(ConnectionErrorKind::Timeout),
            SenderError::Io(_) => Some(ConnectionErrorKind::Dropped),
            _ => None,
        };
        if let Some(kind) = connection_kind {
            return SendOutcome::ConnectionError { kind, detail };
        }

        // Json (outbound encoding) lands here too: nothing valid reached the server.
        let (kind, response) = match error {
            SenderError::UnparseableResponse { response } => {
                (ProtocolErrorKind::UnparseableResponse, Some(response))
            }
            SenderError::DataRejected { response, .. } => {
                (ProtocolErrorKind::DataRejected, Some(response))
            }
            _ => (ProtocolErrorKind::MalformedFrame, None),
        };
        SendOutcome::ProtocolError {
            kind,
            detail,
            response,
        }
    }

    /// Whether the chunk was delivered and the reply understood.
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Success(_))
    }

    /// The reply, if the chunk succeeded.
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            SendOutcome::Success(reply) => Some(reply),
            _ => None,
        }
    }

    /// The raw reply object, if one was decoded.
    pub fn response(&self) -> Option<&Value> {
        match self {
            SendOutcome::Success(reply) => Some(&reply.response),
            SendOutcome::ProtocolError { response, .. } => response.as_ref(),
            SendOutcome::ConnectionError { .. } => None,
        }
    }

    /// Convert into a `Result` for `?`-style error reporting.
    ///
    /// Error variants carry the outcome's detail text; the underlying
    /// `SenderError` source chain is not preserved.
    pub fn into_result(self) -> Result<Reply> {
        match self {
            SendOutcome::Success(reply) => Ok(reply),
            SendOutcome::ProtocolError {
                kind,
                detail,
                response,
            } => Err(match (kind, response) {
                (ProtocolErrorKind::UnparseableResponse, Some(response)) => {
                    SenderError::UnparseableResponse { response }
                }
                (ProtocolErrorKind::DataRejected, Some(response)) => {
                    let info = response
                        .get("info")
                        .and_then(Value::as_str)
                        .and_then(crate::response::parse_info);
                    match info {
                        Some(info) => SenderError::DataRejected { info, response },
                        None => SenderError::UnparseableResponse { response },
                    }
                }
                _ => SenderError::MalformedFrame(detail),
            }),
            SendOutcome::ConnectionError { kind, detail } => Err(match kind {
                ConnectionErrorKind::Timeout => SenderError::Timeout,
                ConnectionErrorKind::Cancelled => SenderError::Cancelled,
                ConnectionErrorKind::Dropped => SenderError::ConnectionClosed,
                ConnectionErrorKind::Connect => SenderError::Connect {
                    addr: String::new(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, detail),
                },
            }),
        }
    }
}

impl From<Result<Reply>> for SendOutcome {
    fn from(result: Result<Reply>) -> Self {
        Self::from_result(result)
    }
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendOutcome::Success(reply) => write!(
                f,
                "success: processed {}, failed {}",
                reply.info.processed, reply.info.failed
            ),
            SendOutcome::ProtocolError { kind, detail, .. } => {
                write!(f, "protocol error ({:?}): {}", kind, detail)
            }
            SendOutcome::ConnectionError { kind, detail } => {
                write!(f, "connection error ({:?}): {}", kind, detail)
            }
        }
    }
}

fn is_timeout(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}
