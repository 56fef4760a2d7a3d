//! Error types for zabbix-sender.

use thiserror::Error;

use crate::response::ReplyInfo;

/// Main error type for all sender operations.
#[derive(Debug, Error)]
pub enum SenderError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error while building an outbound message.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Could not establish the connection to the server.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Connection closed before a complete reply frame arrived.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Connect or request/reply exchange exceeded the configured timeout.
    #[error("Timed out")]
    Timeout,

    /// The aggregate send was dropped before this chunk was transmitted.
    #[error("Send cancelled before transmission")]
    Cancelled,

    /// Reply bytes violate the framing format (magic, length or JSON body).
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Reply frame was well formed but its `info` text has no counters.
    #[error("Unable to parse server response: {response}")]
    UnparseableResponse { response: serde_json::Value },

    /// Strict policy only: the server rejected some of the data points.
    #[error("Server rejected {} data point(s): {response}", info.failed)]
    DataRejected {
        info: ReplyInfo,
        response: serde_json::Value,
    },
}

/// Result type alias using SenderError.
pub type Result<T> = std::result::Result<T, SenderError>;
