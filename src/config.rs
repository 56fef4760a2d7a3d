//! Sender configuration.
//!
//! Plain serde-friendly settings so they can be embedded in an application's
//! own config file; [`SenderBuilder`](crate::SenderBuilder) is the fluent way
//! to construct them in code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::response::FailurePolicy;

/// Default server address.
pub const DEFAULT_SERVER: &str = "127.0.0.1";

/// Default trapper port.
pub const DEFAULT_PORT: u16 = 10051;

/// Default bound on connect plus the full request/reply exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection and interpretation settings shared by both sender variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Server host name or IP.
    pub server: String,
    /// Server trapper port.
    pub port: u16,
    /// Bound on connect plus the whole exchange, per chunk.
    pub timeout: Duration,
    /// Classification of replies reporting rejected points.
    pub failure_policy: FailurePolicy,
    /// Largest reply payload accepted, in bytes.
    pub max_reply_size: u32,
    /// Cap on simultaneously open connections for the async sender.
    /// `None` sends every chunk at once.
    pub max_concurrent_connections: Option<usize>,
}

impl SenderConfig {
    /// `host:port` form used in logs and connect errors.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            failure_policy: FailurePolicy::Lenient,
            max_reply_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_concurrent_connections: None,
        }
    }
}
