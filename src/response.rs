//! Interpretation of the server's reply.
//!
//! The server answers with `{"response": "success", "info": "..."}` where
//! `info` is free text such as
//! `processed: 3; failed: 1; total: 4; seconds spent: 0.000123`.
//! The counters are recovered by pattern extraction so that surrounding
//! wording may change without breaking the client.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SenderError};

static FAILED_COUNTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*failed.+?(\d+).*$").expect("valid failed pattern"));

static PROCESSED_COUNTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*processed.+?(\d+).*$").expect("valid processed pattern"));

static SECONDS_SPENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.*seconds spent.+?((-|\+|\d|\.|e|E)+).*$").expect("valid seconds pattern")
});

/// Counters parsed from the reply's `info` text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplyInfo {
    pub processed: u64,
    pub failed: u64,
    pub seconds_spent: Option<f64>,
}

/// A well-formed, parseable reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Parsed counters.
    pub info: ReplyInfo,
    /// The decoded reply object as received.
    pub response: Value,
}

/// How a reply with `failed > 0` is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Rejected points are data inside a successful [`Reply`].
    #[default]
    Lenient,
    /// Rejected points turn the exchange into [`SenderError::DataRejected`].
    Strict,
}

/// Extract the counters from an `info` text.
///
/// Returns `None` unless both the failed and processed counters are present.
///
/// # Example
///
/// ```
/// use zabbix_sender::response::parse_info;
///
/// let info = parse_info("processed: 3; failed: 1; total: 4; seconds spent: 0.000123").unwrap();
/// assert_eq!((info.processed, info.failed), (3, 1));
/// assert_eq!(info.seconds_spent, Some(0.000123));
/// ```
pub fn parse_info(text: &str) -> Option<ReplyInfo> {
    let text = text.to_lowercase();

    let failed = capture(&FAILED_COUNTER, &text)?.parse().ok()?;
    let processed = capture(&PROCESSED_COUNTER, &text)?.parse().ok()?;
    let seconds_spent = capture(&SECONDS_SPENT, &text).and_then(|s| s.parse().ok());

    Some(ReplyInfo {
        processed,
        failed,
        seconds_spent,
    })
}

fn capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Classify a decoded reply object.
///
/// # Errors
///
/// - [`SenderError::UnparseableResponse`] when the counters cannot be found
/// - [`SenderError::DataRejected`] under [`FailurePolicy::Strict`] when
///   `failed > 0`
pub fn interpret(response: Value, policy: FailurePolicy) -> Result<Reply> {
    let text = response.get("info").and_then(Value::as_str).unwrap_or("");

    let info = match parse_info(text) {
        Some(info) => info,
        None => {
            tracing::warn!(%response, "Unable to parse server response");
            return Err(SenderError::UnparseableResponse { response });
        }
    };

    if info.failed > 0 {
        tracing::warn!(
            processed = info.processed,
            failed = info.failed,
            "Server reported failed data points"
        );
        if policy == FailurePolicy::Strict {
            return Err(SenderError::DataRejected { info, response });
        }
    }

    Ok(Reply { info, response })
}
