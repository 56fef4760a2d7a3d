//! Data points and the outbound sender message.
//!
//! ```text
//! {"request": "sender data", "clock": 1700000000, "data": [
//!     {"host": "web01", "key": "cpu.load", "value": 0.42, "clock": 1699999990}
//! ]}
//!
//! {"request": "history data", "host": "proxy-a", "data": [
//!     {"host": "web01", "key": "cpu.load", "value": 0.42}
//! ]}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Value of a data point.
///
/// Serialized untagged so numbers stay JSON numbers and strings stay strings.
/// The server decides how to interpret it; matching the item's type is the
/// caller's responsibility.
///
/// NaN and infinite floats have no JSON form and fail to serialize, so the
/// chunk carrying them reports an error instead of sending `null`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ItemValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Serialize for ItemValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ItemValue::Int(v) => serializer.serialize_i64(*v),
            ItemValue::Float(v) if v.is_finite() => serializer.serialize_f64(*v),
            ItemValue::Float(v) => Err(serde::ser::Error::custom(format!(
                "non-finite value {} cannot be sent",
                v
            ))),
            ItemValue::Str(v) => serializer.serialize_str(v),
        }
    }
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemValue::Int(v) => write!(f, "{}", v),
            ItemValue::Float(v) => write!(f, "{}", v),
            ItemValue::Str(v) => write!(f, "{:?}", v),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for ItemValue {
            fn from(v: $t) -> Self {
                ItemValue::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for ItemValue {
    fn from(v: f32) -> Self {
        ItemValue::Float(f64::from(v))
    }
}

impl From<f64> for ItemValue {
    fn from(v: f64) -> Self {
        ItemValue::Float(v)
    }
}

impl From<&str> for ItemValue {
    fn from(v: &str) -> Self {
        ItemValue::Str(v.to_string())
    }
}

impl From<String> for ItemValue {
    fn from(v: String) -> Self {
        ItemValue::Str(v)
    }
}

/// One telemetry sample: host, item key, value and optional Unix timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub host: String,
    pub key: String,
    pub value: ItemValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<i64>,
}

impl DataPoint {
    /// Create a data point without a timestamp; the server assigns one.
    pub fn new(host: impl Into<String>, key: impl Into<String>, value: impl Into<ItemValue>) -> Self {
        Self {
            host: host.into(),
            key: key.into(),
            value: value.into(),
            clock: None,
        }
    }

    /// Attach the Unix timestamp at which the value was measured.
    pub fn with_clock(mut self, clock: i64) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} = {}", self.host, self.key, self.value)?;
        if let Some(clock) = self.clock {
            write!(f, " @{}", clock)?;
        }
        Ok(())
    }
}

/// Request type of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestKind {
    /// Regular trapper submission.
    #[serde(rename = "sender data")]
    SenderData,
    /// Proxy relay submission; the message `host` names the proxy.
    #[serde(rename = "history data")]
    HistoryData,
}

/// Outbound message for one chunk, borrowing the chunk's points.
#[derive(Debug, Clone, Serialize)]
pub struct SenderMessage<'a> {
    pub request: RequestKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<i64>,
    pub data: &'a [DataPoint],
}

impl<'a> SenderMessage<'a> {
    /// A `sender data` message. `packet_clock` applies server-side to every
    /// point that has no clock of its own.
    pub fn sender_data(data: &'a [DataPoint], packet_clock: Option<i64>) -> Self {
        Self {
            request: RequestKind::SenderData,
            host: None,
            clock: packet_clock,
            data,
        }
    }

    /// A `history data` message impersonating the proxy named `proxy`.
    pub fn history_data(proxy: &'a str, data: &'a [DataPoint]) -> Self {
        Self {
            request: RequestKind::HistoryData,
            host: Some(proxy),
            clock: None,
            data,
        }
    }
}
