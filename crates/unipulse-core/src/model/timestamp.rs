// ── Bucket timestamps ──
//
// The store hands back either epoch numbers (when asked for a precision)
// or RFC 3339 strings. Buckets are keyed by the exact value received; no
// fuzzy alignment. Ordering is what matters: epochs compare numerically,
// text compares by instant when it parses and lexically when it does not.

use std::cmp::Ordering;
use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timestamp of a time bucket, exactly as the store reported it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Epoch in the precision the query requested (milliseconds by default).
    Epoch(i64),
    /// Textual timestamp, normally RFC 3339.
    Text(String),
}

impl Timestamp {
    /// Read a timestamp cell. `None` for null, empty or non-scalar values.
    ///
    /// Whole floats become epochs; fractional ones stay text so two cells
    /// inside the same millisecond never share a bucket.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Epoch).or_else(|| {
                let f = n.as_f64().filter(|f| f.is_finite())?;
                if f.fract().abs() < f64::EPSILON && f.abs() < 9.0e15 {
                    Some(Self::Epoch(f as i64))
                } else {
                    Some(Self::Text(n.to_string()))
                }
            }),
            Value::String(s) if !s.trim().is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Milliseconds since the Unix epoch.
    ///
    /// Epoch values are assumed to already be in milliseconds.
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Self::Epoch(ms) => Some(*ms),
            Self::Text(s) => parse_millis(s),
        }
    }
}

/// RFC 3339 instant, or a fractional epoch kept as text (floored).
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn parse_millis(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
        .or_else(|| {
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f.floor() as i64)
        })
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Epoch(a), Self::Epoch(b)) => a.cmp(b),
            (Self::Epoch(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Epoch(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => match (parse_millis(a), parse_millis(b)) {
                (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                // Parseable instants sort ahead of opaque text.
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => a.cmp(b),
            },
        }
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epoch(ms) => write!(f, "{ms}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Timestamp {
    fn from(ms: i64) -> Self {
        Self::Epoch(ms)
    }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}
