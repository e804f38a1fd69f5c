// ── Query-string safety primitives ──
//
// Every token that reaches a query string goes through one of these first:
// literals and identifiers are escaped by quote doubling, bare tokens
// (time ranges, tag keys, measurement names) are checked against a fixed
// grammar. Validation is the only thing standing between a config file or a
// CLI flag and the telemetry store, so it runs before interpolation, never
// after.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ASCII classes on purpose: `\d` in `regex` matches every Unicode digit.
static TIME_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[mhd]$").expect("time range pattern is valid"));

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]*$").expect("identifier pattern is valid")
});

// ── Escaping ────────────────────────────────────────────────────────

/// Escape a value for use inside a single-quoted string literal.
///
/// Every `'` is doubled. Non-string values are rendered through `Display`
/// first, so numbers and booleans can be passed straight in.
pub fn escape_string_literal(value: impl fmt::Display) -> String {
    value.to_string().replace('\'', "''")
}

/// Escape a value for use inside a double-quoted identifier.
///
/// Every `"` is doubled.
pub fn escape_identifier(value: impl fmt::Display) -> String {
    value.to_string().replace('"', "\"\"")
}

// ── Validation ──────────────────────────────────────────────────────

/// Check a lookback token such as `15m`, `24h` or `30d`.
///
/// Returns the token unchanged when it matches `^\d+[mhd]$`.
pub fn validate_time_range(token: &str) -> Result<&str, ValidationError> {
    if TIME_RANGE.is_match(token) {
        Ok(token)
    } else {
        Err(ValidationError::TimeRange {
            token: token.to_owned(),
        })
    }
}

/// Check a bare identifier such as a tag key or measurement name.
///
/// Returns the token unchanged when it matches `^[a-zA-Z_][a-zA-Z0-9_-]*$`.
pub fn validate_identifier(token: &str) -> Result<&str, ValidationError> {
    if IDENTIFIER.is_match(token) {
        Ok(token)
    } else {
        Err(ValidationError::Identifier {
            token: token.to_owned(),
        })
    }
}

// ── Validated tokens ────────────────────────────────────────────────

/// A lookback window or bucket width that has passed [`validate_time_range`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange(String);

impl TimeRange {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wall-clock length of the window. Saturates on absurd magnitudes.
    pub fn duration(&self) -> Duration {
        let (digits, unit) = self.0.split_at(self.0.len() - 1);
        let amount = digits.parse::<u64>().unwrap_or(u64::MAX);
        let unit_secs = match unit {
            "m" => 60,
            "h" => 3_600,
            _ => 86_400,
        };
        Duration::from_secs(amount.saturating_mul(unit_secs))
    }
}

impl FromStr for TimeRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_time_range(s).map(|t| Self(t.to_owned()))
    }
}

impl TryFrom<String> for TimeRange {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        validate_time_range(&s)?;
        Ok(Self(s))
    }
}

impl From<TimeRange> for String {
    fn from(r: TimeRange) -> Self {
        r.0
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bare identifier that has passed [`validate_identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier wrapped in double quotes, ready for interpolation.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", escape_identifier(&self.0))
    }
}

impl FromStr for Identifier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_identifier(s).map(|t| Self(t.to_owned()))
    }
}

impl TryFrom<String> for Identifier {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        validate_identifier(&s)?;
        Ok(Self(s))
    }
}

impl From<Identifier> for String {
    fn from(i: Identifier) -> Self {
        i.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
