// Columnar query response envelope.
//
// The telemetry store answers every query with an ordered list of statement
// results, each holding zero or more series. A series carries named columns
// and positional rows. Every level is optional on the wire: absent or `null`
// collections deserialize to empty ones so downstream code never has to
// special-case a quiet store.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Full response body for one query request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnarResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<StatementResult>,

    /// Request-level error (bad database, auth, parse failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a single statement within a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<u32>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub series: Vec<Series>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One series: a measurement slice sharing a tag set.
///
/// Rows are positional and aligned to `columns`; `Value::Null` marks an
/// absent value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub values: Vec<Vec<Value>>,
}

impl ColumnarResponse {
    /// Iterate every series of every statement, in response order.
    pub fn series(&self) -> impl Iterator<Item = &Series> {
        self.results.iter().flat_map(|r| r.series.iter())
    }

    /// `true` when no statement produced any series.
    pub fn is_empty(&self) -> bool {
        self.series().next().is_none()
    }

    /// The first error reported by the store, request-level before statement-level.
    pub fn first_error(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or_else(|| self.results.iter().find_map(|r| r.error.as_deref()))
    }
}

impl Series {
    /// Look up a tag value by key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}
