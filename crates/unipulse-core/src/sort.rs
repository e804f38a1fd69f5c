// ── Generic table sorting ──
//
// Column headers cycle none → ascending → descending → none; picking a
// different column starts over at ascending. Sorting never touches its
// input, is stable for equal keys, and always parks missing values at the
// end whichever way the column is sorted.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::model::{BandwidthTotal, NormalizedSsid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Active sort column and direction, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    active: Option<(String, SortDirection)>,
}

impl SortState {
    /// Start sorted on `key`.
    pub fn by(key: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            active: Some((key.into(), direction)),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.active.as_ref().map(|(k, _)| k.as_str())
    }

    pub fn direction(&self) -> Option<SortDirection> {
        self.active.as_ref().map(|(_, d)| *d)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Advance the state machine for a header click on `key`.
    pub fn select(&mut self, key: &str) {
        self.active = match self.active.take() {
            Some((k, SortDirection::Asc)) if k == key => Some((k, SortDirection::Desc)),
            Some((k, SortDirection::Desc)) if k == key => None,
            _ => Some((key.to_owned(), SortDirection::Asc)),
        };
    }
}

// ── Sort keys ───────────────────────────────────────────────────────

/// A comparable cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Null,
    Number(f64),
    Text(String),
}

impl SortValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Order two non-null values: numbers numerically, anything else as
    /// case-insensitive text.
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            _ => self
                .to_string()
                .to_lowercase()
                .cmp(&other.to_string().to_lowercase()),
        }
    }
}

impl fmt::Display for SortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for SortValue {
    fn from(n: f64) -> Self {
        if n.is_finite() { Self::Number(n) } else { Self::Null }
    }
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
impl From<u64> for SortValue {
    fn from(n: u64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for SortValue {
    fn from(b: bool) -> Self {
        Self::Text(b.to_string())
    }
}

impl From<&str> for SortValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for SortValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<T: Into<SortValue>> From<Option<T>> for SortValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<&Value> for SortValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Number(n) => n.as_f64().into(),
            Value::String(s) => Self::Text(s.clone()),
            Value::Bool(b) => (*b).into(),
            other => Self::Text(other.to_string()),
        }
    }
}

/// Raw field lookup used when a column declares no extractor.
pub trait Sortable {
    fn sort_value(&self, key: &str) -> SortValue;
}

/// A sortable column: a key plus an optional value extractor.
pub struct SortColumn<T> {
    pub key: String,
    pub extractor: Option<fn(&T) -> SortValue>,
}

impl<T> SortColumn<T> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            extractor: None,
        }
    }

    pub fn with_extractor(key: impl Into<String>, extractor: fn(&T) -> SortValue) -> Self {
        Self {
            key: key.into(),
            extractor: Some(extractor),
        }
    }
}

impl<T> fmt::Debug for SortColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortColumn")
            .field("key", &self.key)
            .field("extractor", &self.extractor.is_some())
            .finish()
    }
}

/// Return a sorted copy of `items` according to `state`.
///
/// An inactive state returns the input order unchanged.
pub fn sort_data<T>(items: &[T], state: &SortState, columns: &[SortColumn<T>]) -> Vec<T>
where
    T: Sortable + Clone,
{
    let Some((key, direction)) = &state.active else {
        return items.to_vec();
    };
    let extractor = columns
        .iter()
        .find(|c| c.key == *key)
        .and_then(|c| c.extractor);

    let mut keyed: Vec<(SortValue, &T)> = items
        .iter()
        .map(|item| {
            let value = match extractor {
                Some(extract) => extract(item),
                None => item.sort_value(key),
            };
            (value, item)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match direction {
            SortDirection::Asc => a.compare(b),
            SortDirection::Desc => b.compare(a),
        },
    });

    keyed.into_iter().map(|(_, item)| item.clone()).collect()
}

// ── Domain rows ─────────────────────────────────────────────────────

impl Sortable for BandwidthTotal {
    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "id" => self.id.as_str().into(),
            "name" => self.name.as_str().into(),
            "rx" | "rx_bytes" => self.rx_bytes.into(),
            "tx" | "tx_bytes" => self.tx_bytes.into(),
            "total" | "total_bytes" => self.total_bytes.into(),
            tag => self.tags.get(tag).map(String::as_str).into(),
        }
    }
}

impl Sortable for NormalizedSsid {
    fn sort_value(&self, key: &str) -> SortValue {
        match key {
            "name" => self.name.as_str().into(),
            "guest" | "is_guest" => self.is_guest.into(),
            "aps" => u64::try_from(self.aps.len()).unwrap_or(u64::MAX).into(),
            "clients" | "client_count" => self.client_count.into(),
            "rx" | "rx_bytes" => self.rx_bytes.into(),
            "tx" | "tx_bytes" => self.tx_bytes.into(),
            "traffic" | "total_bytes" => self.total_bytes().into(),
            "satisfaction" | "avg_satisfaction" => self.avg_satisfaction.into(),
            "signal" | "avg_signal" => self.avg_signal.into(),
            _ => SortValue::Null,
        }
    }
}

impl Sortable for Map<String, Value> {
    fn sort_value(&self, key: &str) -> SortValue {
        self.get(key).map_or(SortValue::Null, SortValue::from)
    }
}

impl Sortable for Value {
    fn sort_value(&self, key: &str) -> SortValue {
        self.get(key).map_or(SortValue::Null, SortValue::from)
    }
}
