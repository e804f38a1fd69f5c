use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::timestamp::Timestamp;

/// One row of a merged, chart-ready table: a timestamp and any number of
/// named numeric fields (often `<entity>_<metric>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub time: Timestamp,
    #[serde(flatten)]
    pub fields: BTreeMap<String, f64>,
}

impl TimeSeriesPoint {
    /// A field value, if present.
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }

    /// A field value, or `0.0` when the entity reported nothing in this bucket.
    pub fn value(&self, field: &str) -> f64 {
        self.get(field).unwrap_or(0.0)
    }

    /// `true` when every field is zero (or there are no fields at all).
    pub fn is_all_zero(&self) -> bool {
        self.fields.values().all(|v| *v == 0.0)
    }
}
