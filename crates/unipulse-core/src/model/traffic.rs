use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Received/transmitted byte pair for one entity over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RxTx {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl RxTx {
    pub fn total(&self) -> u64 {
        self.rx_bytes.saturating_add(self.tx_bytes)
    }
}

/// Bytes moved by one entity over the requested window.
///
/// `rx_bytes` and `tx_bytes` are already clamped at zero; `total_bytes` is
/// always their sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthTotal {
    pub id: String,
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub total_bytes: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl BandwidthTotal {
    pub fn new(id: impl Into<String>, name: impl Into<String>, traffic: RxTx) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rx_bytes: traffic.rx_bytes,
            tx_bytes: traffic.tx_bytes,
            total_bytes: traffic.total(),
            tags: BTreeMap::new(),
        }
    }

    /// Attach metadata tags carried over from the source series.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Representative rates for a rate-field family (bytes/sec).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    /// Sum over entities of each entity's latest sample.
    pub current: f64,
    /// Sum over entities of each entity's mean sample.
    pub average: f64,
    /// Entities that contributed at least one finite sample.
    pub entities: usize,
}
