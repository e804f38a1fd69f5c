use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Wi-Fi frequency band.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize, Deserialize,
)]
pub enum Band {
    #[strum(serialize = "2.4 GHz")]
    #[serde(rename = "2.4")]
    Ghz24,
    #[strum(serialize = "5 GHz")]
    #[serde(rename = "5")]
    Ghz5,
    #[strum(serialize = "6 GHz")]
    #[serde(rename = "6")]
    Ghz6,
}

/// One SSID broadcast on one radio of one access point, as sampled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VapRecord {
    pub ap_name: String,
    pub essid: String,
    pub is_guest: bool,
    pub num_clients: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub channel: Option<u32>,
    /// Radio code as reported (`ng`, `na`, `6e`, ...).
    pub radio: Option<String>,
    /// Mean client satisfaction on this radio (percent).
    pub satisfaction: Option<f64>,
    /// Mean client signal on this radio (dBm).
    pub avg_signal: Option<f64>,
}

/// Channels in use per band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandChannels {
    #[serde(rename = "2.4")]
    pub ghz_2_4: BTreeSet<u32>,
    #[serde(rename = "5")]
    pub ghz_5: BTreeSet<u32>,
    #[serde(rename = "6")]
    pub ghz_6: BTreeSet<u32>,
}

impl BandChannels {
    pub fn get(&self, band: Band) -> &BTreeSet<u32> {
        match band {
            Band::Ghz24 => &self.ghz_2_4,
            Band::Ghz5 => &self.ghz_5,
            Band::Ghz6 => &self.ghz_6,
        }
    }

    pub fn insert(&mut self, band: Band, channel: u32) {
        match band {
            Band::Ghz24 => self.ghz_2_4.insert(channel),
            Band::Ghz5 => self.ghz_5.insert(channel),
            Band::Ghz6 => self.ghz_6.insert(channel),
        };
    }

    pub fn is_empty(&self) -> bool {
        self.ghz_2_4.is_empty() && self.ghz_5.is_empty() && self.ghz_6.is_empty()
    }
}

/// Per-network summary across every AP and radio broadcasting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSsid {
    pub name: String,
    pub is_guest: bool,
    /// Contributing access points, sorted and deduplicated.
    pub aps: Vec<String>,
    pub client_count: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub channels: BandChannels,
    /// `None` when no radio with clients reported a valid sample.
    pub avg_satisfaction: Option<f64>,
    /// `None` when no radio with clients reported a valid sample.
    pub avg_signal: Option<f64>,
}

impl NormalizedSsid {
    pub fn total_bytes(&self) -> u64 {
        self.rx_bytes.saturating_add(self.tx_bytes)
    }
}
