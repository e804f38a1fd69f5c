// ── Per-network SSID aggregation ──
//
// The store reports one VAP per (access point, radio, SSID). Operators think
// in networks, so records are folded by network name: AP names are unioned,
// client counts and bytes are summed, channels are bucketed by band, and
// satisfaction/signal are averaged over radios that actually had clients.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use unipulse_api::{ColumnarResponse, Series};

use crate::error::ValidationError;
use crate::model::{Band, BandChannels, NormalizedSsid, Timestamp, VapRecord};
use crate::query::safety::validate_identifier;
use crate::reader::{ColumnIndex, RowReader, parse_bool};
use crate::timeseries::TIME_COLUMN;
use crate::traffic::to_bytes;

/// Satisfaction/signal values meaning "no client sample".
const SENTINELS: [f64; 2] = [0.0, -1.0];

// ── Field mapping ───────────────────────────────────────────────────

/// Where each VAP attribute lives in the source measurement.
///
/// Names are looked up as tags first and as columns second, so the same
/// mapping works whether a collector stores, say, `radio` as a tag or a
/// field. Signal and satisfaction column names differ between collectors;
/// they are named here explicitly instead of being guessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VapFieldMap {
    pub measurement: String,
    pub ap: String,
    pub essid: String,
    pub radio: String,
    pub is_guest: String,
    pub channel: String,
    pub clients: String,
    pub rx_bytes: String,
    pub tx_bytes: String,
    pub satisfaction: String,
    pub signal: String,
}

impl Default for VapFieldMap {
    fn default() -> Self {
        Self {
            measurement: "uap_vaps".into(),
            ap: "ap_name".into(),
            essid: "essid".into(),
            radio: "radio".into(),
            is_guest: "is_guest".into(),
            channel: "channel".into(),
            clients: "num_sta".into(),
            rx_bytes: "rx_bytes".into(),
            tx_bytes: "tx_bytes".into(),
            satisfaction: "satisfaction".into(),
            signal: "avg_client_signal".into(),
        }
    }
}

impl VapFieldMap {
    /// Dimension names, grouped by in the snapshot query.
    pub fn tag_keys(&self) -> [&str; 4] {
        [&self.ap, &self.essid, &self.radio, &self.is_guest]
    }

    /// Measured values, read with `last()` in the snapshot query.
    pub fn value_columns(&self) -> [&str; 6] {
        [
            &self.channel,
            &self.clients,
            &self.rx_bytes,
            &self.tx_bytes,
            &self.satisfaction,
            &self.signal,
        ]
    }

    /// Check every name against the identifier grammar.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier(&self.measurement)?;
        for name in self.tag_keys().into_iter().chain(self.value_columns()) {
            validate_identifier(name)?;
        }
        Ok(())
    }
}

// ── Record extraction ───────────────────────────────────────────────

/// Tag-first, column-fallback lookups over one series row.
struct VapRow<'a> {
    series: &'a Series,
    row: RowReader<'a>,
}

impl VapRow<'_> {
    fn text(&self, name: &str) -> String {
        match self.series.tag(name) {
            Some(tag) if !tag.is_empty() => tag.to_owned(),
            _ => self.row.string(name, ""),
        }
    }

    fn number(&self, name: &str) -> Option<f64> {
        self.row.number_opt(name).or_else(|| {
            self.series
                .tag(name)
                .and_then(|t| t.trim().parse::<f64>().ok())
                .filter(|f| f.is_finite())
        })
    }

    fn boolean(&self, name: &str) -> bool {
        self.series
            .tag(name)
            .and_then(parse_bool)
            .unwrap_or_else(|| self.row.boolean(name, false))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn channel_number(value: f64) -> Option<u32> {
    (value >= 1.0 && value <= f64::from(u32::MAX)).then(|| value.round() as u32)
}

/// Turn a VAP snapshot response into records.
///
/// Each series contributes its newest row. Series without a usable row are
/// skipped.
pub fn vap_records(response: &ColumnarResponse, map: &VapFieldMap) -> Vec<VapRecord> {
    let mut records = Vec::new();
    for series in response.series() {
        let index = ColumnIndex::new(&series.columns);
        let Some(values) = series
            .values
            .iter()
            .max_by(|a, b| {
                let ta = index.row(a).get(TIME_COLUMN).and_then(Timestamp::from_value);
                let tb = index.row(b).get(TIME_COLUMN).and_then(Timestamp::from_value);
                ta.cmp(&tb)
            })
        else {
            continue;
        };

        let vap = VapRow {
            series,
            row: index.row(values),
        };
        let radio = vap.text(&map.radio);
        records.push(VapRecord {
            ap_name: vap.text(&map.ap),
            essid: vap.text(&map.essid),
            is_guest: vap.boolean(&map.is_guest),
            num_clients: vap.number(&map.clients).map_or(0, to_bytes),
            rx_bytes: vap.number(&map.rx_bytes).map_or(0, to_bytes),
            tx_bytes: vap.number(&map.tx_bytes).map_or(0, to_bytes),
            channel: vap.number(&map.channel).and_then(channel_number),
            radio: (!radio.is_empty()).then_some(radio),
            satisfaction: vap.number(&map.satisfaction),
            avg_signal: vap.number(&map.signal),
        });
    }
    records
}

// ── Band resolution ─────────────────────────────────────────────────

/// Band for a channel number.
pub fn channel_band(channel: u32) -> Option<Band> {
    match channel {
        0 => None,
        1..=14 => Some(Band::Ghz24),
        32..=68 | 96..=177 => Some(Band::Ghz5),
        _ => Some(Band::Ghz6),
    }
}

fn radio_band(radio: &str) -> Option<Band> {
    let code = radio.trim().to_ascii_lowercase();
    match code.as_str() {
        "ng" | "2g" => return Some(Band::Ghz24),
        "na" | "5g" => return Some(Band::Ghz5),
        "6e" | "6g" => return Some(Band::Ghz6),
        _ => {}
    }
    let ghz: f64 = code.trim_end_matches("ghz").trim().parse().ok()?;
    if (2.0..3.0).contains(&ghz) {
        Some(Band::Ghz24)
    } else if (4.9..5.925).contains(&ghz) {
        Some(Band::Ghz5)
    } else if (5.925..7.2).contains(&ghz) {
        Some(Band::Ghz6)
    } else {
        None
    }
}

/// Band for a record: radio code first, channel number second.
pub fn band_for(radio: Option<&str>, channel: Option<u32>) -> Option<Band> {
    radio
        .and_then(radio_band)
        .or_else(|| channel.and_then(channel_band))
}

// ── Aggregation ─────────────────────────────────────────────────────

/// Ordering key for aggregated networks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SsidSort {
    #[default]
    #[strum(to_string = "clients", serialize = "client_count")]
    ClientCount,
    Name,
    Traffic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsidOptions {
    /// Keep networks with no connected clients.
    pub include_idle: bool,
    pub sort: SsidSort,
    pub descending: bool,
}

impl Default for SsidOptions {
    fn default() -> Self {
        Self {
            include_idle: false,
            sort: SsidSort::ClientCount,
            descending: true,
        }
    }
}

#[derive(Debug, Default)]
struct Mean {
    sum: f64,
    n: u32,
}

impl Mean {
    fn push_sample(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite() && !SENTINELS.contains(v)) {
            self.sum += v;
            self.n += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / f64::from(self.n))
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    is_guest: bool,
    aps: BTreeSet<String>,
    client_count: u64,
    rx_bytes: u64,
    tx_bytes: u64,
    channels: BandChannels,
    satisfaction: Mean,
    signal: Mean,
}

/// Fold per-radio records into per-network summaries.
pub fn aggregate_ssids(records: &[VapRecord], options: &SsidOptions) -> Vec<NormalizedSsid> {
    let mut groups: IndexMap<&str, Accumulator> = IndexMap::new();

    for record in records {
        if record.essid.trim().is_empty() {
            continue;
        }
        let acc = groups.entry(record.essid.as_str()).or_default();
        acc.is_guest |= record.is_guest;
        if !record.ap_name.is_empty() {
            acc.aps.insert(record.ap_name.clone());
        }
        acc.client_count = acc.client_count.saturating_add(record.num_clients);
        acc.rx_bytes = acc.rx_bytes.saturating_add(record.rx_bytes);
        acc.tx_bytes = acc.tx_bytes.saturating_add(record.tx_bytes);

        if let Some(channel) = record.channel {
            if let Some(band) = band_for(record.radio.as_deref(), Some(channel)) {
                acc.channels.insert(band, channel);
            }
        }

        if record.num_clients > 0 {
            acc.satisfaction.push_sample(record.satisfaction);
            acc.signal.push_sample(record.avg_signal);
        }
    }

    let mut networks: Vec<NormalizedSsid> = groups
        .into_iter()
        .filter(|(_, acc)| options.include_idle || acc.client_count > 0)
        .map(|(name, acc)| NormalizedSsid {
            name: name.to_owned(),
            is_guest: acc.is_guest,
            aps: acc.aps.into_iter().collect(),
            client_count: acc.client_count,
            rx_bytes: acc.rx_bytes,
            tx_bytes: acc.tx_bytes,
            channels: acc.channels,
            avg_satisfaction: acc.satisfaction.value(),
            avg_signal: acc.signal.value(),
        })
        .collect();

    sort_ssids(&mut networks, options.sort, options.descending);
    networks
}

/// Order networks by `key`. Ties always fall back to name, ascending.
pub fn sort_ssids(networks: &mut [NormalizedSsid], key: SsidSort, descending: bool) {
    networks.sort_by(|a, b| {
        let primary = match key {
            SsidSort::ClientCount => a.client_count.cmp(&b.client_count),
            SsidSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SsidSort::Traffic => a.total_bytes().cmp(&b.total_bytes()),
        };
        let primary = if descending { primary.reverse() } else { primary };
        primary.then_with(|| a.name.cmp(&b.name))
    });
}
