// ── Counter and rate reconciliation ──
//
// Byte telemetry comes in two families and they must never be mixed up:
//
// - Counters (`rx_bytes`, `tx_bytes`) grow monotonically until the device
//   reboots. Bytes moved in a window are `last - first`, clamped at zero so
//   a reset mid-window reads as "nothing measurable" instead of a huge
//   negative number. Counters are never summed across time.
//
// - Rates (`rx_bytes-r`, `tx_bytes-r`) are instantaneous bytes/sec. The
//   current rate is the latest sample; the average rate is the mean per
//   entity, then summed across entities. Rates are never summed across time.
//
// Where only counters exist, a rate trend is the non-negative derivative of
// the counter on a one-second base.

use std::collections::BTreeMap;
use std::time::Duration;

use indexmap::IndexMap;
use unipulse_api::ColumnarResponse;

use crate::error::ValidationError;
use crate::model::{BandwidthTotal, RateSummary, RxTx, TimeSeriesPoint, Timestamp};
use crate::query::safety::validate_time_range;
use crate::reader::ColumnIndex;
use crate::timeseries::{EntityKeySpec, TIME_COLUMN};

/// Column names a window-totals query aliases its deltas to.
pub const RX_COLUMN: &str = "rx";
pub const TX_COLUMN: &str = "tx";

/// Entity key → bytes moved in the window, in first-seen order.
pub type TrafficMap = IndexMap<String, RxTx>;

// ── Scalar rules ────────────────────────────────────────────────────

/// Bytes moved between two counter readings. Resets and skew clamp to zero.
pub fn counter_delta(first: f64, last: f64) -> f64 {
    let delta = last - first;
    if delta.is_finite() && delta > 0.0 {
        delta
    } else {
        0.0
    }
}

/// Bytes moved across a chronological run of counter samples.
///
/// Non-finite samples are ignored; fewer than two usable samples is zero.
pub fn window_delta(samples: &[f64]) -> f64 {
    let mut finite = samples.iter().copied().filter(|v| v.is_finite());
    match (finite.next(), finite.next_back()) {
        (Some(first), Some(last)) => counter_delta(first, last),
        _ => 0.0,
    }
}

/// Latest finite rate sample, or zero.
pub fn current_rate(samples: &[f64]) -> f64 {
    samples
        .iter()
        .rev()
        .copied()
        .find(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Mean of the finite samples, or `None` when there are none.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn mean_rate(samples: &[f64]) -> Option<f64> {
    let (sum, n) = samples
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Average aggregate rate: the mean of each entity's samples, summed.
pub fn average_rate<I, S>(per_entity: I) -> f64
where
    I: IntoIterator<Item = S>,
    S: AsRef<[f64]>,
{
    per_entity
        .into_iter()
        .filter_map(|samples| mean_rate(samples.as_ref()))
        .sum()
}

/// Clamp a float byte count into `u64`. Negative and non-finite become zero.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::as_conversions
)]
pub(crate) fn to_bytes(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        0
    } else if value >= u64::MAX as f64 {
        u64::MAX
    } else {
        value as u64
    }
}

// ── Derived rates ───────────────────────────────────────────────────

/// Per-second rate of a summed counter between consecutive points.
///
/// Each output point sits at the later timestamp of its pair and carries the
/// rate under `output`. Pairs that go backwards (counter reset) or lack a
/// usable timestamp produce nothing rather than a negative rate.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn non_negative_derivative(
    points: &[TimeSeriesPoint],
    field: &str,
    output: &str,
) -> Vec<TimeSeriesPoint> {
    let base_ms = Duration::from_secs(1).as_millis() as f64;
    let samples: Vec<(&Timestamp, i64, f64)> = points
        .iter()
        .filter_map(|p| Some((&p.time, p.time.epoch_millis()?, p.get(field)?)))
        .collect();

    samples
        .windows(2)
        .filter_map(|pair| {
            let (_, t0, v0) = pair[0];
            let (time, t1, v1) = pair[1];
            let dt = t1.checked_sub(t0).filter(|dt| *dt > 0)?;
            let dv = v1 - v0;
            if !dv.is_finite() || dv < 0.0 {
                return None;
            }
            let rate = dv * base_ms / dt as f64;
            Some(TimeSeriesPoint {
                time: time.clone(),
                fields: BTreeMap::from([(output.to_owned(), rate)]),
            })
        })
        .collect()
}

// ── Bucket widths ───────────────────────────────────────────────────

/// Built-in lookback → bucket width table. Shorter windows get finer buckets.
pub const DEFAULT_INTERVALS: &[(&str, &str)] = &[
    ("15m", "1m"),
    ("1h", "2m"),
    ("3h", "5m"),
    ("6h", "10m"),
    ("12h", "15m"),
    ("24h", "30m"),
    ("2d", "1h"),
    ("7d", "2h"),
    ("14d", "4h"),
    ("30d", "6h"),
    ("90d", "1d"),
];

/// Bucket width used for any range the table does not know.
pub const FALLBACK_INTERVAL: &str = "30m";

/// Bucket width for a lookback window from the built-in table.
pub fn interval_for_range(range: &str) -> &'static str {
    DEFAULT_INTERVALS
        .iter()
        .find(|(r, _)| *r == range)
        .map_or(FALLBACK_INTERVAL, |(_, i)| i)
}

/// Lookback → bucket width mapping with caller overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalTable {
    entries: BTreeMap<String, String>,
    fallback: String,
}

impl Default for IntervalTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_INTERVALS
                .iter()
                .map(|(r, i)| ((*r).to_owned(), (*i).to_owned()))
                .collect(),
            fallback: FALLBACK_INTERVAL.to_owned(),
        }
    }
}

impl IntervalTable {
    /// Add or replace one mapping. Both tokens must be valid time ranges.
    pub fn with_override(mut self, range: &str, interval: &str) -> Result<Self, ValidationError> {
        validate_time_range(range)?;
        validate_time_range(interval)?;
        self.entries.insert(range.to_owned(), interval.to_owned());
        Ok(self)
    }

    /// Replace the width used for unknown ranges.
    pub fn with_fallback(mut self, interval: &str) -> Result<Self, ValidationError> {
        self.fallback = validate_time_range(interval)?.to_owned();
        Ok(self)
    }

    pub fn interval_for(&self, range: &str) -> &str {
        self.entries.get(range).unwrap_or(&self.fallback)
    }

    /// Every mapping, ordered by range token.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(r, i)| (r.as_str(), i.as_str()))
    }
}

// ── Projections over grouped responses ──────────────────────────────

/// Project a grouped `last - first` response into per-entity byte pairs.
///
/// Each row's `rx`/`tx` is clamped at zero. Several rows or series for one
/// entity add up, since each row is already a delta.
pub fn build_traffic_map(response: &ColumnarResponse, tag: &str) -> TrafficMap {
    traffic_map_with(response, &EntityKeySpec::single(tag), RX_COLUMN, TX_COLUMN)
}

/// [`build_traffic_map`] keyed by a composite of several tags.
pub fn build_traffic_map_composite<S: AsRef<str>>(
    response: &ColumnarResponse,
    tags: &[S],
) -> TrafficMap {
    let spec = EntityKeySpec::composite(tags.iter().map(AsRef::as_ref));
    traffic_map_with(response, &spec, RX_COLUMN, TX_COLUMN)
}

/// General form of the traffic-map projection.
pub fn traffic_map_with(
    response: &ColumnarResponse,
    key: &EntityKeySpec,
    rx_column: &str,
    tx_column: &str,
) -> TrafficMap {
    let mut map = TrafficMap::new();
    for series in response.series() {
        let Some(entity) = key.resolve(&series.tags) else {
            continue;
        };
        let index = ColumnIndex::new(&series.columns);
        let entry = map.entry(entity).or_default();
        for values in &series.values {
            let row = index.row(values);
            entry.rx_bytes = entry.rx_bytes.saturating_add(to_bytes(row.number(rx_column, 0.0)));
            entry.tx_bytes = entry.tx_bytes.saturating_add(to_bytes(row.number(tx_column, 0.0)));
        }
    }
    map
}

/// Options for [`bandwidth_totals`].
#[derive(Debug, Clone, Default)]
pub struct TotalsOptions {
    /// Tag holding a human-readable name; the entity key is used otherwise.
    pub name_tag: Option<String>,
    /// Copy each series' tag set onto its total.
    pub carry_tags: bool,
    /// Keep entities that moved no bytes.
    pub include_zero: bool,
}

/// Build per-entity window totals from a grouped `last - first` response,
/// largest first.
pub fn bandwidth_totals(
    response: &ColumnarResponse,
    key: &EntityKeySpec,
    options: &TotalsOptions,
) -> Vec<BandwidthTotal> {
    let traffic = traffic_map_with(response, key, RX_COLUMN, TX_COLUMN);

    let mut meta: IndexMap<String, (String, BTreeMap<String, String>)> = IndexMap::new();
    for series in response.series() {
        let Some(entity) = key.resolve(&series.tags) else {
            continue;
        };
        let (name, tags) = meta
            .entry(entity.clone())
            .or_insert_with(|| (entity.clone(), BTreeMap::new()));
        if let Some(display) = options
            .name_tag
            .as_deref()
            .and_then(|t| series.tag(t))
            .filter(|n| !n.is_empty())
        {
            display.clone_into(name);
        }
        if options.carry_tags {
            tags.extend(series.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    let mut totals: Vec<BandwidthTotal> = traffic
        .into_iter()
        .map(|(id, rxtx)| {
            let (name, tags) = meta.swap_remove(&id).unwrap_or_else(|| (id.clone(), BTreeMap::new()));
            BandwidthTotal::new(id, name, rxtx).with_tags(tags)
        })
        .filter(|t| options.include_zero || t.total_bytes > 0)
        .collect();

    totals.sort_by(|a, b| {
        b.total_bytes
            .cmp(&a.total_bytes)
            .then_with(|| a.name.cmp(&b.name))
    });
    totals
}

/// Current and average aggregate rate for one rate field.
///
/// Samples are ordered by timestamp per entity before "latest" is taken.
pub fn rate_summary(response: &ColumnarResponse, key: &EntityKeySpec, column: &str) -> RateSummary {
    let mut per_entity: IndexMap<String, Vec<(Option<Timestamp>, f64)>> = IndexMap::new();
    for series in response.series() {
        let Some(entity) = key.resolve(&series.tags) else {
            continue;
        };
        let index = ColumnIndex::new(&series.columns);
        let samples = per_entity.entry(entity).or_default();
        for values in &series.values {
            let row = index.row(values);
            if let Some(v) = row.number_opt(column) {
                let time = row.get(TIME_COLUMN).and_then(Timestamp::from_value);
                samples.push((time, v));
            }
        }
    }

    let mut summary = RateSummary::default();
    for (_, mut samples) in per_entity {
        if samples.is_empty() {
            continue;
        }
        samples.sort_by(|a, b| a.0.cmp(&b.0));
        let values: Vec<f64> = samples.into_iter().map(|(_, v)| v).collect();
        summary.current += current_rate(&values);
        summary.average += mean_rate(&values).unwrap_or(0.0);
        summary.entities += 1;
    }
    summary
}
