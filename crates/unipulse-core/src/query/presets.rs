// ── Preset dashboard queries ──
//
// Every panel in the dashboard reads through one of these. They differ only
// in projection; scoping (measurement, grouping, optional tag filter) is
// shared through `Scope`.

use indexmap::IndexSet;

use super::builder::{Aggregate, Field, Fill, SelectQuery};
use crate::error::ValidationError;
use crate::ssid::VapFieldMap;
use crate::timeseries::EntityKeySpec;
use crate::traffic::{RX_COLUMN, TX_COLUMN};

/// Default cumulative counter columns.
pub const RX_COUNTER: &str = "rx_bytes";
pub const TX_COUNTER: &str = "tx_bytes";

/// Default precomputed rate columns (bytes/sec).
pub const RATE_COLUMNS: [&str; 2] = ["rx_bytes-r", "tx_bytes-r"];

/// Lookback used for the VAP snapshot when none is given.
pub const VAP_SNAPSHOT_RANGE: &str = "15m";

/// What a preset reads and how its output is split into series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub measurement: String,
    pub key: EntityKeySpec,
    /// Extra tags carried through GROUP BY, e.g. a display name.
    pub carry: Vec<String>,
    /// Optional `tag = 'value'` restriction.
    pub filter: Option<(String, String)>,
}

impl Scope {
    pub fn new(measurement: impl Into<String>, key: EntityKeySpec) -> Self {
        Self {
            measurement: measurement.into(),
            key,
            carry: Vec::new(),
            filter: None,
        }
    }

    #[must_use]
    pub fn carry<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.carry.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn filter(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some((tag.into(), value.into()));
        self
    }

    /// Key tags then carried tags, without repeats.
    pub fn group_tags(&self) -> Vec<&str> {
        self.key
            .tags()
            .iter()
            .chain(&self.carry)
            .map(String::as_str)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    fn select(&self) -> SelectQuery {
        let mut query = SelectQuery::new(self.measurement.clone());
        if let Some((tag, value)) = &self.filter {
            query = query.where_tag(tag.clone(), value.clone());
        }
        query
    }
}

/// Counter column pair for window totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterColumns {
    pub rx: String,
    pub tx: String,
}

impl Default for CounterColumns {
    fn default() -> Self {
        Self {
            rx: RX_COUNTER.into(),
            tx: TX_COUNTER.into(),
        }
    }
}

/// Bytes moved per entity over `range`: `last - first` of each counter,
/// aliased to `rx`/`tx`.
pub fn window_totals(
    scope: &Scope,
    counters: &CounterColumns,
    range: &str,
) -> Result<String, ValidationError> {
    scope
        .select()
        .field(Field::window_delta(counters.rx.clone()).alias(RX_COLUMN))
        .field(Field::window_delta(counters.tx.clone()).alias(TX_COLUMN))
        .within(range)
        .group_by_tags(scope.group_tags())
        .build()
}

/// Mean of each rate column per bucket and entity.
pub fn rate_trend<S: AsRef<str>>(
    scope: &Scope,
    columns: &[S],
    range: &str,
    interval: &str,
) -> Result<String, ValidationError> {
    let mut query = scope.select();
    for column in columns {
        let column = column.as_ref();
        query = query.field(Field::agg(Aggregate::Mean, column).alias(column));
    }
    query
        .within(range)
        .group_by_time(interval)
        .group_by_tags(scope.group_tags())
        .fill(Fill::None)
        .build()
}

/// Per-second rate derived from a counter: `non_negative_derivative(last(c), 1s)`.
///
/// Each series is one entity, so the bucket keeps that entity's newest
/// reading. Counters are never summed within a bucket.
pub fn counter_trend(
    scope: &Scope,
    column: &str,
    range: &str,
    interval: &str,
) -> Result<String, ValidationError> {
    scope
        .select()
        .field(Field::non_negative_derivative(Aggregate::Last, column).alias(column))
        .within(range)
        .group_by_time(interval)
        .group_by_tags(scope.group_tags())
        .fill(Fill::None)
        .build()
}

/// Newest value of every VAP column, one series per AP/radio/SSID.
pub fn latest_vaps(
    map: &VapFieldMap,
    range: &str,
    filter: Option<(&str, &str)>,
) -> Result<String, ValidationError> {
    let mut query = SelectQuery::new(map.measurement.clone());
    for column in map.value_columns() {
        query = query.field(Field::agg(Aggregate::Last, column).alias(column));
    }
    if let Some((tag, value)) = filter {
        query = query.where_tag(tag, value);
    }
    query.within(range).group_by_tags(map.tag_keys()).build()
}
