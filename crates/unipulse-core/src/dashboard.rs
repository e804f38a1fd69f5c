// ── Dashboard facade ──
//
// Ties the pieces together for callers that just want panels: validate the
// inputs, build a preset, hand the statement to whatever `TelemetrySource`
// was injected, and shape the response. Every token is checked before the
// source is touched; source errors come back exactly as the source raised
// them.

use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use tracing::debug;
use unipulse_api::{ColumnarResponse, QueryClient};

use crate::error::{CoreError, ValidationError};
use crate::model::{BandwidthTotal, NormalizedSsid, RateSummary};
use crate::query::presets::{self, CounterColumns, Scope, VAP_SNAPSHOT_RANGE};
use crate::query::safety::validate_time_range;
use crate::ssid::{SsidOptions, VapFieldMap, aggregate_ssids, vap_records};
use crate::timeseries::{EntityKeySpec, MergedSeries, SeriesMerger, entity_field, entity_metric};
use crate::traffic::{
    IntervalTable, TotalsOptions, TrafficMap, bandwidth_totals, build_traffic_map,
    build_traffic_map_composite, rate_summary,
};

/// Anything that can answer a read-only statement with a columnar response.
pub trait TelemetrySource {
    fn query(
        &self,
        statement: &str,
    ) -> impl Future<Output = Result<ColumnarResponse, unipulse_api::Error>> + Send;
}

impl TelemetrySource for QueryClient {
    fn query(
        &self,
        statement: &str,
    ) -> impl Future<Output = Result<ColumnarResponse, unipulse_api::Error>> + Send {
        QueryClient::query(self, statement)
    }
}

/// A source that answers every statement with the same recorded response.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    response: ColumnarResponse,
}

impl StaticSource {
    pub fn new(response: ColumnarResponse) -> Self {
        Self { response }
    }
}

impl TelemetrySource for StaticSource {
    fn query(
        &self,
        _statement: &str,
    ) -> impl Future<Output = Result<ColumnarResponse, unipulse_api::Error>> + Send {
        std::future::ready(Ok(self.response.clone()))
    }
}

/// A time-bucketed chart table and the bucket width it was queried with.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trend {
    pub interval: String,
    #[serde(flatten)]
    pub merged: MergedSeries,
    /// Current/average aggregate rate per column.
    pub summary: BTreeMap<String, RateSummary>,
}

/// High-level panel queries over an injected telemetry source.
#[derive(Debug, Clone)]
pub struct Dashboard<S> {
    source: S,
    intervals: IntervalTable,
    vap_fields: VapFieldMap,
    counters: CounterColumns,
}

impl<S: TelemetrySource> Dashboard<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            intervals: IntervalTable::default(),
            vap_fields: VapFieldMap::default(),
            counters: CounterColumns::default(),
        }
    }

    #[must_use]
    pub fn with_intervals(mut self, intervals: IntervalTable) -> Self {
        self.intervals = intervals;
        self
    }

    /// Use a custom VAP field map. Every name must be a valid identifier.
    pub fn with_vap_fields(mut self, map: VapFieldMap) -> Result<Self, ValidationError> {
        map.validate()?;
        self.vap_fields = map;
        Ok(self)
    }

    #[must_use]
    pub fn with_counters(mut self, counters: CounterColumns) -> Self {
        self.counters = counters;
        self
    }

    async fn dispatch(&self, statement: String) -> Result<ColumnarResponse, CoreError> {
        debug!(%statement, "dispatching query");
        Ok(self.source.query(&statement).await?)
    }

    /// Bytes moved per entity over `range`, largest first.
    pub async fn traffic_totals(
        &self,
        scope: &Scope,
        range: &str,
        options: &TotalsOptions,
    ) -> Result<Vec<BandwidthTotal>, CoreError> {
        let scope = scope.clone().carry(options.name_tag.clone());
        let statement = presets::window_totals(&scope, &self.counters, range)?;
        let response = self.dispatch(statement).await?;
        Ok(bandwidth_totals(&response, &scope.key, options))
    }

    /// Bytes moved per entity over `range`, keyed by entity.
    pub async fn traffic_map(&self, scope: &Scope, range: &str) -> Result<TrafficMap, CoreError> {
        let statement = presets::window_totals(scope, &self.counters, range)?;
        let response = self.dispatch(statement).await?;
        Ok(match &scope.key {
            EntityKeySpec::Single(tag) => build_traffic_map(&response, tag),
            EntityKeySpec::Composite(tags) => build_traffic_map_composite(&response, tags),
        })
    }

    /// Mean of each precomputed rate column per bucket, one field per
    /// entity and column.
    pub async fn rate_trend<C: AsRef<str>>(
        &self,
        scope: &Scope,
        columns: &[C],
        range: &str,
    ) -> Result<Trend, CoreError> {
        let interval = self.interval_for(range)?;
        let statement = presets::rate_trend(scope, columns, range, &interval)?;
        let response = self.dispatch(statement).await?;

        let merged = SeriesMerger::new(scope.key.clone())
            .point_filter(|p| !p.is_all_zero())
            .merge(&response, |row, entity| {
                columns
                    .iter()
                    .filter_map(|c| {
                        let c = c.as_ref();
                        row.number_opt(c).map(|v| (entity_field(entity, c), v))
                    })
                    .collect::<Vec<_>>()
            });
        let summary = columns
            .iter()
            .map(|c| {
                let c = c.as_ref();
                (c.to_owned(), rate_summary(&response, &scope.key, c))
            })
            .collect();

        Ok(Trend {
            interval,
            merged,
            summary,
        })
    }

    /// Per-second rate derived server-side from a cumulative counter.
    pub async fn counter_trend(
        &self,
        scope: &Scope,
        column: &str,
        range: &str,
    ) -> Result<Trend, CoreError> {
        let interval = self.interval_for(range)?;
        let statement = presets::counter_trend(scope, column, range, &interval)?;
        let response = self.dispatch(statement).await?;

        let merged = SeriesMerger::new(scope.key.clone()).merge(&response, entity_metric(column, column));
        let summary = BTreeMap::from([(column.to_owned(), rate_summary(&response, &scope.key, column))]);

        Ok(Trend {
            interval,
            merged,
            summary,
        })
    }

    /// Per-network summaries from the latest VAP snapshot.
    pub async fn ssids(
        &self,
        options: &SsidOptions,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<NormalizedSsid>, CoreError> {
        let statement = presets::latest_vaps(&self.vap_fields, VAP_SNAPSHOT_RANGE, filter)?;
        let response = self.dispatch(statement).await?;
        let records = vap_records(&response, &self.vap_fields);
        debug!(records = records.len(), "aggregating vap records");
        Ok(aggregate_ssids(&records, options))
    }

    fn interval_for(&self, range: &str) -> Result<String, ValidationError> {
        Ok(self.intervals.interval_for(validate_time_range(range)?).to_owned())
    }
}
