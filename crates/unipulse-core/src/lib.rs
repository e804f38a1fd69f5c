//! Query safety and telemetry shaping between `unipulse-api` and its
//! consumers (CLI, dashboards).
//!
//! Everything here is a pure, synchronous transformation over data that was
//! already fetched, except for the [`Dashboard`] facade, which dispatches
//! through an injected [`TelemetrySource`]:
//!
//! - **[`query`]**: token grammars and escaping ([`query::safety`]), the
//!   [`SelectQuery`] builder, and the dashboard [`query::presets`]. Every
//!   time range and identifier is validated before it is interpolated.
//!
//! - **[`reader`]**: column-indexed, default-safe row access. Missing
//!   columns, nulls and non-finite numbers resolve to caller defaults.
//!
//! - **[`timeseries`]**: [`SeriesMerger`] folds one-series-per-entity
//!   responses into a single time-bucketed table keyed by a single or
//!   composite tag.
//!
//! - **[`traffic`]**: counter vs. rate rules. Counters are `last - first`
//!   clamped at zero, rates are averaged per entity and then summed, and
//!   bucket widths come from an [`IntervalTable`].
//!
//! - **[`ssid`]**: VAP record extraction and per-network aggregation.
//!
//! - **[`sort`]**: the three-state column sort engine.

pub mod dashboard;
pub mod error;
pub mod model;
pub mod query;
pub mod reader;
pub mod sort;
pub mod ssid;
pub mod timeseries;
pub mod traffic;

pub use dashboard::{Dashboard, StaticSource, TelemetrySource, Trend};
pub use error::{CoreError, ValidationError};
pub use model::{
    Band, BandChannels, BandwidthTotal, NormalizedSsid, RateSummary, RxTx, TimeSeriesPoint,
    Timestamp, VapRecord,
};
pub use query::presets::{CounterColumns, Scope};
pub use query::{Aggregate, Field, Fill, Identifier, SelectQuery, TimeRange};
pub use reader::{ColumnIndex, RowReader};
pub use sort::{SortColumn, SortDirection, SortState, SortValue, Sortable, sort_data};
pub use ssid::{SsidOptions, SsidSort, VapFieldMap, aggregate_ssids, vap_records};
pub use timeseries::{EntityKeySpec, MergedSeries, SeriesMerger};
pub use traffic::{IntervalTable, TotalsOptions, TrafficMap};
