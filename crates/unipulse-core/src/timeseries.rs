// ── Multi-entity series merge ──
//
// Charts want one row per timestamp with a column per entity; the store
// returns one series per entity. `SeriesMerger` folds the latter into the
// former: every series resolves to an entity key from its tags, every row
// is mapped into named fields, and rows sharing an exact timestamp land in
// the same bucket. Output is always sorted ascending by time.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::trace;
use unipulse_api::ColumnarResponse;

use crate::model::{TimeSeriesPoint, Timestamp};
use crate::reader::{ColumnIndex, RowReader};

/// Joins the components of a composite entity key.
pub const COMPOSITE_DELIMITER: char = '|';

/// Entity key used when a single-tag series carries no value for its tag.
pub const UNKNOWN_ENTITY: &str = "unknown";

/// Column holding the bucket timestamp.
pub const TIME_COLUMN: &str = "time";

/// How a series' tag set resolves to an entity key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKeySpec {
    /// One tag; absent or empty values fall back to [`UNKNOWN_ENTITY`].
    Single(String),
    /// Ordered tags joined with [`COMPOSITE_DELIMITER`]. A series where every
    /// component is empty contributes nothing.
    Composite(Vec<String>),
}

impl EntityKeySpec {
    pub fn single(tag: impl Into<String>) -> Self {
        Self::Single(tag.into())
    }

    pub fn composite<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Composite(tags.into_iter().map(Into::into).collect())
    }

    /// Tag names in key order.
    pub fn tags(&self) -> &[String] {
        match self {
            Self::Single(tag) => std::slice::from_ref(tag),
            Self::Composite(tags) => tags,
        }
    }

    /// Resolve the entity key for a tag set, or `None` to skip the series.
    pub fn resolve(&self, tags: &BTreeMap<String, String>) -> Option<String> {
        match self {
            Self::Single(tag) => Some(
                tags.get(tag)
                    .filter(|v| !v.is_empty())
                    .map_or_else(|| UNKNOWN_ENTITY.to_owned(), Clone::clone),
            ),
            Self::Composite(keys) => {
                let parts: Vec<&str> = keys
                    .iter()
                    .map(|k| tags.get(k).map_or("", String::as_str))
                    .collect();
                if parts.iter().all(|p| p.is_empty()) {
                    return None;
                }
                Some(join_composite_key(&parts))
            }
        }
    }
}

/// Join key components, escaping any delimiter inside a component so that
/// distinct tuples can never produce the same key.
pub fn join_composite_key<S: AsRef<str>>(parts: &[S]) -> String {
    let mut key = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(COMPOSITE_DELIMITER);
        }
        for c in part.as_ref().chars() {
            if c == COMPOSITE_DELIMITER || c == '\\' {
                key.push('\\');
            }
            key.push(c);
        }
    }
    key
}

/// Inverse of [`join_composite_key`].
pub fn split_composite_key(key: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = key.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let (Some(next), Some(last)) = (chars.next(), parts.last_mut()) {
                    last.push(next);
                }
            }
            COMPOSITE_DELIMITER => parts.push(String::new()),
            _ => {
                if let Some(last) = parts.last_mut() {
                    last.push(c);
                }
            }
        }
    }
    parts
}

/// Field name for one metric of one entity in a merged table.
pub fn entity_field(entity: &str, metric: &str) -> String {
    format!("{entity}_{metric}")
}

/// Row mapper that reads one numeric column into `<entity>_<metric>`.
///
/// Rows where the column is missing or non-numeric produce no field.
pub fn entity_metric<'c>(
    column: &'c str,
    metric: &'c str,
) -> impl FnMut(&RowReader<'_>, &str) -> Option<(String, f64)> + 'c {
    move |row, entity| {
        row.number_opt(column)
            .map(|v| (entity_field(entity, metric), v))
    }
}

/// Merged output: chart rows plus the entities that fed them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedSeries {
    /// One point per distinct timestamp, ascending.
    pub points: Vec<TimeSeriesPoint>,
    /// Entity keys in first-seen order, deduplicated.
    pub entities: Vec<String>,
}

type ValuePredicate<'f> = Box<dyn Fn(Option<f64>) -> bool + 'f>;
type PointPredicate<'f> = Box<dyn Fn(&TimeSeriesPoint) -> bool + 'f>;

/// Folds per-entity series into one time-bucketed table.
pub struct SeriesMerger<'f> {
    key: EntityKeySpec,
    value_filter: Option<(String, ValuePredicate<'f>)>,
    point_filter: Option<PointPredicate<'f>>,
}

impl<'f> SeriesMerger<'f> {
    pub fn new(key: EntityKeySpec) -> Self {
        Self {
            key,
            value_filter: None,
            point_filter: None,
        }
    }

    /// Skip rows whose `column` value fails `predicate` before they reach the
    /// row mapper. The predicate sees `None` for missing or non-numeric cells.
    pub fn value_filter(
        mut self,
        column: impl Into<String>,
        predicate: impl Fn(Option<f64>) -> bool + 'f,
    ) -> Self {
        self.value_filter = Some((column.into(), Box::new(predicate)));
        self
    }

    /// Drop finished points that fail `predicate` (e.g. all-zero buckets).
    pub fn point_filter(mut self, predicate: impl Fn(&TimeSeriesPoint) -> bool + 'f) -> Self {
        self.point_filter = Some(Box::new(predicate));
        self
    }

    /// Merge every series in `response`.
    ///
    /// `mapper` receives each surviving row and its entity key and returns
    /// the fields to merge into that row's bucket. Later rows overwrite
    /// earlier ones for the same field name. Non-finite values are dropped.
    pub fn merge<M, I>(&self, response: &ColumnarResponse, mut mapper: M) -> MergedSeries
    where
        M: FnMut(&RowReader<'_>, &str) -> I,
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut buckets: BTreeMap<Timestamp, BTreeMap<String, f64>> = BTreeMap::new();
        let mut entities: IndexSet<String> = IndexSet::new();

        for series in response.series() {
            let Some(entity) = self.key.resolve(&series.tags) else {
                trace!(tags = ?series.tags, "skipping series with empty composite key");
                continue;
            };
            entities.insert(entity.clone());

            let index = ColumnIndex::new(&series.columns);
            for values in &series.values {
                let row = index.row(values);

                if let Some((ref column, ref keep)) = self.value_filter {
                    if !keep(row.number_opt(column)) {
                        continue;
                    }
                }

                let Some(time) = row.get(TIME_COLUMN).and_then(Timestamp::from_value) else {
                    trace!(%entity, "skipping row without a timestamp");
                    continue;
                };

                let bucket = buckets.entry(time).or_default();
                for (field, value) in mapper(&row, &entity) {
                    if value.is_finite() {
                        bucket.insert(field, value);
                    } else {
                        trace!(%entity, %field, "dropping non-finite mapped value");
                    }
                }
            }
        }

        let points = buckets
            .into_iter()
            .map(|(time, fields)| TimeSeriesPoint { time, fields })
            .filter(|p| self.point_filter.as_ref().is_none_or(|keep| keep(p)))
            .collect();

        MergedSeries {
            points,
            entities: entities.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn response(series: serde_json::Value) -> ColumnarResponse {
        serde_json::from_value(json!({ "results": [{ "series": series }] })).unwrap()
    }

    fn signal_response() -> ColumnarResponse {
        response(json!([
            {
                "name": "clients",
                "tags": { "mac": "aa" },
                "columns": ["time", "signal"],
                "values": [[3000, -61], [1000, -60], [2000, 0]]
            },
            {
                "name": "clients",
                "tags": { "mac": "bb" },
                "columns": ["time", "signal"],
                "values": [[2000, -70], [1000, -1]]
            },
            {
                "name": "clients",
                "tags": { "mac": "aa" },
                "columns": ["time", "signal"],
                "values": [[4000, -62]]
            }
        ]))
    }

    #[test]
    fn merges_entities_into_sorted_buckets() {
        let merged = SeriesMerger::new(EntityKeySpec::single("mac"))
            .merge(&signal_response(), entity_metric("signal", "signal"));

        assert_eq!(merged.entities, vec!["aa".to_owned(), "bb".to_owned()]);

        let times: Vec<_> = merged.points.iter().map(|p| p.time.clone()).collect();
        assert_eq!(
            times,
            vec![
                Timestamp::Epoch(1000),
                Timestamp::Epoch(2000),
                Timestamp::Epoch(3000),
                Timestamp::Epoch(4000)
            ]
        );
        assert_eq!(merged.points[0].get("aa_signal"), Some(-60.0));
        assert_eq!(merged.points[0].get("bb_signal"), Some(-1.0));
        assert_eq!(merged.points[1].get("aa_signal"), Some(0.0));
        assert_eq!(merged.points[1].get("bb_signal"), Some(-70.0));
        assert_eq!(merged.points[3].get("bb_signal"), None);
    }

    #[test]
    fn output_order_ignores_input_order() {
        let forward = response(json!([{
            "tags": { "mac": "aa" },
            "columns": ["time", "v"],
            "values": [[1, 1.0], [2, 2.0], [3, 3.0], [4, 4.0]]
        }]));
        let shuffled = response(json!([{
            "tags": { "mac": "aa" },
            "columns": ["time", "v"],
            "values": [[3, 3.0], [1, 1.0], [4, 4.0], [2, 2.0]]
        }]));
        let merger = SeriesMerger::new(EntityKeySpec::single("mac"));

        let a = merger.merge(&forward, entity_metric("v", "v"));
        let b = merger.merge(&shuffled, entity_metric("v", "v"));
        assert_eq!(a, b);
        assert!(a.points.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn value_filter_drops_sentinel_rows() {
        let merged = SeriesMerger::new(EntityKeySpec::single("mac"))
            .value_filter("signal", |v| v.is_some_and(|s| s != 0.0 && s != -1.0))
            .merge(&signal_response(), entity_metric("signal", "signal"));

        // aa@2000 (0) and bb@1000 (-1) never reach the mapper.
        assert_eq!(merged.points[0].get("bb_signal"), None);
        assert_eq!(merged.points[1].get("aa_signal"), None);
        assert_eq!(merged.points[1].get("bb_signal"), Some(-70.0));
    }

    #[test]
    fn point_filter_drops_all_zero_points() {
        let resp = response(json!([{
            "tags": { "name": "wan" },
            "columns": ["time", "rx"],
            "values": [[1, 0], [2, 5], [3, 0]]
        }]));
        let merged = SeriesMerger::new(EntityKeySpec::single("name"))
            .point_filter(|p| !p.is_all_zero())
            .merge(&resp, entity_metric("rx", "rx"));

        assert_eq!(merged.points.len(), 1);
        assert_eq!(merged.points[0].time, Timestamp::Epoch(2));
    }

    #[test]
    fn missing_tag_falls_back_to_unknown() {
        let resp = response(json!([
            { "columns": ["time", "v"], "values": [[1, 1]] },
            { "tags": { "mac": "" }, "columns": ["time", "v"], "values": [[1, 2]] }
        ]));
        let merged =
            SeriesMerger::new(EntityKeySpec::single("mac")).merge(&resp, entity_metric("v", "v"));

        assert_eq!(merged.entities, vec![UNKNOWN_ENTITY.to_owned()]);
        assert_eq!(merged.points[0].get("unknown_v"), Some(2.0));
    }

    #[test]
    fn composite_keys_join_in_caller_order_and_skip_empty_tuples() {
        let resp = response(json!([
            { "tags": { "ap": "Office", "radio": "na" }, "columns": ["time", "v"], "values": [[1, 1]] },
            { "tags": { "ap": "Office", "radio": "ng" }, "columns": ["time", "v"], "values": [[1, 2]] },
            { "tags": { "ap": "", "radio": "" }, "columns": ["time", "v"], "values": [[1, 3]] },
            { "tags": { "other": "x" }, "columns": ["time", "v"], "values": [[1, 4]] }
        ]));
        let merged = SeriesMerger::new(EntityKeySpec::composite(["radio", "ap"]))
            .merge(&resp, entity_metric("v", "v"));

        assert_eq!(
            merged.entities,
            vec!["na|Office".to_owned(), "ng|Office".to_owned()]
        );
        assert_eq!(merged.points.len(), 1);
        assert_eq!(merged.points[0].fields.len(), 2);
    }

    #[test]
    fn composite_keys_never_collide_on_embedded_delimiters() {
        let a = join_composite_key(&["a|b", "c"]);
        let b = join_composite_key(&["a", "b|c"]);
        assert_ne!(a, b);
        assert_eq!(split_composite_key(&a), vec!["a|b".to_owned(), "c".to_owned()]);
        assert_eq!(split_composite_key(&b), vec!["a".to_owned(), "b|c".to_owned()]);
        assert_eq!(join_composite_key(&["x", "y"]), "x|y");
        assert_eq!(split_composite_key(r"back\\slash|"), vec![r"back\slash".to_owned(), String::new()]);
    }

    #[test]
    fn empty_response_yields_empty_output() {
        let merger = SeriesMerger::new(EntityKeySpec::single("mac"));
        let merged = merger.merge(&ColumnarResponse::default(), entity_metric("v", "v"));
        assert!(merged.points.is_empty());
        assert!(merged.entities.is_empty());
    }

    #[test]
    fn rows_without_time_and_non_finite_fields_are_dropped() {
        let resp = response(json!([{
            "tags": { "mac": "aa" },
            "columns": ["time", "v"],
            "values": [[null, 1], [5, 2]]
        }]));
        let merged = SeriesMerger::new(EntityKeySpec::single("mac")).merge(&resp, |row, entity| {
            vec![
                (entity_field(entity, "v"), row.number("v", 0.0)),
                (entity_field(entity, "bad"), f64::NAN),
            ]
        });
        assert_eq!(merged.points.len(), 1);
        assert_eq!(merged.points[0].get("aa_v"), Some(2.0));
        assert_eq!(merged.points[0].get("aa_bad"), None);
    }
}
