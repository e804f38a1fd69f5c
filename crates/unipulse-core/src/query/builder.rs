// ── SELECT statement builder ──
//
// Produces the narrow read-only grammar the dashboard needs:
//
//   SELECT <fields> FROM "<measurement>"
//     [WHERE <predicate> [AND ...]]
//     [GROUP BY [time(<w>)][, "<tag>"...] [fill(<mode>)]]
//     [ORDER BY time DESC] [LIMIT n]
//
// Builder methods only record raw tokens. `build()` validates every one of
// them and escapes on interpolation, so nothing unchecked can slip into the
// output no matter how the builder was assembled.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::safety::{escape_identifier, escape_string_literal, validate_identifier, validate_time_range};
use crate::error::ValidationError;

/// Base unit for derived per-second rates.
const DERIVATIVE_UNIT: &str = "1s";

/// Server-side aggregate functions the dashboard uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Mean,
    Median,
    Sum,
    Count,
    First,
    Last,
    Min,
    Max,
}

/// Gap handling for time-bucketed queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Fill {
    None,
    Null,
    Previous,
    Linear,
    #[strum(serialize = "0")]
    Zero,
}

/// One projected expression in the SELECT list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// A raw column.
    Column {
        column: String,
        alias: Option<String>,
    },
    /// `agg("column")`.
    Aggregate {
        func: Aggregate,
        column: String,
        alias: Option<String>,
    },
    /// `last("column") - first("column")`: bytes moved inside the window
    /// for a cumulative counter.
    WindowDelta {
        column: String,
        alias: Option<String>,
    },
    /// `non_negative_derivative(agg("column"), 1s)`: per-second rate that
    /// never dips below zero on counter resets.
    NonNegativeDerivative {
        func: Aggregate,
        column: String,
        alias: Option<String>,
    },
}

impl Field {
    pub fn column(column: impl Into<String>) -> Self {
        Self::Column {
            column: column.into(),
            alias: None,
        }
    }

    pub fn agg(func: Aggregate, column: impl Into<String>) -> Self {
        Self::Aggregate {
            func,
            column: column.into(),
            alias: None,
        }
    }

    pub fn window_delta(column: impl Into<String>) -> Self {
        Self::WindowDelta {
            column: column.into(),
            alias: None,
        }
    }

    pub fn non_negative_derivative(func: Aggregate, column: impl Into<String>) -> Self {
        Self::NonNegativeDerivative {
            func,
            column: column.into(),
            alias: None,
        }
    }

    /// Name the output column (`AS "alias"`).
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        let name = Some(name.into());
        match &mut self {
            Self::Column { alias, .. }
            | Self::Aggregate { alias, .. }
            | Self::WindowDelta { alias, .. }
            | Self::NonNegativeDerivative { alias, .. } => *alias = name,
        }
        self
    }

    fn render(&self) -> Result<String, ValidationError> {
        let (expr, alias) = match self {
            Self::Column { column, alias } => (quote(column)?, alias),
            Self::Aggregate {
                func,
                column,
                alias,
            } => (format!("{func}({})", quote(column)?), alias),
            Self::WindowDelta { column, alias } => {
                let col = quote(column)?;
                (format!("last({col}) - first({col})"), alias)
            }
            Self::NonNegativeDerivative {
                func,
                column,
                alias,
            } => (
                format!(
                    "non_negative_derivative({func}({}), {DERIVATIVE_UNIT})",
                    quote(column)?
                ),
                alias,
            ),
        };
        match alias {
            Some(a) => Ok(format!("{expr} AS {}", quote(a)?)),
            None => Ok(expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    TagEquals { tag: String, value: String },
    Within { range: String },
}

impl Predicate {
    fn render(&self) -> Result<String, ValidationError> {
        match self {
            Self::TagEquals { tag, value } => Ok(format!(
                "{} = '{}'",
                quote(tag)?,
                escape_string_literal(value)
            )),
            Self::Within { range } => Ok(format!("time > now() - {}", validate_time_range(range)?)),
        }
    }
}

/// Validate a bare identifier and wrap it in escaped double quotes.
fn quote(token: &str) -> Result<String, ValidationError> {
    Ok(format!("\"{}\"", escape_identifier(validate_identifier(token)?)))
}

/// Builder for a single read-only SELECT statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    measurement: String,
    fields: Vec<Field>,
    predicates: Vec<Predicate>,
    bucket: Option<String>,
    group_tags: Vec<String>,
    fill: Option<Fill>,
    newest_first: bool,
    limit: Option<usize>,
}

impl SelectQuery {
    /// Start a query against a measurement.
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            fields: Vec::new(),
            predicates: Vec::new(),
            bucket: None,
            group_tags: Vec::new(),
            fill: None,
            newest_first: false,
            limit: None,
        }
    }

    /// Project one more field. With no fields the query selects `*`.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Restrict to rows whose tag equals a literal value.
    pub fn where_tag(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate::TagEquals {
            tag: tag.into(),
            value: value.into(),
        });
        self
    }

    /// Restrict to the trailing window `time > now() - <range>`.
    pub fn within(mut self, range: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Within {
            range: range.into(),
        });
        self
    }

    /// Bucket rows into `time(<interval>)` groups.
    pub fn group_by_time(mut self, interval: impl Into<String>) -> Self {
        self.bucket = Some(interval.into());
        self
    }

    /// Split output into one series per tag combination.
    pub fn group_by_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Gap handling for time buckets. Ignored without [`group_by_time`](Self::group_by_time).
    pub fn fill(mut self, fill: Fill) -> Self {
        self.fill = Some(fill);
        self
    }

    /// `ORDER BY time DESC`.
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Validate every token and render the statement.
    ///
    /// Fails on the first token that does not match its grammar.
    pub fn build(&self) -> Result<String, ValidationError> {
        let fields = if self.fields.is_empty() {
            "*".to_owned()
        } else {
            self.fields
                .iter()
                .map(Field::render)
                .collect::<Result<Vec<_>, _>>()?
                .join(", ")
        };

        let mut sql = format!("SELECT {fields} FROM {}", quote(&self.measurement)?);

        if !self.predicates.is_empty() {
            let clauses = self
                .predicates
                .iter()
                .map(Predicate::render)
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut groups = Vec::with_capacity(self.group_tags.len() + 1);
        if let Some(ref interval) = self.bucket {
            groups.push(format!("time({})", validate_time_range(interval)?));
        }
        for tag in &self.group_tags {
            groups.push(quote(tag)?);
        }
        if !groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&groups.join(", "));
            if let (Some(fill), Some(_)) = (self.fill, &self.bucket) {
                sql.push_str(&format!(" fill({fill})"));
            }
        }

        if self.newest_first {
            sql.push_str(" ORDER BY time DESC");
        }
        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        Ok(sql)
    }
}
