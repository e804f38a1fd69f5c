// ── Column-indexed row access ──
//
// Rows arrive as positional arrays of loosely-typed JSON cells. A
// `ColumnIndex` maps names to positions once per series; a `RowReader`
// borrows one row and answers typed lookups, each with its own
// default-on-invalid policy. Nothing in here can fail: a missing column, a
// null, a short row or a non-finite number all resolve to the caller's
// default.

use std::collections::HashMap;

use serde_json::Value;
use tracing::trace;

/// Name → position lookup for one series' column list.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Build the index. Duplicate names resolve to their first position.
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        let mut positions = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            positions.entry(name.as_ref().to_owned()).or_insert(i);
        }
        Self { positions }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// Borrow one row for typed access.
    pub fn row<'a>(&'a self, values: &'a [Value]) -> RowReader<'a> {
        RowReader {
            index: self,
            values,
        }
    }
}

/// Typed, default-safe accessors over one row.
#[derive(Debug, Clone, Copy)]
pub struct RowReader<'a> {
    index: &'a ColumnIndex,
    values: &'a [Value],
}

impl<'a> RowReader<'a> {
    /// Raw cell for a column. `None` when the column is absent, the row is
    /// short, or the cell is null.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let Some(pos) = self.index.position(column) else {
            trace!(column, "column missing from result");
            return None;
        };
        self.values.get(pos).filter(|v| !v.is_null())
    }

    /// Finite number, or `None`. Numeric strings are parsed.
    pub fn number_opt(&self, column: &str) -> Option<f64> {
        let parsed = match self.get(column)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|f| f.is_finite())
    }

    /// Finite number, or `default`. `NaN` and infinities never escape.
    pub fn number(&self, column: &str, default: f64) -> f64 {
        self.number_opt(column).unwrap_or(default)
    }

    /// Any non-null value rendered as text, or `default`.
    pub fn string(&self, column: &str, default: &str) -> String {
        match self.get(column) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => default.to_owned(),
        }
    }

    /// Native booleans, `"true"`/`"false"` in any case, or non-zero numbers.
    pub fn boolean(&self, column: &str, default: bool) -> bool {
        match self.get(column) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => parse_bool(s).unwrap_or(default),
            Some(Value::Number(n)) => n.as_f64().map_or(default, |f| f != 0.0),
            _ => default,
        }
    }
}

/// Case-insensitive `"true"`/`"false"`.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index() -> ColumnIndex {
        ColumnIndex::new(&["time", "rx", "name", "up", "rx"])
    }

    fn row(values: Value) -> Vec<Value> {
        match values {
            Value::Array(v) => v,
            _ => unreachable!("test rows are arrays"),
        }
    }

    #[test]
    fn duplicate_columns_resolve_to_first() {
        let idx = index();
        assert_eq!(idx.position("rx"), Some(1));
        assert_eq!(idx.position("missing"), None);
        assert!(idx.position("up").is_some());
    }

    #[test]
    fn number_reads_numbers_and_numeric_strings() {
        let idx = index();
        let values = row(json!([0, 12.5, " 42 ", true]));
        let r = idx.row(&values);
        assert_eq!(r.number("rx", 0.0), 12.5);
        assert_eq!(r.number("name", 0.0), 42.0);
    }

    #[test]
    fn number_falls_back_on_anything_malformed() {
        let idx = index();
        for cell in [
            json!(null),
            json!("NaN"),
            json!("inf"),
            json!("-Infinity"),
            json!("12abc"),
            json!(""),
            json!(true),
            json!({ "v": 1 }),
            json!([1]),
        ] {
            let values = vec![json!(0), cell.clone()];
            let n = idx.row(&values).number("rx", -7.0);
            assert_eq!(n, -7.0, "cell {cell} should use the default");
        }

        let values = vec![json!(0)];
        let r = idx.row(&values);
        assert_eq!(r.number("rx", 3.0), 3.0, "short row");
        assert_eq!(r.number("absent", 3.0), 3.0, "missing column");
        assert_eq!(r.number_opt("absent"), None);
    }

    #[test]
    fn string_stringifies_scalars() {
        let idx = index();
        let values = row(json!([0, 12.5, "Office", false]));
        let r = idx.row(&values);
        assert_eq!(r.string("name", "-"), "Office");
        assert_eq!(r.string("rx", "-"), "12.5");
        assert_eq!(r.string("up", "-"), "false");
        assert_eq!(r.string("absent", "-"), "-");

        let values = row(json!([0, null, null]));
        assert_eq!(idx.row(&values).string("name", ""), "");
    }

    #[test]
    fn boolean_accepts_bools_strings_and_numbers() {
        let idx = ColumnIndex::new(&["b"]);
        let cases = [
            (json!(true), true),
            (json!(false), false),
            (json!("TRUE"), true),
            (json!("False"), false),
            (json!(1), true),
            (json!(0), false),
            (json!(-0.5), true),
        ];
        for (cell, expected) in cases {
            let values = vec![cell.clone()];
            assert_eq!(idx.row(&values).boolean("b", !expected), expected, "cell {cell}");
        }
    }

    #[test]
    fn boolean_falls_back_on_unrecognized_values() {
        let idx = ColumnIndex::new(&["b"]);
        for cell in [json!("yes"), json!(null), json!([]), json!({})] {
            let values = vec![cell];
            assert!(idx.row(&values).boolean("b", true));
            assert!(!idx.row(&values).boolean("b", false));
        }
        assert!(idx.row(&[]).boolean("missing", true));
    }
}
