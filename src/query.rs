//! Collection queries: filters, ordering, limit and column projection.
//!
//! A [`Query`] is backend-neutral. The REST backend encodes it into
//! PostgREST parameters; the in-memory backend evaluates it with
//! [`Query::apply`].

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

/// A single row predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { column: String, value: Value },
    Neq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
    /// Case-insensitive pattern match; `%` matches any run, `_` one character.
    ILike { column: String, pattern: String },
    Gte { column: String, value: Value },
    Lte { column: String, value: Value },
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq { column, .. }
            | Filter::Neq { column, .. }
            | Filter::In { column, .. }
            | Filter::ILike { column, .. }
            | Filter::Gte { column, .. }
            | Filter::Lte { column, .. } => column,
        }
    }

    /// Evaluate the predicate against a JSON row. Missing fields read as null,
    /// and null never satisfies a comparison.
    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(self.column()).unwrap_or(&Value::Null);
        if field.is_null() {
            return matches!(self, Filter::Eq { value: Value::Null, .. });
        }

        match self {
            Filter::Eq { value, .. } => values_equal(field, value),
            Filter::Neq { value, .. } => !values_equal(field, value),
            Filter::In { values, .. } => values.iter().any(|v| values_equal(field, v)),
            Filter::ILike { pattern, .. } => field
                .as_str()
                .map(|text| ilike(pattern, text))
                .unwrap_or(false),
            Filter::Gte { value, .. } => matches!(
                compare_values(field, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lte { value, .. } => matches!(
                compare_values(field, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A query against one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
    /// Columns to return; `None` returns every column.
    pub columns: Option<Vec<String>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Neq {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn ilike(mut self, column: &str, pattern: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike {
            column: column.to_string(),
            pattern: pattern.into(),
        });
        self
    }

    /// Case-insensitive substring match. Wildcards inside `needle` are dropped.
    pub fn contains(self, column: &str, needle: &str) -> Self {
        let needle: String = needle.chars().filter(|c| *c != '%' && *c != '*').collect();
        self.ilike(column, format!("%{}%", needle.trim()))
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Filter, order, limit and project `rows`, in that order.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
        let mut matched: Vec<&Value> = rows
            .into_iter()
            .filter(|row| self.filters.iter().all(|f| f.matches(row)))
            .collect();

        if let Some(order) = &self.order {
            // Stable sort; nulls last ascending, first descending.
            matched.sort_by(|a, b| {
                let left = a.get(&order.column).unwrap_or(&Value::Null);
                let right = b.get(&order.column).unwrap_or(&Value::Null);
                let ordering = match (left.is_null(), right.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => compare_values(left, right).unwrap_or(Ordering::Equal),
                };
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let limit = self.limit.unwrap_or(usize::MAX);
        matched
            .into_iter()
            .take(limit)
            .map(|row| self.project(row))
            .collect()
    }

    fn project(&self, row: &Value) -> Value {
        match (&self.columns, row) {
            (Some(columns), Value::Object(object)) => {
                let projected: Map<String, Value> = columns
                    .iter()
                    .filter_map(|c| object.get(c).map(|v| (c.clone(), v.clone())))
                    .collect();
                Value::Object(projected)
            }
            _ => row.clone(),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Order two scalar JSON values. Strings holding RFC 3339 timestamps compare
/// chronologically; mismatched types are unordered.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (timestamp(x), timestamp(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// SQL `ILIKE` over Unicode scalar values.
pub(crate) fn ilike(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, mark)) = backtrack {
            p = star + 1;
            t = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}
