//! Column values and the typed record the row mapper produces.

use crate::domain::model::registry::ColumnType;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

/// A single cell as returned by, or bound to, the relational store.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    BigInt(i64),
    Int(i32),
    Double(f64),
    Text(String),
    Date(NaiveDate),
}

/// A raw result row keyed by (aliased) column name.
pub type RawRow = HashMap<String, SqlValue>;

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short type label used in coercion errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::BigInt(_) => "bigint",
            SqlValue::Int(_) => "int",
            SqlValue::Double(_) => "double",
            SqlValue::Text(_) => "text",
            SqlValue::Date(_) => "date",
        }
    }

    /// Converts the value into the representation of `ty`.
    ///
    /// Returns `None` when the value is present but has no sensible conversion.
    /// `Null` always stays `Null`.
    pub fn coerce(self, ty: ColumnType) -> Option<SqlValue> {
        match (ty, self) {
            (_, SqlValue::Null) => Some(SqlValue::Null),

            (ColumnType::Id, SqlValue::BigInt(v)) => Some(SqlValue::BigInt(v)),
            (ColumnType::Id, SqlValue::Int(v)) => Some(SqlValue::BigInt(i64::from(v))),
            (ColumnType::Id, SqlValue::Text(s)) => s.trim().parse::<i64>().ok().map(SqlValue::BigInt),

            (ColumnType::Integer, SqlValue::Int(v)) => Some(SqlValue::Int(v)),
            (ColumnType::Integer, SqlValue::BigInt(v)) => i32::try_from(v).ok().map(SqlValue::Int),
            (ColumnType::Integer, SqlValue::Text(s)) => s.trim().parse::<i32>().ok().map(SqlValue::Int),

            (ColumnType::Double, SqlValue::Double(v)) => Some(SqlValue::Double(v)),
            (ColumnType::Double, SqlValue::Int(v)) => Some(SqlValue::Double(f64::from(v))),
            (ColumnType::Double, SqlValue::BigInt(v)) => Some(SqlValue::Double(v as f64)),
            (ColumnType::Double, SqlValue::Text(s)) => s.trim().parse::<f64>().ok().map(SqlValue::Double),

            (ColumnType::Date, SqlValue::Date(d)) => Some(SqlValue::Date(d)),
            (ColumnType::Date, SqlValue::Text(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .map(SqlValue::Date),

            // Text columns accept any scalar and keep its display form.
            (ColumnType::Text, SqlValue::Text(s)) => Some(SqlValue::Text(s)),
            (ColumnType::Text, other) => Some(SqlValue::Text(other.to_string())),

            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::BigInt(v) => write!(f, "{}", v),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Double(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::BigInt(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Double(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Column values of one entity, keyed by the registry's column names.
///
/// A column that is absent and a column holding `Null` read the same way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<&'static str, SqlValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<SqlValue>) {
        self.values.insert(column, value.into());
    }

    /// Returns the value of `column`, treating `Null` as absent.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.get(column).filter(|v| !v.is_null())
    }

    pub fn id(&self) -> Option<i64> {
        self.bigint("id")
    }

    pub fn bigint(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(SqlValue::BigInt(v)) => Some(*v),
            Some(SqlValue::Int(v)) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn int(&self, column: &str) -> Option<i32> {
        match self.get(column) {
            Some(SqlValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn double(&self, column: &str) -> Option<f64> {
        match self.get(column) {
            Some(SqlValue::Double(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column) {
            Some(SqlValue::Text(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn date(&self, column: &str) -> Option<NaiveDate> {
        match self.get(column) {
            Some(SqlValue::Date(v)) => Some(*v),
            _ => None,
        }
    }

    /// Merge-patch: copies every non-null value of `patch` over `self`.
    pub fn overlay(&mut self, patch: &Record) {
        for (column, value) in &patch.values {
            if !value.is_null() {
                self.values.insert(*column, value.clone());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &SqlValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_widens_numbers() {
        assert_eq!(
            SqlValue::Int(3).coerce(ColumnType::Double),
            Some(SqlValue::Double(3.0))
        );
        assert_eq!(
            SqlValue::Int(7).coerce(ColumnType::Id),
            Some(SqlValue::BigInt(7))
        );
        assert_eq!(
            SqlValue::BigInt(12).coerce(ColumnType::Integer),
            Some(SqlValue::Int(12))
        );
    }

    #[test]
    fn coerce_rejects_out_of_range_and_garbage() {
        assert_eq!(SqlValue::BigInt(i64::MAX).coerce(ColumnType::Integer), None);
        assert_eq!(SqlValue::Text("abc".into()).coerce(ColumnType::Double), None);
        assert_eq!(SqlValue::Double(1.5).coerce(ColumnType::Date), None);
    }

    #[test]
    fn coerce_parses_iso_dates() {
        let expected = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(
            SqlValue::Text("1970-01-01".into()).coerce(ColumnType::Date),
            Some(SqlValue::Date(expected))
        );
    }

    #[test]
    fn overlay_skips_nulls() {
        let mut base = Record::new().with("name", "Acme").with("description", "old");
        let patch = Record::new()
            .with("name", SqlValue::Null)
            .with("description", "new");
        base.overlay(&patch);
        assert_eq!(base.text("name").as_deref(), Some("Acme"));
        assert_eq!(base.text("description").as_deref(), Some("new"));
    }
}
