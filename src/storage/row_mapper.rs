//! Converts raw result rows into typed column records.

use crate::domain::error::TypeCoercionError;
use crate::domain::model::registry::schema_for;
use crate::domain::model::{EntityKind, RawRow, Record, SqlValue};

/// Reads every registry column of `kind` from `row` under `<prefix>_<column>`.
///
/// Missing and NULL cells map to absent values whatever the column's
/// required flag says; required-ness is only checked on writes.
pub fn map_row(row: &RawRow, prefix: &str, kind: EntityKind) -> Result<Record, TypeCoercionError> {
    let schema = schema_for(kind);
    let mut record = Record::new();
    for def in schema.columns {
        let key = format!("{}_{}", prefix, def.name);
        let Some(raw) = row.get(&key) else {
            continue;
        };
        if raw.is_null() {
            continue;
        }
        let value = raw.clone().coerce(def.ty).ok_or_else(|| TypeCoercionError {
            column: key.clone(),
            expected: def.ty,
            found: raw.type_name(),
            value: raw.to_string(),
        })?;
        record.set(def.name, value);
    }
    Ok(record)
}

/// Maps the joined parent columns of a `kind` row.
///
/// Returns `None` for kinds without a parent and for rows whose outer join
/// found no parent (all parent columns NULL).
pub fn map_parent(row: &RawRow, kind: EntityKind) -> Result<Option<Record>, TypeCoercionError> {
    let Some(parent_schema) = schema_for(kind).parent_schema() else {
        return Ok(None);
    };
    let record = map_row(row, parent_schema.table, parent_schema.kind)?;
    Ok(record.id().map(|_| record))
}

/// Reads a single integer cell, as produced by COUNT statements.
pub fn map_count(row: &RawRow, column: &str) -> Result<u64, TypeCoercionError> {
    let raw = row.get(column).cloned().unwrap_or(SqlValue::BigInt(0));
    match raw {
        SqlValue::BigInt(n) if n >= 0 => Ok(n as u64),
        SqlValue::Int(n) if n >= 0 => Ok(n as u64),
        other => Err(TypeCoercionError {
            column: column.to_string(),
            expected: crate::domain::model::ColumnType::Id,
            found: other.type_name(),
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ColumnType;
    use chrono::NaiveDate;

    fn row(cells: &[(&str, SqlValue)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn maps_prefixed_columns_with_coercion() {
        let r = row(&[
            ("e_id", SqlValue::Int(7)),
            ("e_name", SqlValue::Text("Acme".into())),
            ("e_sector", SqlValue::Text("Tech".into())),
            ("e_fundation", SqlValue::Text("1970-01-01".into())),
            ("e_icnome", SqlValue::BigInt(100)),
            ("e_employees", SqlValue::BigInt(12)),
            ("e_description", SqlValue::Null),
        ]);
        let record = map_row(&r, "e", EntityKind::Stock).unwrap();
        assert_eq!(record.id(), Some(7));
        assert_eq!(record.text("name").as_deref(), Some("Acme"));
        assert_eq!(record.date("fundation"), NaiveDate::from_ymd_opt(1970, 1, 1));
        assert_eq!(record.double("icnome"), Some(100.0));
        assert_eq!(record.int("employees"), Some(12));
        assert_eq!(record.get("description"), None);
        assert_eq!(record.get("expenses"), None);
    }

    #[test]
    fn missing_required_column_is_not_an_error_on_read() {
        let r = row(&[("e_id", SqlValue::BigInt(1))]);
        let record = map_row(&r, "e", EntityKind::Position).unwrap();
        assert_eq!(record.id(), Some(1));
        assert_eq!(record.double("amount"), None);
    }

    #[test]
    fn unconvertible_value_is_a_coercion_error() {
        let r = row(&[
            ("e_id", SqlValue::BigInt(1)),
            ("e_amount", SqlValue::Text("a lot".into())),
        ]);
        let err = map_row(&r, "e", EntityKind::Position).unwrap_err();
        assert_eq!(err.column, "e_amount");
        assert_eq!(err.expected, ColumnType::Double);
        assert_eq!(err.found, "text");
    }

    #[test]
    fn parent_absent_when_join_found_nothing() {
        let r = row(&[
            ("e_id", SqlValue::BigInt(3)),
            ("e_stock_id", SqlValue::Null),
            ("stock_id", SqlValue::Null),
            ("stock_name", SqlValue::Null),
        ]);
        assert_eq!(map_parent(&r, EntityKind::Analysis).unwrap(), None);
        assert_eq!(map_parent(&r, EntityKind::Stock).unwrap(), None);
    }

    #[test]
    fn parent_mapped_from_its_table_prefix() {
        let r = row(&[
            ("e_id", SqlValue::BigInt(3)),
            ("e_stock_id", SqlValue::BigInt(7)),
            ("stock_id", SqlValue::BigInt(7)),
            ("stock_name", SqlValue::Text("Acme".into())),
        ]);
        let parent = map_parent(&r, EntityKind::Analysis).unwrap().unwrap();
        assert_eq!(parent.id(), Some(7));
        assert_eq!(parent.text("name").as_deref(), Some("Acme"));
    }
}
