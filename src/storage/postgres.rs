//! Row store implementation using PostgreSQL.

use crate::domain::error::StoreError;
use crate::domain::model::registry::schema_for;
use crate::domain::model::{ColumnType, EntityKind, RawRow, SqlValue};
use crate::storage::query::{Param, Statement};
use crate::storage::store::RowStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo};
use tracing::{debug, trace};

/// A row store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgRowStore {
    pool: PgPool,
}

impl PgRowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool; does not touch the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Creates every registry table (parents first) and the foreign-key indexes.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for kind in EntityKind::ALL {
            let schema = schema_for(kind);
            sqlx::query(&schema.create_table_sql())
                .execute(&self.pool)
                .await?;
            if let Some(index_sql) = schema.create_index_sql() {
                sqlx::query(&index_sql).execute(&self.pool).await?;
            }
            debug!(table = schema.table, "table ensured");
        }
        Ok(())
    }

    /// Registry tables that currently exist in the `public` schema.
    pub async fn existing_tables(&self) -> Result<Vec<String>, StoreError> {
        let wanted: Vec<String> = EntityKind::ALL
            .iter()
            .map(|k| schema_for(*k).table.to_string())
            .collect();
        let rows = sqlx::query(
            "SELECT table_name::text AS table_name
             FROM information_schema.tables
             WHERE table_schema = 'public' AND table_name = ANY($1)
             ORDER BY table_name",
        )
        .bind(&wanted)
        .fetch_all(&self.pool)
        .await?;

        let mut tables = Vec::with_capacity(rows.len());
        for r in rows {
            tables.push(r.try_get::<String, _>("table_name")?);
        }
        Ok(tables)
    }

    fn prepare<'q>(statement: &'q Statement) -> Query<'q, Postgres, PgArguments> {
        trace!(sql = statement.sql(), params = statement.params().len(), "prepared statement");
        statement
            .params()
            .iter()
            .fold(sqlx::query(statement.sql()), bind_param)
    }
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &'q Param,
) -> Query<'q, Postgres, PgArguments> {
    // NULLs are bound with the column's own type so the placeholder cast is a no-op.
    match (&param.value, param.ty) {
        (SqlValue::Null, ColumnType::Id) => query.bind(None::<i64>),
        (SqlValue::Null, ColumnType::Integer) => query.bind(None::<i32>),
        (SqlValue::Null, ColumnType::Double) => query.bind(None::<f64>),
        (SqlValue::Null, ColumnType::Date) => query.bind(None::<NaiveDate>),
        (SqlValue::Null, ColumnType::Text) => query.bind(None::<String>),
        (SqlValue::BigInt(v), _) => query.bind(*v),
        (SqlValue::Int(v), _) => query.bind(*v),
        (SqlValue::Double(v), _) => query.bind(*v),
        (SqlValue::Date(v), _) => query.bind(*v),
        (SqlValue::Text(v), _) => query.bind(v.as_str()),
    }
}

fn decode_row(row: &PgRow) -> Result<RawRow, StoreError> {
    let mut out = RawRow::with_capacity(row.len());
    for column in row.columns() {
        let idx = column.ordinal();
        let value = match column.type_info().name() {
            "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(SqlValue::BigInt),
            "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(SqlValue::Int),
            "INT2" => row
                .try_get::<Option<i16>, _>(idx)?
                .map(|v| SqlValue::Int(i32::from(v))),
            "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(SqlValue::Double),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(idx)?
                .map(|v| SqlValue::Double(f64::from(v))),
            "DATE" => row.try_get::<Option<NaiveDate>, _>(idx)?.map(SqlValue::Date),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(idx)?.map(SqlValue::Text)
            }
            other => {
                return Err(StoreError::UnsupportedColumnType {
                    column: column.name().to_string(),
                    type_name: other.to_string(),
                })
            }
        };
        out.insert(column.name().to_string(), value.unwrap_or(SqlValue::Null));
    }
    Ok(out)
}

#[async_trait]
impl RowStore for PgRowStore {
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<RawRow>, StoreError> {
        let rows = Self::prepare(statement).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        let result = Self::prepare(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn insert_returning_id(&self, statement: &Statement) -> Result<i64, StoreError> {
        let row = Self::prepare(statement).fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
