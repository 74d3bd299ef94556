//! SQL statement builder.
//!
//! Every statement carries three things:
//! 1.  Postgres SQL text with `$n` placeholders (cast to the column type).
//! 2.  The bound parameters, already coerced to their column types.
//! 3.  A structured [`Plan`] so non-SQL stores can execute the same request.
//!
//! Only two read shapes exist: an optional single predicate (primary key,
//! foreign key, or foreign key IS NULL) and an optional page. Anything richer
//! is rejected with [`QueryShapeError`].

use crate::domain::error::{CrudError, QueryShapeError, TypeCoercionError};
use crate::domain::model::registry::{schema_for, ColumnType, EntitySchema, PRIMARY_KEY};
use crate::domain::model::{EntityKind, Record, SqlValue};
use serde::Deserialize;

/// Table alias of the queried entity; its columns come back as `e_<column>`.
pub const ENTITY_ALIAS: &str = "e";

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(SqlValue),
    IsNull,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub predicate: Predicate,
}

impl Filter {
    pub fn equals(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self {
            column: column.into(),
            predicate: Predicate::Equals(value.into()),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            predicate: Predicate::IsNull,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
    pub sort_column: String,
    pub direction: SortDirection,
}

impl Page {
    /// Page `number` (zero-based) of `size` rows, sorted by identifier.
    pub fn new(number: u64, size: u64) -> Self {
        Self {
            limit: size,
            offset: number.saturating_mul(size),
            sort_column: PRIMARY_KEY.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn sorted_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_column = column.into();
        self.direction = direction;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOptions {
    pub filters: Vec<Filter>,
    pub page: Option<Page>,
    /// Number of parent levels to hydrate. Only 0 and 1 are supported.
    pub join_depth: u8,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            page: None,
            join_depth: 1,
        }
    }
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn page(mut self, page: Option<Page>) -> Self {
        self.page = page;
        self
    }

    pub fn join_depth(mut self, depth: u8) -> Self {
        self.join_depth = depth;
        self
    }
}

/// A validated predicate, ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanFilter {
    pub column: &'static str,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanPage {
    pub limit: u64,
    pub offset: u64,
    pub sort_column: &'static str,
    pub direction: SortDirection,
}

/// Structured form of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Select {
        kind: EntityKind,
        join_parent: bool,
        filter: Option<PlanFilter>,
        page: Option<PlanPage>,
    },
    Count {
        kind: EntityKind,
        filter: Option<PlanFilter>,
    },
    Insert {
        kind: EntityKind,
        record: Record,
    },
    Update {
        kind: EntityKind,
        id: i64,
        record: Record,
    },
    Delete {
        kind: EntityKind,
        id: i64,
    },
}

/// A bound parameter and the column type it is written to or compared with.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: SqlValue,
    pub ty: ColumnType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Param>,
    plan: Plan,
}

impl Statement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }
}

/// Result column of a [`Plan::Count`] statement.
pub const COUNT_COLUMN: &str = "total";

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident)
}

fn push_param(params: &mut Vec<Param>, value: SqlValue, ty: ColumnType) -> String {
    params.push(Param { value, ty });
    format!("${}::{}", params.len(), ty.cast())
}

fn coerce_param(column: &'static str, ty: ColumnType, value: &SqlValue) -> Result<SqlValue, CrudError> {
    value.clone().coerce(ty).ok_or_else(|| {
        CrudError::TypeCoercion(TypeCoercionError {
            column: column.to_string(),
            expected: ty,
            found: value.type_name(),
            value: value.to_string(),
        })
    })
}

fn resolve_column(
    schema: &EntitySchema,
    column: &str,
) -> Result<&'static crate::domain::model::ColumnDef, QueryShapeError> {
    schema
        .column(column)
        .ok_or_else(|| QueryShapeError::UnknownColumn {
            table: schema.table,
            column: column.to_string(),
        })
}

fn resolve_filter(schema: &EntitySchema, filters: &[Filter]) -> Result<Option<PlanFilter>, CrudError> {
    if filters.len() > 1 {
        return Err(QueryShapeError::TooManyFilters(filters.len()).into());
    }
    let Some(filter) = filters.first() else {
        return Ok(None);
    };
    let def = resolve_column(schema, &filter.column)?;
    let predicate = match &filter.predicate {
        // `= NULL` never matches in SQL; treat it as the IS NULL path.
        Predicate::Equals(SqlValue::Null) => Predicate::IsNull,
        Predicate::Equals(v) => Predicate::Equals(coerce_param(def.name, def.ty, v)?),
        Predicate::IsNull => Predicate::IsNull,
    };
    Ok(Some(PlanFilter {
        column: def.name,
        predicate,
    }))
}

fn push_where(sql: &mut String, params: &mut Vec<Param>, schema: &EntitySchema, filter: &PlanFilter) {
    let column = format!("{}.{}", ENTITY_ALIAS, quote(filter.column));
    match &filter.predicate {
        Predicate::IsNull => {
            sql.push_str(&format!(" WHERE {} IS NULL", column));
        }
        Predicate::Equals(value) => {
            let ty = schema.column(filter.column).map(|c| c.ty).unwrap_or(ColumnType::Text);
            let placeholder = push_param(params, value.clone(), ty);
            sql.push_str(&format!(" WHERE {} = {}", column, placeholder));
        }
    }
}

fn select_list(schema: &EntitySchema, alias: &str) -> Vec<String> {
    schema
        .columns
        .iter()
        .map(|c| format!("{}.{} AS {}_{}", alias, quote(c.name), alias, c.name))
        .collect()
}

/// Builds the SELECT for `kind`, joining its parent one level deep when it has one.
pub fn build_select(kind: EntityKind, options: &SelectOptions) -> Result<Statement, CrudError> {
    if options.join_depth > 1 {
        return Err(QueryShapeError::JoinTooDeep(options.join_depth).into());
    }
    let schema = schema_for(kind);
    let filter = resolve_filter(schema, &options.filters)?;
    let page = match &options.page {
        Some(p) => {
            let def = resolve_column(schema, &p.sort_column)?;
            Some(PlanPage {
                limit: p.limit,
                offset: p.offset,
                sort_column: def.name,
                direction: p.direction,
            })
        }
        None => None,
    };

    let parent = if options.join_depth == 1 {
        schema.parent.map(|rel| (rel, schema_for(rel.parent)))
    } else {
        None
    };

    let mut columns = select_list(schema, ENTITY_ALIAS);
    if let Some((_, parent_schema)) = parent {
        columns.extend(select_list(parent_schema, parent_schema.table));
    }

    let mut sql = format!(
        "SELECT {} FROM {} {}",
        columns.join(", "),
        quote(schema.table),
        ENTITY_ALIAS
    );
    if let Some((rel, parent_schema)) = parent {
        sql.push_str(&format!(
            " LEFT OUTER JOIN {} {} ON {}.{} = {}.{}",
            quote(parent_schema.table),
            parent_schema.table,
            ENTITY_ALIAS,
            quote(rel.foreign_key),
            parent_schema.table,
            quote(rel.parent_key)
        ));
    }

    let mut params = Vec::new();
    if let Some(f) = &filter {
        push_where(&mut sql, &mut params, schema, f);
    }
    if let Some(p) = &page {
        sql.push_str(&format!(
            " ORDER BY {}.{} {} LIMIT {} OFFSET {}",
            ENTITY_ALIAS,
            quote(p.sort_column),
            p.direction.sql(),
            p.limit,
            p.offset
        ));
    }

    Ok(Statement {
        sql,
        params,
        plan: Plan::Select {
            kind,
            join_parent: parent.is_some(),
            filter,
            page,
        },
    })
}

/// `SELECT COUNT(*)` with the same single-predicate restriction as [`build_select`].
pub fn build_count(kind: EntityKind, filter: Option<Filter>) -> Result<Statement, CrudError> {
    let schema = schema_for(kind);
    let filters: Vec<Filter> = filter.into_iter().collect();
    let filter = resolve_filter(schema, &filters)?;

    let mut sql = format!(
        "SELECT COUNT(*) AS {} FROM {} {}",
        COUNT_COLUMN,
        quote(schema.table),
        ENTITY_ALIAS
    );
    let mut params = Vec::new();
    if let Some(f) = &filter {
        push_where(&mut sql, &mut params, schema, f);
    }
    Ok(Statement {
        sql,
        params,
        plan: Plan::Count { kind, filter },
    })
}

/// Coerces every data column of `record` and drops unknown keys.
fn normalized(schema: &EntitySchema, record: &Record) -> Result<Record, CrudError> {
    let mut out = Record::new();
    for def in schema.data_columns() {
        let value = match record.get(def.name) {
            Some(v) => coerce_param(def.name, def.ty, v)?,
            None => SqlValue::Null,
        };
        out.set(def.name, value);
    }
    Ok(out)
}

pub fn build_insert(kind: EntityKind, record: &Record) -> Result<Statement, CrudError> {
    let schema = schema_for(kind);
    let record = normalized(schema, record)?;

    let mut params = Vec::new();
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    for def in schema.data_columns() {
        let value = record.get(def.name).cloned().unwrap_or(SqlValue::Null);
        columns.push(quote(def.name));
        placeholders.push(push_param(&mut params, value, def.ty));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quote(schema.table),
        columns.join(", "),
        placeholders.join(", "),
        quote(PRIMARY_KEY)
    );
    Ok(Statement {
        sql,
        params,
        plan: Plan::Insert { kind, record },
    })
}

/// UPDATE of every data column; zero affected rows means the id does not exist.
pub fn build_update(kind: EntityKind, id: i64, record: &Record) -> Result<Statement, CrudError> {
    let schema = schema_for(kind);
    let record = normalized(schema, record)?;

    let mut params = Vec::new();
    let mut assignments = Vec::new();
    for def in schema.data_columns() {
        let value = record.get(def.name).cloned().unwrap_or(SqlValue::Null);
        let placeholder = push_param(&mut params, value, def.ty);
        assignments.push(format!("{} = {}", quote(def.name), placeholder));
    }
    let id_placeholder = push_param(&mut params, SqlValue::BigInt(id), ColumnType::Id);

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote(schema.table),
        assignments.join(", "),
        quote(PRIMARY_KEY),
        id_placeholder
    );
    Ok(Statement {
        sql,
        params,
        plan: Plan::Update { kind, id, record },
    })
}

pub fn build_delete(kind: EntityKind, id: i64) -> Result<Statement, CrudError> {
    let schema = schema_for(kind);
    let mut params = Vec::new();
    let placeholder = push_param(&mut params, SqlValue::BigInt(id), ColumnType::Id);
    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quote(schema.table),
        quote(PRIMARY_KEY),
        placeholder
    );
    Ok(Statement {
        sql,
        params,
        plan: Plan::Delete { kind, id },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_joins_parent_with_prefixed_aliases() {
        let stmt = build_select(EntityKind::Analysis, &SelectOptions::new()).unwrap();
        let sql = stmt.sql();
        assert!(sql.starts_with("SELECT e.\"id\" AS e_id, e.\"date\" AS e_date"));
        assert!(sql.contains("stock.\"name\" AS stock_name"));
        assert!(sql.contains(
            "FROM \"analysis\" e LEFT OUTER JOIN \"stock\" stock ON e.\"stock_id\" = stock.\"id\""
        ));
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("ORDER BY"));
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn select_without_parent_has_no_join() {
        let stmt = build_select(EntityKind::Portfolio, &SelectOptions::new()).unwrap();
        assert!(!stmt.sql().contains("JOIN"));
        assert!(matches!(stmt.plan(), Plan::Select { join_parent: false, .. }));
    }

    #[test]
    fn primary_key_filter_binds_one_parameter() {
        let options = SelectOptions::new().filter(Filter::equals("id", 7i64));
        let stmt = build_select(EntityKind::Stock, &options).unwrap();
        assert!(stmt.sql().ends_with("WHERE e.\"id\" = $1::int8"));
        assert_eq!(
            stmt.params(),
            &[Param {
                value: SqlValue::BigInt(7),
                ty: ColumnType::Id
            }]
        );
    }

    #[test]
    fn null_parent_uses_is_null() {
        let options = SelectOptions::new().filter(Filter::equals("stock_id", SqlValue::Null));
        let stmt = build_select(EntityKind::Analysis, &options).unwrap();
        assert!(stmt.sql().ends_with("WHERE e.\"stock_id\" IS NULL"));
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn page_appends_order_and_limit() {
        let page = Page::new(2, 10).sorted_by("name", SortDirection::Desc);
        let stmt = build_select(EntityKind::Stock, &SelectOptions::new().page(Some(page))).unwrap();
        assert!(stmt
            .sql()
            .ends_with("ORDER BY e.\"name\" DESC LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn rejects_more_than_one_filter() {
        let options = SelectOptions::new()
            .filter(Filter::equals("id", 1i64))
            .filter(Filter::is_null("stock_id"));
        let err = build_select(EntityKind::Analysis, &options).unwrap_err();
        assert!(matches!(
            err,
            CrudError::UnsupportedQueryShape(QueryShapeError::TooManyFilters(2))
        ));
    }

    #[test]
    fn rejects_deep_joins_and_unknown_columns() {
        let deep = build_select(EntityKind::Indicator, &SelectOptions::new().join_depth(2));
        assert!(matches!(
            deep,
            Err(CrudError::UnsupportedQueryShape(QueryShapeError::JoinTooDeep(2)))
        ));

        let page = Page::new(0, 5).sorted_by("nope", SortDirection::Asc);
        let unknown = build_select(EntityKind::Stock, &SelectOptions::new().page(Some(page)));
        assert!(matches!(
            unknown,
            Err(CrudError::UnsupportedQueryShape(QueryShapeError::UnknownColumn { .. }))
        ));
    }

    #[test]
    fn insert_writes_every_data_column() {
        let record = Record::new().with("amount", 3i32).with("price", 9.5);
        let stmt = build_insert(EntityKind::Position, &record).unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO \"position\" (\"amount\", \"price\", \"portfolio_id\") \
             VALUES ($1::float8, $2::float8, $3::int8) RETURNING \"id\""
        );
        // Integers are widened for double columns before binding.
        assert_eq!(stmt.params()[0].value, SqlValue::Double(3.0));
        assert_eq!(stmt.params()[2].value, SqlValue::Null);
    }

    #[test]
    fn insert_rejects_unconvertible_values() {
        let record = Record::new().with("amount", "lots").with("price", 1.0);
        let err = build_insert(EntityKind::Position, &record).unwrap_err();
        assert!(matches!(err, CrudError::TypeCoercion(_)));
    }

    #[test]
    fn update_keys_by_identifier_last() {
        let record = Record::new().with("name", "Main");
        let stmt = build_update(EntityKind::Portfolio, 4, &record).unwrap();
        assert_eq!(
            stmt.sql(),
            "UPDATE \"portfolio\" SET \"name\" = $1::text, \"description\" = $2::text \
             WHERE \"id\" = $3::int8"
        );
        assert_eq!(stmt.params()[2].value, SqlValue::BigInt(4));
    }

    #[test]
    fn delete_and_count_statements() {
        let del = build_delete(EntityKind::Position, 42).unwrap();
        assert_eq!(del.sql(), "DELETE FROM \"position\" WHERE \"id\" = $1::int8");

        let count = build_count(EntityKind::Analysis, Some(Filter::equals("stock_id", 7i64))).unwrap();
        assert_eq!(
            count.sql(),
            "SELECT COUNT(*) AS total FROM \"analysis\" e WHERE e.\"stock_id\" = $1::int8"
        );
    }
}
