//! Static schema registry: tables, columns and the parent relation of each entity kind.

use crate::domain::error::CrudError;
use crate::domain::model::value::{Record, SqlValue};
use crate::domain::model::EntityKind;
use std::fmt;

/// Semantic type of a column, independent of the SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Id,
    Date,
    Double,
    Integer,
    Text,
}

impl ColumnType {
    /// Postgres type used in DDL and placeholder casts.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Id => "BIGINT",
            ColumnType::Date => "DATE",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Integer => "INTEGER",
            // Keep in step with TEXT_MAX_CHARS.
            ColumnType::Text => "VARCHAR(255)",
        }
    }

    pub fn cast(&self) -> &'static str {
        match self {
            ColumnType::Id => "int8",
            ColumnType::Date => "date",
            ColumnType::Double => "float8",
            ColumnType::Integer => "int4",
            ColumnType::Text => "text",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Id => "identifier",
            ColumnType::Date => "date",
            ColumnType::Double => "double",
            ColumnType::Integer => "integer",
            ColumnType::Text => "text",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, ty: ColumnType, nullable: bool) -> ColumnDef {
    ColumnDef { name, ty, nullable }
}

/// Zero-or-one foreign key from a child table to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRelation {
    pub foreign_key: &'static str,
    pub parent: EntityKind,
    pub parent_key: &'static str,
}

/// Everything the engine knows about one entity kind.
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    /// Entity name used in logs and error payloads.
    pub name: &'static str,
    pub table: &'static str,
    /// Path segment under `/api`.
    pub resource: &'static str,
    /// Ordered columns, identifier first.
    pub columns: &'static [ColumnDef],
    pub parent: Option<ParentRelation>,
}

pub const PRIMARY_KEY: &str = "id";

/// Character limit of text columns (`VARCHAR(255)`).
pub const TEXT_MAX_CHARS: usize = 255;

static STOCK: EntitySchema = EntitySchema {
    kind: EntityKind::Stock,
    name: "stock",
    table: "stock",
    resource: "stocks",
    columns: &[
        col("id", ColumnType::Id, true),
        col("name", ColumnType::Text, false),
        col("sector", ColumnType::Text, false),
        col("fundation", ColumnType::Date, true),
        col("description", ColumnType::Text, true),
        col("icnome", ColumnType::Double, true),
        col("expenses", ColumnType::Double, true),
        col("capitalization", ColumnType::Double, true),
        col("employees", ColumnType::Integer, true),
    ],
    parent: None,
};

static ANALYSIS: EntitySchema = EntitySchema {
    kind: EntityKind::Analysis,
    name: "analysis",
    table: "analysis",
    resource: "analyses",
    columns: &[
        col("id", ColumnType::Id, true),
        col("date", ColumnType::Date, false),
        col("description", ColumnType::Text, true),
        col("stock_id", ColumnType::Id, true),
    ],
    parent: Some(ParentRelation {
        foreign_key: "stock_id",
        parent: EntityKind::Stock,
        parent_key: PRIMARY_KEY,
    }),
};

static INDICATOR: EntitySchema = EntitySchema {
    kind: EntityKind::Indicator,
    name: "indicator",
    table: "indicator",
    resource: "indicators",
    columns: &[
        col("id", ColumnType::Id, true),
        col("name", ColumnType::Text, false),
        col("description", ColumnType::Text, true),
        col("analysis_id", ColumnType::Id, true),
    ],
    parent: Some(ParentRelation {
        foreign_key: "analysis_id",
        parent: EntityKind::Analysis,
        parent_key: PRIMARY_KEY,
    }),
};

static PORTFOLIO: EntitySchema = EntitySchema {
    kind: EntityKind::Portfolio,
    name: "portfolio",
    table: "portfolio",
    resource: "portfolios",
    columns: &[
        col("id", ColumnType::Id, true),
        col("name", ColumnType::Text, false),
        col("description", ColumnType::Text, true),
    ],
    parent: None,
};

static POSITION: EntitySchema = EntitySchema {
    kind: EntityKind::Position,
    name: "position",
    table: "position",
    resource: "positions",
    columns: &[
        col("id", ColumnType::Id, true),
        col("amount", ColumnType::Double, false),
        col("price", ColumnType::Double, false),
        col("portfolio_id", ColumnType::Id, true),
    ],
    parent: Some(ParentRelation {
        foreign_key: "portfolio_id",
        parent: EntityKind::Portfolio,
        parent_key: PRIMARY_KEY,
    }),
};

/// Returns the schema entry for `kind`.
pub fn schema_for(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::Stock => &STOCK,
        EntityKind::Analysis => &ANALYSIS,
        EntityKind::Indicator => &INDICATOR,
        EntityKind::Portfolio => &PORTFOLIO,
        EntityKind::Position => &POSITION,
    }
}

/// Schemas whose parent relation points at `kind`.
pub fn children_of(kind: EntityKind) -> impl Iterator<Item = &'static EntitySchema> {
    EntityKind::ALL
        .iter()
        .map(|k| schema_for(*k))
        .filter(move |s| s.parent.map(|p| p.parent) == Some(kind))
}

impl EntitySchema {
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns written by INSERT/UPDATE (everything except the identifier).
    pub fn data_columns(&self) -> impl Iterator<Item = &'static ColumnDef> {
        self.columns.iter().filter(|c| c.name != PRIMARY_KEY)
    }

    pub fn parent_schema(&self) -> Option<&'static EntitySchema> {
        self.parent.map(|p| schema_for(p.parent))
    }

    /// Rejects a record missing any required column or holding text longer
    /// than its column allows.
    pub fn validate(&self, record: &Record) -> Result<(), CrudError> {
        for c in self.data_columns() {
            match record.get(c.name) {
                None if !c.nullable => {
                    return Err(CrudError::Validation {
                        entity: self.name,
                        field: c.name,
                    })
                }
                Some(SqlValue::Text(text))
                    if c.ty == ColumnType::Text && text.chars().count() > TEXT_MAX_CHARS =>
                {
                    return Err(CrudError::TooLong {
                        entity: self.name,
                        field: c.name,
                        max: TEXT_MAX_CHARS,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// DDL for this table. Foreign keys are plain indexed columns so orphans stay legal.
    pub fn create_table_sql(&self) -> String {
        let mut defs = Vec::with_capacity(self.columns.len());
        for c in self.columns {
            if c.name == PRIMARY_KEY {
                defs.push(format!("\"{}\" BIGSERIAL PRIMARY KEY", c.name));
            } else if c.nullable {
                defs.push(format!("\"{}\" {}", c.name, c.ty.sql_type()));
            } else {
                defs.push(format!("\"{}\" {} NOT NULL", c.name, c.ty.sql_type()));
            }
        }
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n)",
            self.table,
            defs.join(",\n    ")
        )
    }

    pub fn create_index_sql(&self) -> Option<String> {
        self.parent.map(|p| {
            format!(
                "CREATE INDEX IF NOT EXISTS \"idx_{}_{}\" ON \"{}\" (\"{}\")",
                self.table, p.foreign_key, self.table, p.foreign_key
            )
        })
    }
}
