//! Error taxonomy of the CRUD core.

use crate::domain::model::registry::ColumnType;

/// A stored value that cannot be read back as its column's type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot read column '{column}' as {expected}: found {found} value '{value}'")]
pub struct TypeCoercionError {
    pub column: String,
    pub expected: ColumnType,
    pub found: &'static str,
    pub value: String,
}

/// Query shapes the builder deliberately refuses.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryShapeError {
    #[error("at most one filter predicate is supported, got {0}")]
    TooManyFilters(usize),

    #[error("join depth {0} is not supported (maximum is one level)")]
    JoinTooDeep(u8),

    #[error("unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: &'static str, column: String },

    #[error("'{0}' has no parent relation")]
    NoParentRelation(&'static str),
}

/// Failures raised by a row store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(sqlx::Error),

    /// The database answered but refused the statement (constraint, value too long, ...).
    #[error("database rejected the statement: {0}")]
    Rejected(String),

    #[error("store is unavailable: {0}")]
    Unavailable(String),

    #[error("statement not supported by this store: {0}")]
    UnsupportedStatement(String),

    #[error("unsupported column type '{type_name}' for column '{column}'")]
    UnsupportedColumnType { column: String, type_name: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => StoreError::Rejected(db.message().to_string()),
            other => StoreError::Sqlx(other),
        }
    }
}

/// Top-level error type returned by every engine operation.
#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    #[error("{entity}.{field} must not be null")]
    Validation {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity}.{field} must not exceed {max} characters")]
    TooLong {
        entity: &'static str,
        field: &'static str,
        max: usize,
    },

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    TypeCoercion(#[from] TypeCoercionError),

    #[error("unsupported query shape: {0}")]
    UnsupportedQueryShape(#[from] QueryShapeError),

    #[error("storage rejected the request: {0}")]
    StorageRejected(StoreError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(StoreError),
}

impl From<StoreError> for CrudError {
    fn from(err: StoreError) -> Self {
        if matches!(err, StoreError::Rejected(_)) {
            CrudError::StorageRejected(err)
        } else {
            CrudError::StorageUnavailable(err)
        }
    }
}

impl CrudError {
    /// Stable machine-readable key surfaced by the HTTP layer.
    pub fn error_key(&self) -> &'static str {
        match self {
            CrudError::Validation { .. } | CrudError::TooLong { .. } => "validation",
            CrudError::NotFound { .. } => "idnotfound",
            CrudError::TypeCoercion(_) => "typecoercion",
            CrudError::UnsupportedQueryShape(_) => "unsupportedquery",
            CrudError::StorageRejected(_) => "storagerejected",
            CrudError::StorageUnavailable(_) => "storageunavailable",
        }
    }
}
