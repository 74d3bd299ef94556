//! The row-oriented data source the CRUD engine runs statements against.

use crate::domain::error::StoreError;
use crate::domain::model::RawRow;
use crate::storage::query::Statement;
use async_trait::async_trait;

/// A relational store that executes built [`Statement`]s.
///
/// Implementations own their connection resources; every call is a single
/// statement and either fully applies or fails.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Runs a SELECT (or COUNT) and returns rows keyed by column alias.
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<RawRow>, StoreError>;

    /// Runs an UPDATE or DELETE and returns the number of affected rows.
    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError>;

    /// Runs an INSERT and returns the identifier the store assigned.
    async fn insert_returning_id(&self, statement: &Statement) -> Result<i64, StoreError>;

    /// Cheap connectivity check used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
