//! The generic CRUD engine.
//!
//! This module sits between the HTTP layer and a [`RowStore`]. It is
//! responsible for:
//! 1.  Building the statement for each operation from the schema registry.
//! 2.  Running exactly one statement per operation (plus an advisory orphan
//!     count after deletes).
//! 3.  Mapping result rows back into typed entities, with the parent hydrated
//!     from the one-level outer join.
//!
//! The engine keeps no state besides the shared store handle, so it is cheap
//! to clone into request handlers.

use crate::domain::error::{CrudError, QueryShapeError};
use crate::domain::model::registry::{children_of, schema_for, PRIMARY_KEY};
use crate::domain::model::{Entity, EntityKind, RawRow};
use crate::storage::query::{
    build_count, build_delete, build_insert, build_select, build_update, Filter, Page,
    SelectOptions, Statement, COUNT_COLUMN, ENTITY_ALIAS,
};
use crate::storage::row_mapper::{map_count, map_parent, map_row};
use crate::storage::store::RowStore;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Clone)]
pub struct CrudEngine {
    store: Arc<dyn RowStore>,
}

impl CrudEngine {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Inserts a transient entity or updates a persistent one.
    ///
    /// Required columns are checked first and reported as [`CrudError::Validation`].
    /// Inserts return the entity with its newly assigned id. Updates write
    /// every column and fail with [`CrudError::NotFound`] when no row has the id.
    pub async fn save<E: Entity>(&self, mut entity: E) -> Result<E, CrudError> {
        let schema = E::schema();
        let record = entity.to_record();
        schema.validate(&record)?;
        match entity.id() {
            None => {
                let statement = build_insert(E::KIND, &record)?;
                trace!(sql = statement.sql(), "inserting row");
                let id = self.store.insert_returning_id(&statement).await?;
                debug!(entity = schema.name, id, "row inserted");
                entity.set_id(Some(id));
            }
            Some(id) => {
                let statement = build_update(E::KIND, id, &record)?;
                trace!(sql = statement.sql(), "updating row");
                let affected = self.store.execute(&statement).await?;
                if affected == 0 {
                    return Err(CrudError::NotFound {
                        entity: schema.name,
                        id,
                    });
                }
                debug!(entity = schema.name, id, "row updated");
            }
        }
        Ok(entity)
    }

    /// Loads one entity with its parent attached; `None` when no row matches.
    pub async fn find_by_id<E: Entity>(&self, id: i64) -> Result<Option<E>, CrudError> {
        let options = SelectOptions::new().filter(Filter::equals(PRIMARY_KEY, id));
        let statement = build_select(E::KIND, &options)?;
        let rows = self.fetch(&statement).await?;
        rows.first().map(hydrate::<E>).transpose()
    }

    /// Loads every entity. Ordering is only defined when a page is given.
    pub async fn find_all<E: Entity>(&self, page: Option<Page>) -> Result<Vec<E>, CrudError> {
        let statement = build_select(E::KIND, &SelectOptions::new().page(page))?;
        let rows = self.fetch(&statement).await?;
        rows.iter().map(hydrate::<E>).collect()
    }

    /// Loads the children of `parent_id`, or the rows without a parent for `None`.
    pub async fn find_by_parent<E: Entity>(&self, parent_id: Option<i64>) -> Result<Vec<E>, CrudError> {
        let schema = E::schema();
        let relation = schema
            .parent
            .ok_or(QueryShapeError::NoParentRelation(schema.name))?;
        let filter = match parent_id {
            Some(id) => Filter::equals(relation.foreign_key, id),
            None => Filter::is_null(relation.foreign_key),
        };
        let statement = build_select(E::KIND, &SelectOptions::new().filter(filter))?;
        let rows = self.fetch(&statement).await?;
        rows.iter().map(hydrate::<E>).collect()
    }

    pub async fn exists_by_id<E: Entity>(&self, id: i64) -> Result<bool, CrudError> {
        let total = self
            .count_where(E::KIND, Some(Filter::equals(PRIMARY_KEY, id)))
            .await?;
        Ok(total > 0)
    }

    pub async fn count<E: Entity>(&self) -> Result<u64, CrudError> {
        self.count_where(E::KIND, None).await
    }

    /// Removes the row if present and returns the number of rows affected.
    ///
    /// Deleting a missing id is not an error. Children are never cascaded:
    /// rows still referencing the deleted id are only reported in the log.
    pub async fn delete_by_id<E: Entity>(&self, id: i64) -> Result<u64, CrudError> {
        let schema = E::schema();
        let statement = build_delete(E::KIND, id)?;
        let affected = self.store.execute(&statement).await?;
        debug!(entity = schema.name, id, affected, "delete executed");

        if affected > 0 {
            self.report_orphans(E::KIND, id).await;
        }
        Ok(affected)
    }

    async fn report_orphans(&self, kind: EntityKind, id: i64) {
        let parent = schema_for(kind);
        for child in children_of(kind) {
            let Some(relation) = child.parent else {
                continue;
            };
            match self
                .count_where(child.kind, Some(Filter::equals(relation.foreign_key, id)))
                .await
            {
                Ok(0) => {}
                Ok(orphans) => warn!(
                    parent = parent.name,
                    parent_id = id,
                    child = child.name,
                    orphans,
                    "deleted parent is still referenced; children are not cascaded"
                ),
                Err(e) => warn!(
                    parent = parent.name,
                    parent_id = id,
                    child = child.name,
                    error = %e,
                    "could not count children of deleted parent"
                ),
            }
        }
    }

    async fn count_where(&self, kind: EntityKind, filter: Option<Filter>) -> Result<u64, CrudError> {
        let statement = build_count(kind, filter)?;
        let rows = self.fetch(&statement).await?;
        match rows.first() {
            Some(row) => Ok(map_count(row, COUNT_COLUMN)?),
            None => Ok(0),
        }
    }

    async fn fetch(&self, statement: &Statement) -> Result<Vec<RawRow>, CrudError> {
        trace!(sql = statement.sql(), params = statement.params().len(), "fetching rows");
        Ok(self.store.fetch_all(statement).await?)
    }

    /// Checks that the store answers at all.
    pub async fn ping(&self) -> Result<(), CrudError> {
        Ok(self.store.ping().await?)
    }
}

fn hydrate<E: Entity>(row: &RawRow) -> Result<E, CrudError> {
    let record = map_row(row, ENTITY_ALIAS, E::KIND)?;
    let mut entity = E::from_record(&record);
    if let Some(parent) = map_parent(row, E::KIND)? {
        entity.attach_parent(&parent);
    }
    Ok(entity)
}
