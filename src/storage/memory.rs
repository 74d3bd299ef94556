//! In-process row store that executes statement plans instead of SQL.
//!
//! Behaves like the Postgres store for the statement shapes the builder can
//! produce: LEFT OUTER JOIN hydration, single-predicate filters, NULLS LAST
//! ascending ordering, and store-assigned increasing identifiers.

use crate::domain::error::StoreError;
use crate::domain::model::registry::{schema_for, PRIMARY_KEY};
use crate::domain::model::{EntityKind, RawRow, Record, SqlValue};
use crate::storage::query::{
    Plan, PlanFilter, PlanPage, Predicate, SortDirection, Statement, COUNT_COLUMN, ENTITY_ALIAS,
};
use crate::storage::store::RowStore;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Record>,
}

pub struct MemoryRowStore {
    tables: RwLock<HashMap<EntityKind, Table>>,
    available: AtomicBool,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates losing (or regaining) the connection to the store.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// Writes a raw record, bypassing the builder (test fixtures, corrupt rows).
    pub async fn put_raw(&self, kind: EntityKind, id: i64, record: Record) {
        let mut tables = self.tables.write().await;
        let table = tables.entry(kind).or_default();
        table.last_id = table.last_id.max(id);
        table.rows.insert(id, record.with(PRIMARY_KEY, id));
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }
}

impl Default for MemoryRowStore {
    fn default() -> Self {
        Self::new()
    }
}

fn filter_matches(record: &Record, filter: Option<&PlanFilter>) -> bool {
    match filter {
        None => true,
        Some(f) => match &f.predicate {
            Predicate::IsNull => record.get(f.column).is_none(),
            Predicate::Equals(value) => record.get(f.column) == Some(value),
        },
    }
}

fn compare_values(a: Option<&SqlValue>, b: Option<&SqlValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        // NULL sorts as larger than any value.
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => match (x, y) {
            (SqlValue::BigInt(l), SqlValue::BigInt(r)) => l.cmp(r),
            (SqlValue::Int(l), SqlValue::Int(r)) => l.cmp(r),
            (SqlValue::Double(l), SqlValue::Double(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
            (SqlValue::Text(l), SqlValue::Text(r)) => l.cmp(r),
            (SqlValue::Date(l), SqlValue::Date(r)) => l.cmp(r),
            _ => Ordering::Equal,
        },
    }
}

fn project(record: Option<&Record>, kind: EntityKind, prefix: &str, out: &mut RawRow) {
    for def in schema_for(kind).columns {
        let value = record
            .and_then(|r| r.get(def.name))
            .cloned()
            .unwrap_or(SqlValue::Null);
        out.insert(format!("{}_{}", prefix, def.name), value);
    }
}

fn apply_page<'a>(mut rows: Vec<&'a Record>, page: Option<&PlanPage>) -> Vec<&'a Record> {
    let Some(page) = page else {
        return rows;
    };
    rows.sort_by(|a, b| {
        let ord = compare_values(a.get(page.sort_column), b.get(page.sort_column));
        match page.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    rows.into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<RawRow>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        match statement.plan() {
            Plan::Select {
                kind,
                join_parent,
                filter,
                page,
            } => {
                let schema = schema_for(*kind);
                let Some(table) = tables.get(kind) else {
                    return Ok(Vec::new());
                };
                let selected: Vec<&Record> = table
                    .rows
                    .values()
                    .filter(|r| filter_matches(r, filter.as_ref()))
                    .collect();
                let selected = apply_page(selected, page.as_ref());

                let parent = if *join_parent { schema.parent } else { None };
                let mut out = Vec::with_capacity(selected.len());
                for record in selected {
                    let mut raw = RawRow::new();
                    project(Some(record), *kind, ENTITY_ALIAS, &mut raw);
                    if let Some(rel) = parent {
                        let parent_schema = schema_for(rel.parent);
                        let parent_record = record
                            .bigint(rel.foreign_key)
                            .and_then(|fk| tables.get(&rel.parent).and_then(|t| t.rows.get(&fk)));
                        project(parent_record, rel.parent, parent_schema.table, &mut raw);
                    }
                    out.push(raw);
                }
                Ok(out)
            }
            Plan::Count { kind, filter } => {
                let total = tables
                    .get(kind)
                    .map(|t| t.rows.values().filter(|r| filter_matches(r, filter.as_ref())).count())
                    .unwrap_or(0);
                let mut raw = RawRow::new();
                raw.insert(COUNT_COLUMN.to_string(), SqlValue::BigInt(total as i64));
                Ok(vec![raw])
            }
            other => Err(StoreError::UnsupportedStatement(format!(
                "fetch_all cannot run a {:?} plan",
                other
            ))),
        }
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        match statement.plan() {
            Plan::Update { kind, id, record } => {
                let Some(existing) = tables.get_mut(kind).and_then(|t| t.rows.get_mut(id)) else {
                    return Ok(0);
                };
                *existing = record.clone().with(PRIMARY_KEY, *id);
                Ok(1)
            }
            Plan::Delete { kind, id } => {
                let removed = tables
                    .get_mut(kind)
                    .and_then(|t| t.rows.remove(id))
                    .is_some();
                Ok(u64::from(removed))
            }
            other => Err(StoreError::UnsupportedStatement(format!(
                "execute cannot run a {:?} plan",
                other
            ))),
        }
    }

    async fn insert_returning_id(&self, statement: &Statement) -> Result<i64, StoreError> {
        self.check_available()?;
        let Plan::Insert { kind, record } = statement.plan() else {
            return Err(StoreError::UnsupportedStatement(
                "insert_returning_id needs an INSERT plan".to_string(),
            ));
        };
        let mut tables = self.tables.write().await;
        let table = tables.entry(*kind).or_default();
        table.last_id += 1;
        let id = table.last_id;
        table.rows.insert(id, record.clone().with(PRIMARY_KEY, id));
        Ok(id)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::query::{build_count, build_insert, build_select, Filter, Page, SelectOptions};

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let store = MemoryRowStore::new();
        let record = Record::new().with("name", "Main");
        let stmt = build_insert(EntityKind::Portfolio, &record).unwrap();
        assert_eq!(store.insert_returning_id(&stmt).await.unwrap(), 1);
        assert_eq!(store.insert_returning_id(&stmt).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn select_outer_joins_missing_parent_as_nulls() {
        let store = MemoryRowStore::new();
        store
            .put_raw(EntityKind::Analysis, 1, Record::new().with("stock_id", 99i64))
            .await;
        let stmt = build_select(EntityKind::Analysis, &SelectOptions::new()).unwrap();
        let rows = store.fetch_all(&stmt).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["e_stock_id"], SqlValue::BigInt(99));
        assert_eq!(rows[0]["stock_id"], SqlValue::Null);
    }

    #[tokio::test]
    async fn page_sorts_nulls_last() {
        let store = MemoryRowStore::new();
        store.put_raw(EntityKind::Portfolio, 1, Record::new()).await;
        store
            .put_raw(EntityKind::Portfolio, 2, Record::new().with("name", "b"))
            .await;
        store
            .put_raw(EntityKind::Portfolio, 3, Record::new().with("name", "a"))
            .await;
        let page = Page::new(0, 10).sorted_by("name", SortDirection::Asc);
        let stmt = build_select(EntityKind::Portfolio, &SelectOptions::new().page(Some(page))).unwrap();
        let ids: Vec<_> = store
            .fetch_all(&stmt)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["e_id"].clone())
            .collect();
        assert_eq!(
            ids,
            vec![SqlValue::BigInt(3), SqlValue::BigInt(2), SqlValue::BigInt(1)]
        );
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryRowStore::new();
        store.set_available(false);
        let stmt = build_count(EntityKind::Stock, Some(Filter::is_null("description"))).unwrap();
        assert!(matches!(
            store.fetch_all(&stmt).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.ping().await.is_err());
        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }
}
