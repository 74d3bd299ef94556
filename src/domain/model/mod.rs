//! Domain model definitions for the persisted entity kinds.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

pub mod entities;
pub mod registry;
pub mod value;

pub use entities::{Analysis, Indicator, Portfolio, Position, Stock};
pub use registry::{schema_for, ColumnDef, ColumnType, EntitySchema, ParentRelation};
pub use value::{RawRow, Record, SqlValue};

/// The closed set of entity kinds the registry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Stock,
    Analysis,
    Indicator,
    Portfolio,
    Position,
}

impl EntityKind {
    /// Parents come before their children.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Stock,
        EntityKind::Analysis,
        EntityKind::Indicator,
        EntityKind::Portfolio,
        EntityKind::Position,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(schema_for(*self).name)
    }
}

/// Trait that defines the contract for any persisted entity.
///
/// This trait allows the engine and the HTTP layer to work with any entity
/// without knowing its columns. Each implementation provides:
/// - its kind (which selects the registry entry)
/// - conversion to and from a column [`Record`]
/// - wiring of the hydrated parent, if the kind has one
///
/// Identity is the store-assigned id alone: two values are the same entity
/// only when both carry the same id. Transient values are never equal.
pub trait Entity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
    const KIND: EntityKind;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: Option<i64>);

    /// Column values, excluding the identifier.
    fn to_record(&self) -> Record;

    /// Builds an entity from mapped columns (identifier included).
    fn from_record(record: &Record) -> Self;

    /// Attaches the parent mapped from the joined columns.
    fn attach_parent(&mut self, _parent: &Record) {}

    /// Re-derives the foreign key from a nested parent reference when the
    /// scalar is missing (request bodies may carry only `{"stock": {"id": 7}}`).
    fn sync_parent_key(&mut self) {}

    fn same_identity(&self, other: &Self) -> bool {
        matches!((self.id(), other.id()), (Some(a), Some(b)) if a == b)
    }

    fn schema() -> &'static EntitySchema {
        schema_for(Self::KIND)
    }
}
