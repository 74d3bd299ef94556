pub mod app;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::CrudEngine;
pub use domain::error::{CrudError, StoreError};
pub use domain::model::{Analysis, Entity, EntityKind, Indicator, Portfolio, Position, Stock};
pub use storage::{MemoryRowStore, Page, PgRowStore, RowStore, SortDirection};
