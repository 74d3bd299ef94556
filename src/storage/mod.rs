pub mod memory;
pub mod postgres;
pub mod query;
pub mod row_mapper;
pub mod store;

pub use memory::MemoryRowStore;
pub use postgres::PgRowStore;
pub use query::{Filter, Page, SelectOptions, SortDirection, Statement};
pub use store::RowStore;
