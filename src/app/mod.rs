pub mod crud_engine;

pub use crud_engine::CrudEngine;
