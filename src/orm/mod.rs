//! Schema descriptors, the store abstraction and its SQLite implementation

pub mod builder;
pub mod repository;
pub mod schema;
pub mod store;

pub use builder::{SelectQuery, SqlValue};
pub use repository::SqliteStore;
pub use schema::{
    ColumnDef, ColumnKind, ColumnRole, DeletePolicy, EntitySchema, RelationDef, RelationKind,
};
pub use store::{Record, Store, StoreError};
