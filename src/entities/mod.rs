//! Statically declared demo entities
//!
//! Each module owns one [`EntitySchema`](crate::orm::EntitySchema) and exposes
//! it through `schema()`, which is also what relation definitions point at.

pub mod category;
pub mod product;
pub mod user;

use crate::orm::EntitySchema;

/// All registered schemas, in table creation order
pub fn all() -> [&'static EntitySchema; 3] {
    [user::schema(), category::schema(), product::schema()]
}

/// Look up a schema by table name or entity name (case-insensitive)
pub fn by_name(name: &str) -> Option<&'static EntitySchema> {
    all()
        .into_iter()
        .find(|s| s.table.eq_ignore_ascii_case(name) || s.name.eq_ignore_ascii_case(name))
}
