//! User accounts. Credentials are stored but never selected for callers.

use crate::orm::{
    ColumnDef, ColumnKind, ColumnRole, DeletePolicy, EntitySchema, RelationDef, RelationKind,
};

pub static USER: EntitySchema = EntitySchema {
    name: "User",
    table: "users",
    primary_key: "id",
    columns: &[
        ColumnDef::primary_key("id"),
        ColumnDef::new("email", ColumnKind::Text),
        ColumnDef::new("password", ColumnKind::Text),
        ColumnDef::new("role", ColumnKind::Text).default("'user'"),
        ColumnDef::new("createdAt", ColumnKind::Timestamp).role(ColumnRole::CreatedAt),
        ColumnDef::new("updatedAt", ColumnKind::Timestamp)
            .nullable()
            .role(ColumnRole::UpdatedAt),
        ColumnDef::new("deletedAt", ColumnKind::Timestamp)
            .nullable()
            .role(ColumnRole::DeletedAt),
    ],
    relations: &[RelationDef {
        name: "products",
        target: super::product::schema,
        kind: RelationKind::HasMany {
            foreign_key: "createdBy",
        },
    }],
    always_excluded: &["password"],
    delete_policy: DeletePolicy::Soft,
};

pub fn schema() -> &'static EntitySchema {
    &USER
}
