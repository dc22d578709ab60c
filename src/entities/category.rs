//! Product categories, nested through `parentId`.

use crate::orm::{ColumnDef, ColumnKind, DeletePolicy, EntitySchema, RelationDef, RelationKind};

pub static CATEGORY: EntitySchema = EntitySchema {
    name: "Category",
    table: "categories",
    primary_key: "id",
    columns: &[
        ColumnDef::primary_key("id"),
        ColumnDef::new("name", ColumnKind::Text),
        ColumnDef::new("parentId", ColumnKind::Integer).nullable(),
    ],
    relations: &[
        RelationDef {
            name: "parent",
            target: schema,
            kind: RelationKind::BelongsTo {
                local_key: "parentId",
            },
        },
        RelationDef {
            name: "products",
            target: super::product::schema,
            kind: RelationKind::HasMany {
                foreign_key: "categoryId",
            },
        },
    ],
    always_excluded: &[],
    delete_policy: DeletePolicy::Hard,
};

pub fn schema() -> &'static EntitySchema {
    &CATEGORY
}
