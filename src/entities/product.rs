use crate::orm::{
    ColumnDef, ColumnKind, ColumnRole, DeletePolicy, EntitySchema, RelationDef, RelationKind,
};

pub static PRODUCT: EntitySchema = EntitySchema {
    name: "Product",
    table: "products",
    primary_key: "id",
    columns: &[
        ColumnDef::primary_key("id"),
        ColumnDef::new("name", ColumnKind::Text),
        ColumnDef::new("description", ColumnKind::Text).nullable(),
        ColumnDef::new("price", ColumnKind::Real).default("0"),
        ColumnDef::new("inStock", ColumnKind::Boolean).default("1"),
        ColumnDef::new("photoId", ColumnKind::Integer).nullable(),
        ColumnDef::new("categoryId", ColumnKind::Integer).nullable(),
        ColumnDef::new("createdAt", ColumnKind::Timestamp).role(ColumnRole::CreatedAt),
        ColumnDef::new("updatedAt", ColumnKind::Timestamp)
            .nullable()
            .role(ColumnRole::UpdatedAt),
        ColumnDef::new("deletedAt", ColumnKind::Timestamp)
            .nullable()
            .role(ColumnRole::DeletedAt),
        ColumnDef::new("createdBy", ColumnKind::Integer)
            .nullable()
            .role(ColumnRole::CreatedBy),
        ColumnDef::new("updatedBy", ColumnKind::Integer)
            .nullable()
            .role(ColumnRole::UpdatedBy),
    ],
    relations: &[
        RelationDef {
            name: "category",
            target: super::category::schema,
            kind: RelationKind::BelongsTo {
                local_key: "categoryId",
            },
        },
        RelationDef {
            name: "creator",
            target: super::user::schema,
            kind: RelationKind::BelongsTo {
                local_key: "createdBy",
            },
        },
    ],
    always_excluded: &[],
    delete_policy: DeletePolicy::Soft,
};

pub fn schema() -> &'static EntitySchema {
    &PRODUCT
}
