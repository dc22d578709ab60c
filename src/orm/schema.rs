//! Statically declared entity schemas
//!
//! Each entity module declares one `static` [`EntitySchema`] describing its
//! table, columns, relations and the fields that must never leave the store.
//! The query layer reads field lists and the relation graph from here instead
//! of inspecting the database at runtime.

use crate::error::EntityError;

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    /// Stored as INTEGER 0/1
    Boolean,
    /// Stored as RFC 3339 TEXT
    Timestamp,
}

impl ColumnKind {
    /// SQLite column type
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Integer | ColumnKind::Boolean => "INTEGER",
            ColumnKind::Real => "REAL",
            ColumnKind::Text | ColumnKind::Timestamp => "TEXT",
        }
    }
}

/// Columns the entity facade maintains itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Plain,
    CreatedAt,
    UpdatedAt,
    /// Nullable deletion timestamp used by [`DeletePolicy::Soft`]
    DeletedAt,
    CreatedBy,
    UpdatedBy,
}

/// Column definition for schema generation and row decoding.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    /// Column name in the database (also the field name on the wire)
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this is the primary key
    pub is_primary_key: bool,
    pub role: ColumnRole,
    /// Default value expression (e.g., "0")
    pub default: Option<&'static str>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
            is_primary_key: false,
            role: ColumnRole::Plain,
            default: None,
        }
    }

    /// Auto-incrementing integer primary key
    pub const fn primary_key(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Integer,
            nullable: false,
            is_primary_key: true,
            role: ColumnRole::Plain,
            default: None,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn role(mut self, role: ColumnRole) -> Self {
        self.role = role;
        self
    }

    pub const fn default(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Generate the column definition SQL
    pub fn to_sql(&self) -> String {
        let mut sql = format!("\"{}\" {}", self.name, self.kind.sql_type());

        if self.is_primary_key {
            sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        }

        if !self.nullable && !self.is_primary_key {
            sql.push_str(" NOT NULL");
        }

        if let Some(default) = self.default {
            sql.push_str(&format!(" DEFAULT {}", default));
        }

        sql
    }
}

/// How a relation is joined to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// The owner holds `local_key` pointing at the target's primary key
    BelongsTo { local_key: &'static str },
    /// The target holds `foreign_key` pointing at the owner's primary key
    HasMany { foreign_key: &'static str },
}

/// A navigable relation from one entity to another.
#[derive(Debug, Clone)]
pub struct RelationDef {
    pub name: &'static str,
    pub target: fn() -> &'static EntitySchema,
    pub kind: RelationKind,
}

impl RelationDef {
    pub fn target(&self) -> &'static EntitySchema {
        (self.target)()
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self.kind, RelationKind::HasMany { .. })
    }
}

/// Delete behaviour, fixed per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Set the [`ColumnRole::DeletedAt`] column; deleted rows vanish from reads
    Soft,
    /// Remove the row
    Hard,
}

/// Metadata about a database entity (table).
#[derive(Debug)]
pub struct EntitySchema {
    /// Display name used in errors and logs (e.g., "Product")
    pub name: &'static str,
    /// The SQL table name (e.g., "products")
    pub table: &'static str,
    /// The primary key column name (e.g., "id")
    pub primary_key: &'static str,
    pub columns: &'static [ColumnDef],
    pub relations: &'static [RelationDef],
    /// Fields never returned to callers, whatever they ask for
    pub always_excluded: &'static [&'static str],
    pub delete_policy: DeletePolicy,
}

impl EntitySchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// List of all column names in the table
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn column_with_role(&self, role: ColumnRole) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.role == role)
    }

    /// Column filtered on every read when the entity is soft-deleted
    pub fn soft_delete_column(&self) -> Option<&'static str> {
        match self.delete_policy {
            DeletePolicy::Soft => self.column_with_role(ColumnRole::DeletedAt).map(|c| c.name),
            DeletePolicy::Hard => None,
        }
    }

    pub fn is_always_excluded(&self, field: &str) -> bool {
        self.always_excluded.iter().any(|f| *f == field)
    }

    /// Walk a dotted relation path (`category.parent`) to its relation chain.
    pub fn relation_chain(&self, path: &str) -> Option<Vec<&RelationDef>> {
        let mut schema: &EntitySchema = self;
        let mut chain = Vec::new();
        for segment in path.split('.') {
            let relation = schema.relation(segment)?;
            schema = relation.target();
            chain.push(relation);
        }
        Some(chain)
    }

    /// Schema reached by a dotted relation path
    pub fn schema_at(&self, path: &str) -> Option<&EntitySchema> {
        match self.relation_chain(path)?.last() {
            Some(relation) => Some(relation.target()),
            None => Some(self),
        }
    }

    /// Check the descriptor is internally consistent.
    pub fn validate(&self) -> Result<(), EntityError> {
        let invalid = |msg: String| Err(EntityError::InvalidSchema(format!("{}: {}", self.name, msg)));

        match self.column(self.primary_key) {
            Some(col) if col.is_primary_key => {}
            _ => return invalid(format!("primary key `{}` is not a declared primary key column", self.primary_key)),
        }

        for field in self.always_excluded {
            if !self.has_column(field) {
                return invalid(format!("always-excluded field `{}` is not a column", field));
            }
        }

        if self.delete_policy == DeletePolicy::Soft {
            match self.column_with_role(ColumnRole::DeletedAt) {
                Some(col) if col.nullable => {}
                Some(col) => return invalid(format!("deletion column `{}` must be nullable", col.name)),
                None => return invalid("soft delete requires a DeletedAt column".to_string()),
            }
        }

        for relation in self.relations {
            if self.has_column(relation.name) {
                return invalid(format!("relation `{}` shadows a column", relation.name));
            }
            let target = relation.target();
            let ok = match relation.kind {
                RelationKind::BelongsTo { local_key } => self.has_column(local_key),
                RelationKind::HasMany { foreign_key } => target.has_column(foreign_key),
            };
            if !ok {
                return invalid(format!("relation `{}` references a missing key column", relation.name));
            }
        }

        Ok(())
    }

    /// Generate CREATE TABLE IF NOT EXISTS SQL
    pub fn create_table_sql(&self) -> String {
        let column_defs: Vec<String> = self.columns.iter().map(|c| c.to_sql()).collect();

        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n  {}\n)",
            self.table,
            column_defs.join(",\n  ")
        )
    }
}
