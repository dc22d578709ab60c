//! SQLite implementation of [`Store`]
//!
//! Root rows come from one SELECT; each requested relation path is then
//! loaded with a single `IN` query over the keys collected from its parent
//! level and attached in memory (`BelongsTo` as an object or null,
//! `HasMany` as an array). Join keys the caller did not select are fetched
//! internally and stripped again before records are returned.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::builder::{SelectQuery, SqlValue, build_delete, build_insert, build_update};
use super::schema::{ColumnKind, EntitySchema, RelationKind};
use super::store::{Record, Store, StoreError};
use crate::query::{QueryOptions, Scalar, Selection};

/// [`Store`] backed by a SQLite connection pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_rows(
        &self,
        schema: &EntitySchema,
        query: &SelectQuery<'_>,
        columns: &[&'static str],
    ) -> Result<Vec<Record>, StoreError> {
        let sql = query.build_select(columns)?;
        debug!(sql = %sql, table = schema.table, "Executing entity query");

        let mut q = sqlx::query(&sql);
        for value in query.values() {
            q = value.bind_to_query(q);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(schema, row, columns)).collect()
    }

    async fn select(
        &self,
        schema: &EntitySchema,
        options: &QueryOptions,
        single: bool,
    ) -> Result<Vec<Record>, StoreError> {
        let mut query = SelectQuery::new(schema)
            .filter(&options.predicate)?
            .order_by(&options.order)?;
        if single {
            query = query.limit(1);
        } else if options.pagination.is_some() {
            query = query.default_order().paginate(options.pagination);
        }

        let needed = keys_needed_by_children(schema, &options.selection, "");
        let (columns, internal) = fetch_columns(&options.selection.columns, &needed);

        let mut records = self.fetch_rows(schema, &query, &columns).await?;
        self.load_relations(schema, &options.selection, &mut records).await?;
        strip(&mut records, &internal);
        Ok(records)
    }

    async fn load_relations(
        &self,
        schema: &EntitySchema,
        selection: &Selection,
        records: &mut Vec<Record>,
    ) -> Result<(), StoreError> {
        if selection.relations.is_empty() || records.is_empty() {
            return Ok(());
        }

        // top-down: fetch each level from the keys of its parent level
        let mut levels: HashMap<&str, Vec<Record>> = HashMap::new();
        let mut internals: HashMap<&str, Vec<&'static str>> = HashMap::new();
        for rel_sel in &selection.relations {
            let (parent_path, name) = split_path(&rel_sel.path);
            let Some(join) = Join::resolve(schema, parent_path, name) else {
                return Err(StoreError::InvalidQuery(format!(
                    "unknown relation `{}`",
                    rel_sel.path
                )));
            };

            let keys = {
                let parents: &[Record] = if parent_path.is_empty() {
                    records.as_slice()
                } else {
                    levels.get(parent_path).map(Vec::as_slice).unwrap_or(&[])
                };
                collect_keys(parents, join.parent_key)
            };

            let mut needed = vec![join.child_key];
            needed.extend(keys_needed_by_children(join.target, selection, &rel_sel.path));
            let (columns, internal) = fetch_columns(&rel_sel.columns, &needed);

            let children = if keys.is_empty() {
                Vec::new()
            } else {
                let query = SelectQuery::new(join.target)
                    .where_in(join.child_key, keys)?
                    .default_order();
                self.fetch_rows(join.target, &query, &columns).await?
            };

            levels.insert(rel_sel.path.as_str(), children);
            internals.insert(rel_sel.path.as_str(), internal);
        }

        // bottom-up: attach deeper levels first
        for rel_sel in selection.relations.iter().rev() {
            let (parent_path, name) = split_path(&rel_sel.path);
            let Some(join) = Join::resolve(schema, parent_path, name) else {
                continue;
            };
            let children = levels.remove(rel_sel.path.as_str()).unwrap_or_default();
            let internal = internals.remove(rel_sel.path.as_str()).unwrap_or_default();

            let parents: &mut Vec<Record> = if parent_path.is_empty() {
                &mut *records
            } else {
                match levels.get_mut(parent_path) {
                    Some(parents) => parents,
                    None => continue,
                }
            };
            attach(parents, children, &join, &internal);
        }

        Ok(())
    }
}

/// How one relation path joins to its parent level.
struct Join<'a> {
    name: &'a str,
    target: &'static EntitySchema,
    /// Column read from parent rows
    parent_key: &'static str,
    /// Column matched on child rows
    child_key: &'static str,
    multiple: bool,
}

impl<'a> Join<'a> {
    fn resolve(root: &EntitySchema, parent_path: &str, name: &'a str) -> Option<Self> {
        let parent = if parent_path.is_empty() {
            root
        } else {
            root.schema_at(parent_path)?
        };
        let relation = parent.relation(name)?;
        let target = relation.target();
        let (parent_key, child_key) = match relation.kind {
            RelationKind::BelongsTo { local_key } => (local_key, target.primary_key),
            RelationKind::HasMany { foreign_key } => (parent.primary_key, foreign_key),
        };
        Some(Self {
            name,
            target,
            parent_key,
            child_key,
            multiple: relation.is_multiple(),
        })
    }
}

fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('.').unwrap_or(("", path))
}

/// Columns rows at `path` must carry so their child relations can be joined
fn keys_needed_by_children(
    schema_at_path: &EntitySchema,
    selection: &Selection,
    path: &str,
) -> Vec<&'static str> {
    let mut keys = Vec::new();
    for rel_sel in &selection.relations {
        let (parent_path, name) = split_path(&rel_sel.path);
        if parent_path != path {
            continue;
        }
        if let Some(relation) = schema_at_path.relation(name) {
            let key = match relation.kind {
                RelationKind::BelongsTo { local_key } => local_key,
                RelationKind::HasMany { .. } => schema_at_path.primary_key,
            };
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

/// Selected columns plus needed keys, and the keys that must be stripped afterwards
fn fetch_columns(
    selected: &[&'static str],
    needed: &[&'static str],
) -> (Vec<&'static str>, Vec<&'static str>) {
    let mut columns = selected.to_vec();
    let mut internal = Vec::new();
    for key in needed {
        if !columns.contains(key) {
            columns.push(key);
            internal.push(*key);
        }
    }
    (columns, internal)
}

fn collect_keys(records: &[Record], column: &str) -> Vec<SqlValue> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for value in records.iter().filter_map(|r| r.get(column)) {
        if value.is_null() || !seen.insert(value.to_string()) {
            continue;
        }
        if let Some(key) = SqlValue::from_json(value) {
            keys.push(key);
        }
    }
    keys
}

fn attach(
    parents: &mut [Record],
    children: Vec<Record>,
    join: &Join<'_>,
    internal: &[&'static str],
) {
    let mut grouped: HashMap<String, Vec<Record>> = HashMap::new();
    for mut child in children {
        let key = child.get(join.child_key).map(JsonValue::to_string);
        for column in internal {
            child.remove(*column);
        }
        if let Some(key) = key {
            grouped.entry(key).or_default().push(child);
        }
    }

    for parent in parents.iter_mut() {
        let matched = parent
            .get(join.parent_key)
            .filter(|v| !v.is_null())
            .and_then(|v| grouped.get(&v.to_string()));
        let value = if join.multiple {
            JsonValue::Array(matched.cloned().unwrap_or_default().into_iter().map(JsonValue::Object).collect())
        } else {
            matched
                .and_then(|rows| rows.first())
                .cloned()
                .map(JsonValue::Object)
                .unwrap_or(JsonValue::Null)
        };
        parent.insert(join.name.to_string(), value);
    }
}

fn strip(records: &mut [Record], columns: &[&'static str]) {
    if columns.is_empty() {
        return;
    }
    for record in records {
        for column in columns {
            record.remove(*column);
        }
    }
}

fn decode_row(
    schema: &EntitySchema,
    row: &SqliteRow,
    columns: &[&'static str],
) -> Result<Record, StoreError> {
    let mut record = Record::new();
    for (idx, name) in columns.iter().enumerate() {
        let kind = schema.column(name).map(|c| c.kind).unwrap_or(ColumnKind::Text);
        let value = match kind {
            ColumnKind::Integer => row
                .try_get_unchecked::<Option<i64>, _>(idx)?
                .map(JsonValue::from),
            ColumnKind::Real => row
                .try_get_unchecked::<Option<f64>, _>(idx)?
                .map(JsonValue::from),
            ColumnKind::Boolean => row
                .try_get_unchecked::<Option<i64>, _>(idx)?
                .map(|v| JsonValue::Bool(v != 0)),
            ColumnKind::Text | ColumnKind::Timestamp => row
                .try_get_unchecked::<Option<String>, _>(idx)?
                .map(JsonValue::String),
        };
        record.insert(name.to_string(), value.unwrap_or(JsonValue::Null));
    }
    Ok(record)
}

/// Column values of `record` that belong to the table, primary key excluded
fn writable_values<'r>(
    schema: &EntitySchema,
    record: &'r Record,
) -> Result<Vec<(&'r str, SqlValue)>, StoreError> {
    let mut values = Vec::new();
    for (name, value) in record {
        if name == schema.primary_key || !schema.has_column(name) {
            continue;
        }
        let value = SqlValue::from_json(value).ok_or_else(|| {
            StoreError::InvalidQuery(format!("column `{}` cannot hold a nested value", name))
        })?;
        values.push((name.as_str(), value));
    }
    Ok(values)
}

#[async_trait]
impl Store for SqliteStore {
    async fn count(&self, schema: &EntitySchema, options: &QueryOptions) -> Result<i64, StoreError> {
        let query = SelectQuery::new(schema).filter(&options.predicate)?;
        let sql = query.build_count();
        debug!(sql = %sql, table = schema.table, "Executing count query");

        let mut q = sqlx::query(&sql);
        for value in query.values() {
            q = value.bind_to_query(q);
        }
        let row = q.fetch_one(&self.pool).await?;
        Ok(row.try_get(0)?)
    }

    async fn find_one(
        &self,
        schema: &EntitySchema,
        options: &QueryOptions,
    ) -> Result<Option<Record>, StoreError> {
        let records = self.select(schema, options, true).await?;
        Ok(records.into_iter().next())
    }

    async fn find_many(
        &self,
        schema: &EntitySchema,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, StoreError> {
        self.select(schema, options, false).await
    }

    async fn save(&self, schema: &EntitySchema, record: Record) -> Result<Record, StoreError> {
        let values = writable_values(schema, &record)?;
        let key = record
            .get(schema.primary_key)
            .filter(|v| !v.is_null())
            .and_then(SqlValue::from_json);

        let sql = match key {
            Some(_) => build_update(schema, &values)?,
            None => build_insert(schema, &values)?,
        };
        debug!(sql = %sql, table = schema.table, "Executing save");

        let mut q = sqlx::query(&sql);
        for (_, value) in &values {
            q = value.bind_to_query(q);
        }
        if let Some(key) = &key {
            q = key.bind_to_query(q);
        }

        let row = q.fetch_one(&self.pool).await?;
        decode_row(schema, &row, &schema.column_names())
    }

    async fn delete(&self, schema: &EntitySchema, id: &Scalar) -> Result<u64, StoreError> {
        let sql = build_delete(schema);
        debug!(sql = %sql, table = schema.table, "Executing delete");

        let key = SqlValue::from(id);
        let result = key.bind_to_query(sqlx::query(&sql)).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
