//! Generic entity access service
//!
//! One [`EntityService`] wraps one [`EntitySchema`] and a [`Store`]:
//! - Reads run caller options through the assembler before touching the store
//! - Writes validate the payload and maintain timestamp and audit columns
//! - `update_one`/`delete_one` resolve the target first and never write on NotFound
//! - Store errors are logged and surfaced as a fixed, caller-safe message

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::db::sqlite_helpers::now_iso8601;
use crate::error::EntityError;
use crate::orm::{ColumnRole, EntitySchema, Record, Store, StoreError};
use crate::query::{
    EntityQueryOptions, FieldAccess, PageLimits, PaginationMeta, Predicate, QueryOptions, Scalar,
    assemble, validate_predicate,
};

/// Entity service configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let limits = PageLimits::default();
        Self {
            default_page_size: limits.default_page_size,
            max_page_size: limits.max_page_size,
        }
    }
}

impl ServiceConfig {
    pub fn limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

impl From<&Config> for ServiceConfig {
    fn from(config: &Config) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }
}

/// Identity of the caller performing a write, recorded in audit columns
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: Scalar,
}

impl Actor {
    pub fn new(id: impl Into<Scalar>) -> Self {
        Self { id: id.into() }
    }
}

/// A page of records with its listing metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated {
    pub records: Vec<Record>,
    pub meta: PaginationMeta,
}

/// Result of [`EntityService::find_all`].
///
/// Serialized untagged: a bare array without pagination, `{records, meta}` with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FindAllResult {
    List(Vec<Record>),
    Page(Paginated),
}

impl FindAllResult {
    pub fn records(&self) -> &[Record] {
        match self {
            FindAllResult::List(records) => records,
            FindAllResult::Page(page) => &page.records,
        }
    }

    pub fn meta(&self) -> Option<PaginationMeta> {
        match self {
            FindAllResult::List(_) => None,
            FindAllResult::Page(page) => Some(page.meta),
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            FindAllResult::List(records) => records,
            FindAllResult::Page(page) => page.records,
        }
    }
}

/// Result of [`EntityService::delete_one`], depending on the schema's delete policy
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeleteOutcome {
    /// The record with its deletion timestamp set
    SoftDeleted(Record),
    /// The row was removed
    Removed { affected: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Create,
    Update,
}

/// CRUD facade over one entity
pub struct EntityService<S: Store> {
    store: S,
    schema: &'static EntitySchema,
    config: ServiceConfig,
}

impl<S: Store> EntityService<S> {
    pub fn new(
        store: S,
        schema: &'static EntitySchema,
        config: ServiceConfig,
    ) -> Result<Self, EntityError> {
        schema.validate()?;
        Ok(Self {
            store,
            schema,
            config,
        })
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Insert a new record
    pub async fn create_one(
        &self,
        data: Record,
        actor: Option<&Actor>,
    ) -> Result<Record, EntityError> {
        self.validate_payload(&data, Write::Create)
            .map_err(|e| self.rejected("create_one", e))?;

        let now = JsonValue::String(now_iso8601());
        let mut record = self.store.create(self.schema, data);
        self.stamp(&mut record, ColumnRole::CreatedAt, &now);
        self.stamp(&mut record, ColumnRole::UpdatedAt, &now);
        if let Some(actor) = actor {
            self.stamp(&mut record, ColumnRole::CreatedBy, &actor.id.to_json());
            self.stamp(&mut record, ColumnRole::UpdatedBy, &actor.id.to_json());
        }

        let saved = self
            .store
            .save(self.schema, record)
            .await
            .map_err(|e| self.store_failure("create_one", None, e))?;

        debug!(
            entity = self.schema.name,
            id = ?saved.get(self.schema.primary_key),
            "Created record"
        );
        Ok(self.visible(saved))
    }

    /// Merge `data` over the existing record and save it
    pub async fn update_one(
        &self,
        id: Scalar,
        data: Record,
        actor: Option<&Actor>,
    ) -> Result<Record, EntityError> {
        self.validate_payload(&data, Write::Update)
            .map_err(|e| self.rejected("update_one", e))?;

        let existing = self.existing("update_one", &id).await?;

        let mut patch = data;
        self.stamp(&mut patch, ColumnRole::UpdatedAt, &JsonValue::String(now_iso8601()));
        if let Some(actor) = actor {
            self.stamp(&mut patch, ColumnRole::UpdatedBy, &actor.id.to_json());
        }

        let merged = self.store.merge(self.schema, existing, patch);
        let saved = self
            .store
            .save(self.schema, merged)
            .await
            .map_err(|e| self.store_failure("update_one", Some(&id), e))?;

        debug!(entity = self.schema.name, id = %id, "Updated record");
        Ok(self.visible(saved))
    }

    /// Soft-delete (set the deletion timestamp) or remove the record
    pub async fn delete_one(
        &self,
        id: Scalar,
        actor: Option<&Actor>,
    ) -> Result<DeleteOutcome, EntityError> {
        let existing = self.existing("delete_one", &id).await?;

        let outcome = match self.schema.soft_delete_column() {
            Some(column) => {
                let now = JsonValue::String(now_iso8601());
                let mut patch = Record::new();
                patch.insert(column.to_string(), now.clone());
                self.stamp(&mut patch, ColumnRole::UpdatedAt, &now);
                if let Some(actor) = actor {
                    self.stamp(&mut patch, ColumnRole::UpdatedBy, &actor.id.to_json());
                }

                let merged = self.store.merge(self.schema, existing, patch);
                let saved = self
                    .store
                    .save(self.schema, merged)
                    .await
                    .map_err(|e| self.store_failure("delete_one", Some(&id), e))?;
                DeleteOutcome::SoftDeleted(self.visible(saved))
            }
            None => {
                let affected = self
                    .store
                    .delete(self.schema, &id)
                    .await
                    .map_err(|e| self.store_failure("delete_one", Some(&id), e))?;
                DeleteOutcome::Removed { affected }
            }
        };

        debug!(entity = self.schema.name, id = %id, "Deleted record");
        Ok(outcome)
    }

    /// Record with the given primary key, shaped by `options`
    pub async fn find_one(
        &self,
        id: Scalar,
        options: &EntityQueryOptions,
    ) -> Result<Record, EntityError> {
        let query = assemble(
            self.schema,
            options,
            Some((self.schema.primary_key, id.clone())),
            self.config.limits(),
        )
        .map_err(|e| self.rejected("find_one", e))?;

        match self.fetch_one("find_one", Some(&id), &query).await? {
            Some(record) => Ok(record),
            None => Err(self.rejected(
                "find_one",
                EntityError::not_found(self.schema.name, &id),
            )),
        }
    }

    /// First record matching an application predicate (and any caller search)
    pub async fn find_one_by(
        &self,
        predicate: Predicate,
        options: &EntityQueryOptions,
    ) -> Result<Option<Record>, EntityError> {
        validate_predicate(self.schema, &predicate, FieldAccess::Any)
            .map_err(|e| self.rejected("find_one_by", e))?;
        let mut query = assemble(self.schema, options, None, self.config.limits())
            .map_err(|e| self.rejected("find_one_by", e))?;
        query.predicate = predicate.and(query.predicate);

        self.fetch_one("find_one_by", None, &query).await
    }

    /// All matching records; paginated with metadata when a page was requested
    pub async fn find_all(&self, options: &EntityQueryOptions) -> Result<FindAllResult, EntityError> {
        let query = assemble(self.schema, options, None, self.config.limits())
            .map_err(|e| self.rejected("find_all", e))?;

        match query.pagination {
            Some(pagination) => {
                let (records, total) = self
                    .store
                    .find_many_and_count(self.schema, &query)
                    .await
                    .map_err(|e| self.store_failure("find_all", None, e))?;
                Ok(FindAllResult::Page(Paginated {
                    records: records.into_iter().map(|r| self.visible(r)).collect(),
                    meta: pagination.meta(total),
                }))
            }
            None => {
                let records = self
                    .store
                    .find_many(self.schema, &query)
                    .await
                    .map_err(|e| self.store_failure("find_all", None, e))?;
                Ok(FindAllResult::List(
                    records.into_iter().map(|r| self.visible(r)).collect(),
                ))
            }
        }
    }

    async fn fetch_one(
        &self,
        operation: &'static str,
        id: Option<&Scalar>,
        query: &QueryOptions,
    ) -> Result<Option<Record>, EntityError> {
        let record = self
            .store
            .find_one(self.schema, query)
            .await
            .map_err(|e| self.store_failure(operation, id, e))?;
        Ok(record.map(|r| self.visible(r)))
    }

    /// Resolve the live record a write targets
    async fn existing(&self, operation: &'static str, id: &Scalar) -> Result<Record, EntityError> {
        let query = QueryOptions::by_key(self.schema, id.clone());
        match self.fetch_one(operation, Some(id), &query).await? {
            Some(record) => Ok(record),
            None => Err(self.rejected(operation, EntityError::not_found(self.schema.name, id))),
        }
    }

    fn validate_payload(&self, data: &Record, write: Write) -> Result<(), EntityError> {
        let name = self.schema.name;
        for (field, value) in data {
            if field == self.schema.primary_key {
                return Err(EntityError::malformed(format!(
                    "`{}` of {} cannot be written",
                    field, name
                )));
            }
            let Some(column) = self.schema.column(field) else {
                return Err(EntityError::malformed(format!("unknown field `{}` on {}", field, name)));
            };
            if column.role != ColumnRole::Plain {
                return Err(EntityError::malformed(format!(
                    "`{}` of {} is maintained automatically",
                    field, name
                )));
            }
            match value {
                JsonValue::Array(_) | JsonValue::Object(_) => {
                    return Err(EntityError::malformed(format!(
                        "`{}` must be a scalar value",
                        field
                    )));
                }
                JsonValue::Null if !column.nullable => {
                    return Err(EntityError::malformed(format!("`{}` cannot be null", field)));
                }
                _ => {}
            }
        }

        if write == Write::Create {
            let missing = self.schema.columns.iter().find(|c| {
                !c.is_primary_key
                    && !c.nullable
                    && c.default.is_none()
                    && c.role == ColumnRole::Plain
                    && !data.contains_key(c.name)
            });
            if let Some(column) = missing {
                return Err(EntityError::malformed(format!(
                    "missing required field `{}`",
                    column.name
                )));
            }
        }

        Ok(())
    }

    fn stamp(&self, record: &mut Record, role: ColumnRole, value: &JsonValue) {
        if let Some(column) = self.schema.column_with_role(role) {
            record.insert(column.name.to_string(), value.clone());
        }
    }

    fn visible(&self, mut record: Record) -> Record {
        strip_hidden(self.schema, &mut record);
        record
    }

    fn rejected(&self, operation: &'static str, err: EntityError) -> EntityError {
        warn!(
            entity = self.schema.name,
            operation,
            error = %err,
            "Rejected entity request"
        );
        err
    }

    fn store_failure(
        &self,
        operation: &'static str,
        id: Option<&Scalar>,
        err: StoreError,
    ) -> EntityError {
        error!(
            entity = self.schema.name,
            operation,
            id = ?id,
            error = %err,
            "Store operation failed"
        );

        let message = match operation {
            "create_one" => "Failed to create record",
            "update_one" => "Failed to update record",
            "delete_one" => "Failed to delete record",
            _ => "Failed to load records",
        };
        EntityError::StoreFailure {
            operation,
            message: message.to_string(),
        }
    }
}

/// Remove always-excluded fields from a record and every attached relation
fn strip_hidden(schema: &EntitySchema, record: &mut Record) {
    for field in schema.always_excluded {
        record.remove(*field);
    }
    for relation in schema.relations {
        let target = relation.target();
        match record.get_mut(relation.name) {
            Some(JsonValue::Object(child)) => strip_hidden(target, child),
            Some(JsonValue::Array(children)) => {
                for child in children.iter_mut() {
                    if let JsonValue::Object(child) = child {
                        strip_hidden(target, child);
                    }
                }
            }
            _ => {}
        }
    }
}
