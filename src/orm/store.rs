//! Backing-store abstraction used by the entity facade

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use super::schema::EntitySchema;
use crate::query::{QueryOptions, Scalar};

/// A stored row (plus any attached relations) as a JSON object.
pub type Record = Map<String, JsonValue>;

/// Errors raised by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The options could not be compiled against the schema
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Primitive operations the facade issues against persistent storage.
#[async_trait]
pub trait Store: Send + Sync {
    /// Number of rows matching the predicate (ignores pagination)
    async fn count(&self, schema: &EntitySchema, options: &QueryOptions) -> Result<i64, StoreError>;

    /// First matching row with its relations
    async fn find_one(
        &self,
        schema: &EntitySchema,
        options: &QueryOptions,
    ) -> Result<Option<Record>, StoreError>;

    /// All matching rows, paginated when the options carry a page
    async fn find_many(
        &self,
        schema: &EntitySchema,
        options: &QueryOptions,
    ) -> Result<Vec<Record>, StoreError>;

    async fn find_many_and_count(
        &self,
        schema: &EntitySchema,
        options: &QueryOptions,
    ) -> Result<(Vec<Record>, i64), StoreError> {
        let total = self.count(schema, options).await?;
        let records = self.find_many(schema, options).await?;
        Ok((records, total))
    }

    /// Build an unsaved record from input data
    fn create(&self, _schema: &EntitySchema, data: Record) -> Record {
        data
    }

    /// Apply `patch` over `target` in memory
    fn merge(&self, _schema: &EntitySchema, mut target: Record, patch: Record) -> Record {
        target.extend(patch);
        target
    }

    /// Insert when the primary key is absent, update the present columns otherwise.
    async fn save(&self, schema: &EntitySchema, record: Record) -> Result<Record, StoreError>;

    /// Remove the row; returns the number of rows affected
    async fn delete(&self, schema: &EntitySchema, id: &Scalar) -> Result<u64, StoreError>;
}
