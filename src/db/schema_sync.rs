//! Table bootstrap from entity schemas
//!
//! Creates missing tables for every registered entity. Existing tables are
//! left untouched; column changes need a real migration.

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::orm::EntitySchema;

/// Result of a schema sync operation
#[derive(Debug, Default)]
pub struct SchemaSyncResult {
    pub tables_created: Vec<String>,
    pub errors: Vec<String>,
}

/// Check if a table exists in the database
async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool, sqlx::Error> {
    let result: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
            .bind(table_name)
            .fetch_optional(pool)
            .await?;

    Ok(result.is_some())
}

/// Create the table for one entity if it is missing
pub async fn sync_entity(
    pool: &SqlitePool,
    schema: &EntitySchema,
) -> Result<SchemaSyncResult, sqlx::Error> {
    let mut result = SchemaSyncResult::default();

    if table_exists(pool, schema.table).await? {
        return Ok(result);
    }

    let create_sql = schema.create_table_sql();
    debug!("Creating table {}: {}", schema.table, create_sql);

    match sqlx::query(&create_sql).execute(pool).await {
        Ok(_) => {
            info!("Created table: {}", schema.table);
            result.tables_created.push(schema.table.to_string());
        }
        Err(e) => {
            let msg = format!("Failed to create table {}: {}", schema.table, e);
            warn!("{}", msg);
            result.errors.push(msg);
        }
    }

    Ok(result)
}

/// Sync all given entity tables, in order.
pub async fn sync_all(pool: &SqlitePool, schemas: &[&EntitySchema]) -> SchemaSyncResult {
    let mut total = SchemaSyncResult::default();

    for schema in schemas {
        match sync_entity(pool, schema).await {
            Ok(result) => {
                total.tables_created.extend(result.tables_created);
                total.errors.extend(result.errors);
            }
            Err(e) => {
                let msg = format!("Failed to sync {}: {}", schema.table, e);
                warn!("{}", msg);
                total.errors.push(msg);
            }
        }
    }

    if !total.tables_created.is_empty() {
        info!(tables = ?total.tables_created, "Schema sync created tables");
    }

    total
}
