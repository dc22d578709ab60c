//! Database connection and bootstrap

pub mod schema_sync;
pub mod seed;
pub mod sqlite_helpers;

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::entities;
use crate::orm::SqliteStore;

pub use schema_sync::{SchemaSyncResult, sync_all};
pub use seed::{SeedResult, run_seeds};

/// Database wrapper providing connection pool access
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new database connection pool.
    ///
    /// In-memory databases are per connection, so their pool is capped at one.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let max_connections = if is_memory_url(url) {
            1
        } else {
            max_connections.max(1)
        };

        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {}", url))?
            .create_if_missing(true)
            .with_regexp();

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!(max_connections, "Database pool ready");
        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store over this pool
    pub fn store(&self) -> SqliteStore {
        SqliteStore::new(self.pool.clone())
    }

    /// Create missing entity tables and optionally load the demo data.
    pub async fn bootstrap(&self, seed_demo_data: bool) -> Result<()> {
        let sync = sync_all(&self.pool, &entities::all()).await;
        if let Some(first) = sync.errors.first() {
            anyhow::bail!("Schema sync failed: {}", first);
        }

        if seed_demo_data {
            let seeded = run_seeds(&self.pool).await;
            if let Some(first) = seeded.errors.first() {
                anyhow::bail!("Seeding failed: {}", first);
            }
        }
        Ok(())
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_url_detection() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite:file:demo?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite://data/shop.db"));
    }

    #[tokio::test]
    async fn test_connect_and_bootstrap() {
        let db = Database::connect("sqlite::memory:", 8).await.unwrap();
        db.bootstrap(true).await.unwrap();
        db.bootstrap(true).await.unwrap();

        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "users""#)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
