//! Demo data for a fresh database.
//!
//! Rows carry fixed ids and use INSERT OR IGNORE, so re-runs are idempotent
//! (existing rows are preserved).

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use super::sqlite_helpers::now_iso8601;

/// Result of running seed operations.
#[derive(Debug, Default)]
pub struct SeedResult {
    pub tables_seeded: Vec<String>,
    pub errors: Vec<String>,
}

/// Seed the demo accounts. Password values are opaque placeholders, not usable credentials.
async fn seed_users(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let rows: &[(i64, &str, &str, &str)] = &[
        (1, "admin@shop.test", "!seed-admin", "admin"),
        (2, "user@shop.test", "!seed-user", "user"),
    ];

    let now = now_iso8601();
    let mut inserted = 0u64;
    for (id, email, password, role) in rows {
        let r = sqlx::query(
            r#"INSERT OR IGNORE INTO "users" ("id", "email", "password", "role", "createdAt")
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(*id)
        .bind(*email)
        .bind(*password)
        .bind(*role)
        .bind(&now)
        .execute(pool)
        .await?;

        inserted += r.rows_affected();
    }

    Ok(inserted)
}

async fn seed_categories(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let rows: &[(i64, &str, Option<i64>)] = &[
        (1, "Dairy", None),
        (2, "Cheese", Some(1)),
        (3, "Bakery", None),
    ];

    let mut inserted = 0u64;
    for (id, name, parent_id) in rows {
        let r = sqlx::query(
            r#"INSERT OR IGNORE INTO "categories" ("id", "name", "parentId") VALUES (?, ?, ?)"#,
        )
        .bind(*id)
        .bind(*name)
        .bind(*parent_id)
        .execute(pool)
        .await?;

        inserted += r.rows_affected();
    }

    Ok(inserted)
}

async fn seed_products(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    #[derive(Debug)]
    struct ProductRow {
        id: i64,
        name: &'static str,
        description: Option<&'static str>,
        price: f64,
        in_stock: bool,
        category_id: Option<i64>,
        created_at: &'static str,
    }

    let rows: &[ProductRow] = &[
        ProductRow {
            id: 1,
            name: "Whole milk",
            description: Some("3.2% fat, 1 litre"),
            price: 89.0,
            in_stock: true,
            category_id: Some(1),
            created_at: "2024-01-05T09:00:00.000Z",
        },
        ProductRow {
            id: 2,
            name: "Goat cheese",
            description: Some("Soft, 150 g"),
            price: 340.0,
            in_stock: true,
            category_id: Some(2),
            created_at: "2024-01-12T09:00:00.000Z",
        },
        ProductRow {
            id: 3,
            name: "Mozzarella",
            description: None,
            price: 210.5,
            in_stock: false,
            category_id: Some(2),
            created_at: "2024-02-01T09:00:00.000Z",
        },
        ProductRow {
            id: 4,
            name: "Rye bread",
            description: Some("Sliced loaf"),
            price: 65.0,
            in_stock: true,
            category_id: Some(3),
            created_at: "2024-02-14T09:00:00.000Z",
        },
        ProductRow {
            id: 5,
            name: "Butter",
            description: Some("82.5%, 180 g"),
            price: 189.9,
            in_stock: true,
            category_id: Some(1),
            created_at: "2024-03-03T09:00:00.000Z",
        },
        ProductRow {
            id: 6,
            name: "Croissant",
            description: None,
            price: 120.0,
            in_stock: false,
            category_id: Some(3),
            created_at: "2024-03-20T09:00:00.000Z",
        },
        ProductRow {
            id: 7,
            name: "Gift card",
            description: Some("Uncategorised item"),
            price: 1000.0,
            in_stock: true,
            category_id: None,
            created_at: "2024-04-01T09:00:00.000Z",
        },
    ];

    let mut inserted = 0u64;
    for row in rows {
        let r = sqlx::query(
            r#"INSERT OR IGNORE INTO "products"
               ("id", "name", "description", "price", "inStock", "categoryId", "createdAt", "createdBy")
               VALUES (?, ?, ?, ?, ?, ?, ?, 1)"#,
        )
        .bind(row.id)
        .bind(row.name)
        .bind(row.description)
        .bind(row.price)
        .bind(if row.in_stock { 1i32 } else { 0i32 })
        .bind(row.category_id)
        .bind(row.created_at)
        .execute(pool)
        .await?;

        inserted += r.rows_affected();
    }

    Ok(inserted)
}

/// Run all seeds, parents first.
pub async fn run_seeds(pool: &SqlitePool) -> SeedResult {
    let mut result = SeedResult::default();

    for (table, count) in [
        ("users", seed_users(pool).await),
        ("categories", seed_categories(pool).await),
        ("products", seed_products(pool).await),
    ] {
        match count {
            Ok(n) => {
                if n > 0 {
                    debug!(table = table, count = n, "Seeded table");
                    result.tables_seeded.push(format!("{} ({} rows)", table, n));
                }
            }
            Err(e) => {
                let msg = format!("Seed {}: {}", table, e);
                warn!("{}", msg);
                result.errors.push(msg);
            }
        }
    }

    if !result.tables_seeded.is_empty() {
        info!(tables = ?result.tables_seeded, "Demo data applied");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema_sync::sync_all;
    use crate::entities;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_seeds_are_idempotent() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sync_all(&pool, &entities::all()).await;

        let first = run_seeds(&pool).await;
        assert!(first.errors.is_empty(), "{:?}", first.errors);
        assert_eq!(first.tables_seeded.len(), 3);

        let second = run_seeds(&pool).await;
        assert!(second.tables_seeded.is_empty());

        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM "products""#)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 7);
    }
}
