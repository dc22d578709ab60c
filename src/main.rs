//! Entity query runner
//!
//! Bootstraps the demo database and runs one caller query against an entity,
//! printing the response envelope as JSON:
//!
//! ```text
//! entity-query --entity products --query 'page=1&pageSize=5&sort[price]=DESC'
//! entity-query --entity categories --id 2 --query 'relations=parent'
//! ```

use anyhow::{Context, Result};
use tracing::info;

use entity_query::api::envelope;
use entity_query::cli::CliOptions;
use entity_query::config::Config;
use entity_query::db::Database;
use entity_query::entities;
use entity_query::orm::{Record, SqliteStore};
use entity_query::query::{EntityQueryOptions, Scalar};
use entity_query::services::{EntityService, ServiceConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config);

    let cli = CliOptions::from_args();
    let entity = cli.entity.as_deref().unwrap_or("products");
    let schema = entities::by_name(entity).with_context(|| format!("Unknown entity: {}", entity))?;

    let db = Database::connect(&config.database_url, config.database_max_connections).await?;
    db.bootstrap(config.seed_demo_data).await?;

    let service = EntityService::new(db.store(), schema, ServiceConfig::from(&config))?;
    info!(entity = schema.name, query = %cli.query, "Running query");

    let output = run(&service, &cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(service: &EntityService<SqliteStore>, cli: &CliOptions) -> Result<serde_json::Value> {
    let options = EntityQueryOptions::from_query_str(&cli.query);

    let output = match &cli.id {
        Some(id) => {
            let id = id
                .parse::<i64>()
                .map(Scalar::Int)
                .unwrap_or_else(|_| Scalar::Text(id.clone()));
            let result = match options {
                Ok(options) => service.find_one(id, &options).await,
                Err(e) => Err(e),
            };
            envelope::<_, Record>(result)?
        }
        None => {
            let result = match options {
                Ok(options) => service.find_all(&options).await,
                Err(e) => Err(e),
            };
            envelope::<_, Vec<Record>>(result)?
        }
    };
    Ok(output)
}
