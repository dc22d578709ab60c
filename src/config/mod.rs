//! Application configuration management

use std::env;

use anyhow::{Context, Result, bail};

use crate::query::PageLimits;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL (e.g. `sqlite://data/shop.db`)
    pub database_url: String,

    /// Pool size; in-memory databases always use a single connection
    pub database_max_connections: u32,

    /// Page size used when only `page` is supplied
    pub default_page_size: i64,

    /// Upper bound on caller-supplied page sizes
    pub max_page_size: i64,

    /// Fallback filter when RUST_LOG is unset
    pub log_level: String,

    pub log_format: LogFormat,

    /// Load the demo users/categories/products at startup
    pub seed_demo_data: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let log_format = match var("LOG_FORMAT", "pretty").to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" | "text" => LogFormat::Pretty,
            other => bail!("Invalid LOG_FORMAT: {}", other),
        };

        let config = Self {
            database_url: var("DATABASE_URL", "sqlite::memory:"),

            database_max_connections: var("DATABASE_MAX_CONNECTIONS", "5")
                .parse()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?,

            default_page_size: var("DEFAULT_PAGE_SIZE", "10")
                .parse()
                .context("Invalid DEFAULT_PAGE_SIZE")?,

            max_page_size: var("MAX_PAGE_SIZE", "100")
                .parse()
                .context("Invalid MAX_PAGE_SIZE")?,

            log_level: var("LOG_LEVEL", "info"),

            log_format,

            seed_demo_data: parse_bool(&var("SEED_DEMO_DATA", "true"))
                .context("Invalid SEED_DEMO_DATA")?,
        };

        if config.max_page_size < 1 {
            bail!("MAX_PAGE_SIZE must be at least 1");
        }
        if config.default_page_size < 1 || config.default_page_size > config.max_page_size {
            bail!(
                "DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE ({})",
                config.max_page_size
            );
        }

        Ok(config)
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got {}", other),
    }
}
