//! Runtime configuration from the environment (and `.env` via dotenvy).

use std::time::Duration;

use anyhow::{Context, Result};

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL; without one records live in memory.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    /// Upper bound for each persistence call.
    pub persistence_timeout: Duration,
    pub rate_cache_ttl: Duration,
    pub record_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let seconds = |key: &str, default: u64| -> Result<Duration> {
            match get(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a whole number of seconds", key)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            None => 5,
        };

        let run_migrations = get("RUN_MIGRATIONS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            database_url: get("DATABASE_URL"),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            db_max_connections,
            run_migrations,
            persistence_timeout: seconds("PERSISTENCE_TIMEOUT_SECS", 10)?,
            rate_cache_ttl: seconds("RATE_CACHE_TTL_SECS", 60 * 60)?,
            record_cache_ttl: seconds("RECORD_CACHE_TTL_SECS", 5 * 60)?,
        })
    }
}
