//! Commercial margin service for travel agency bookings.
//!
//! Computes the buying/selling breakdown, converted cost and profit of a
//! booking's commercial record and persists records for the booking screens.

pub mod cache;
pub mod commercial;
pub mod config;
pub mod error;

use std::sync::Arc;

use anyhow::Context;
use axum::{extract::State, routing::get, Json, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::cache::AppCache;
use crate::commercial::{
    CachingRateProvider, CommercialRecordGateway, CommercialService, InMemoryGateway,
    PgCommercialGateway, StaticRateTable,
};
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CommercialService>,
    pub cache: AppCache,
}

/// Wire gateway, rate provider and cache according to the configuration.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let gateway: Arc<dyn CommercialRecordGateway> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(url)
                .await
                .context("Failed to connect to database")?;

            if config.run_migrations {
                sqlx::migrate!("./migrations")
                    .run(&pool)
                    .await
                    .context("Failed to run migrations")?;
                info!("Database migrations applied");
            }

            Arc::new(PgCommercialGateway::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, commercial records are kept in memory");
            Arc::new(InMemoryGateway::new())
        }
    };

    let rates = Arc::new(CachingRateProvider::new(
        StaticRateTable::new(),
        config.rate_cache_ttl,
    ));
    let cache = AppCache::new(config.record_cache_ttl);
    let service = CommercialService::new(gateway, rates, cache.clone(), config.persistence_timeout);

    Ok(AppState {
        service: Arc::new(service),
        cache,
    })
}

/// Full HTTP application
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(commercial::router())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "cache": state.cache.stats(),
    }))
}
