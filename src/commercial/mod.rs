//! Commercial margin engine.
//!
//! Derives cost, revenue, converted cost, profit, margin and markup for a
//! booking's commercial record, and saves records through a versioned
//! gateway.

pub mod calculators;
pub mod coerce;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod queries;
pub mod rates;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;

// Re-export commonly used items
pub use calculators::{compute_breakdown, round_money, BreakdownResult};
pub use errors::{CommercialError, PersistenceError, ValidationError};
pub use gateway::{CommercialRecordGateway, InMemoryGateway, PgCommercialGateway};
pub use models::{CommercialRecord, StoredRecord};
pub use rates::{CachingRateProvider, RateProvider, StaticRateTable};
pub use routes::router;
pub use services::CommercialService;
