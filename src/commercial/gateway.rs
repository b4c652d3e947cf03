//! Persistence boundary for commercial records.
//!
//! Four operations: fetch by booking, create, update (optimistically
//! versioned) and link to booking. Postgres backs production; the in-memory
//! store serves tests and database-less local runs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{debug, error};
use uuid::Uuid;

use super::errors::PersistenceError;
use super::models::{CommercialRecord, ExtraItem, StoredRecord};
use super::queries;

#[async_trait]
pub trait CommercialRecordGateway: Send + Sync {
    /// `Ok(None)` means the booking has no record yet.
    async fn fetch_by_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<StoredRecord>, PersistenceError>;

    /// Store a new record at version 1 and return its id.
    async fn create(&self, record: &CommercialRecord) -> Result<Uuid, PersistenceError>;

    /// Replace a record if it is still at `expected_version`; returns the new
    /// version.
    async fn update(
        &self,
        id: Uuid,
        expected_version: i32,
        record: &CommercialRecord,
    ) -> Result<i32, PersistenceError>;

    /// Associate a record with a booking. Idempotent.
    async fn link_to_booking(&self, id: Uuid, booking_id: Uuid) -> Result<(), PersistenceError>;
}

fn required_booking(record: &CommercialRecord) -> Result<Uuid, PersistenceError> {
    record
        .booking_id
        .ok_or_else(|| PersistenceError::rejected_field("bookingId", "A booking is required"))
}

/// JSON-encoded text for an item list.
pub fn encode_items(items: &[ExtraItem]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

// ==================== Postgres ====================

#[derive(Clone)]
pub struct PgCommercialGateway {
    pool: PgPool,
}

impl PgCommercialGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Constraint violations become field errors; anything else stays a
/// database error.
fn map_db_error(e: sqlx::Error) -> PersistenceError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return PersistenceError::rejected_field(
                "bookingId",
                "This booking already has commercial data",
            );
        }
        if db.is_foreign_key_violation() || db.is_check_violation() {
            let field = db.constraint().unwrap_or("record").to_string();
            return PersistenceError::rejected_field(&field, db.message().to_string());
        }
    }
    error!("Commercial record query failed: {}", e);
    PersistenceError::Database(e)
}

#[async_trait]
impl CommercialRecordGateway for PgCommercialGateway {
    async fn fetch_by_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<StoredRecord>, PersistenceError> {
        let row = queries::find_by_booking(&self.pool, booking_id)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(|r| r.into_stored()))
    }

    async fn create(&self, record: &CommercialRecord) -> Result<Uuid, PersistenceError> {
        let booking_id = required_booking(record)?;
        let id = Uuid::new_v4();

        queries::insert_record(
            &self.pool,
            id,
            booking_id,
            record,
            &encode_items(&record.buying.additional_costs),
            &encode_items(&record.selling.discounts),
        )
        .await
        .map_err(map_db_error)?;

        debug!("Created commercial record {} for booking {}", id, booking_id);
        Ok(id)
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: i32,
        record: &CommercialRecord,
    ) -> Result<i32, PersistenceError> {
        let updated = queries::update_record(
            &self.pool,
            id,
            expected_version,
            record,
            &encode_items(&record.buying.additional_costs),
            &encode_items(&record.selling.discounts),
        )
        .await
        .map_err(map_db_error)?;

        match updated {
            Some(version) => Ok(version),
            None => match queries::current_version(&self.pool, id)
                .await
                .map_err(map_db_error)?
            {
                Some(actual) => Err(PersistenceError::Conflict {
                    id,
                    expected: expected_version,
                    actual,
                }),
                None => Err(PersistenceError::rejected(format!(
                    "Commercial record {} no longer exists",
                    id
                ))),
            },
        }
    }

    async fn link_to_booking(&self, id: Uuid, booking_id: Uuid) -> Result<(), PersistenceError> {
        let touched = queries::link_booking(&self.pool, id, booking_id)
            .await
            .map_err(map_db_error)?;
        if touched == 0 {
            return Err(PersistenceError::rejected_field(
                "bookingId",
                format!("Booking {} not found", booking_id),
            ));
        }
        Ok(())
    }
}

// ==================== In-memory ====================

#[derive(Default)]
struct MemoryState {
    records: HashMap<Uuid, StoredRecord>,
    links: HashMap<Uuid, Uuid>,
}

/// Gateway kept entirely in process memory.
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<MemoryState>,
    write_delay: Option<Duration>,
    reject_writes: Option<String>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every create/update, to exercise overlapping saves and
    /// timeouts.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Reject every create/update with the given reason.
    pub fn rejecting_writes(mut self, reason: &str) -> Self {
        self.reject_writes = Some(reason.to_string());
        self
    }

    /// Record id linked to a booking, if any.
    pub async fn linked_record(&self, booking_id: Uuid) -> Option<Uuid> {
        self.state.lock().await.links.get(&booking_id).copied()
    }

    async fn before_write(&self) -> Result<(), PersistenceError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reject_writes {
            Some(reason) => Err(PersistenceError::rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CommercialRecordGateway for InMemoryGateway {
    async fn fetch_by_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<StoredRecord>, PersistenceError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .values()
            .find(|stored| stored.record.booking_id == Some(booking_id))
            .cloned())
    }

    async fn create(&self, record: &CommercialRecord) -> Result<Uuid, PersistenceError> {
        let booking_id = required_booking(record)?;
        self.before_write().await?;

        let mut state = self.state.lock().await;
        if state
            .records
            .values()
            .any(|stored| stored.record.booking_id == Some(booking_id))
        {
            return Err(PersistenceError::rejected_field(
                "bookingId",
                "This booking already has commercial data",
            ));
        }

        let id = Uuid::new_v4();
        state.records.insert(
            id,
            StoredRecord {
                id,
                version: 1,
                updated_at: Utc::now(),
                record: record.clone(),
            },
        );
        Ok(id)
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: i32,
        record: &CommercialRecord,
    ) -> Result<i32, PersistenceError> {
        self.before_write().await?;

        let mut state = self.state.lock().await;
        let stored = state.records.get_mut(&id).ok_or_else(|| {
            PersistenceError::rejected(format!("Commercial record {} no longer exists", id))
        })?;

        if stored.version != expected_version {
            return Err(PersistenceError::Conflict {
                id,
                expected: expected_version,
                actual: stored.version,
            });
        }

        stored.version += 1;
        stored.updated_at = Utc::now();
        stored.record = record.clone();
        Ok(stored.version)
    }

    async fn link_to_booking(&self, id: Uuid, booking_id: Uuid) -> Result<(), PersistenceError> {
        let mut state = self.state.lock().await;
        if !state.records.contains_key(&id) {
            return Err(PersistenceError::rejected(format!(
                "Commercial record {} no longer exists",
                id
            )));
        }
        state.links.insert(booking_id, id);
        Ok(())
    }
}
