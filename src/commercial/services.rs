//! Commercial record service functions.
//!
//! Ties the pure breakdown pipeline to the rate provider, the gateway and
//! the record cache. Saving is single-flight per booking: a second save for
//! the same booking is refused while the first is pending.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::cache::AppCache;

use super::calculators::{compute_breakdown, BreakdownResult};
use super::errors::{CommercialError, PersistenceError, ValidationError};
use super::gateway::CommercialRecordGateway;
use super::models::{CommercialRecord, StoredRecord};
use super::rates::{resolve_exchange_rate, RateProvider};

/// Result of a successful save
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub record_id: Uuid,
    pub version: i32,
    pub created: bool,
    /// The record as persisted (auto rate resolved).
    pub record: CommercialRecord,
    pub breakdown: BreakdownResult,
}

/// A stored record with its breakdown
#[derive(Debug, Clone)]
pub struct LoadedRecord {
    pub stored: StoredRecord,
    pub breakdown: BreakdownResult,
}

/// Check what must be present before anything is sent to the store.
pub fn validate_for_save(record: &CommercialRecord) -> Result<Uuid, ValidationError> {
    let booking_id = record.booking_id.ok_or(ValidationError::MissingBooking)?;
    if record.buying.amount.is_none() {
        return Err(ValidationError::MissingAmount {
            field: "buying.amount",
        });
    }
    if record.selling.price.is_none() {
        return Err(ValidationError::MissingAmount {
            field: "selling.price",
        });
    }
    Ok(booking_id)
}

/// Bookings with a save in flight.
#[derive(Clone, Default)]
pub struct SaveLocks {
    pending: Arc<Mutex<HashSet<Uuid>>>,
}

impl SaveLocks {
    /// Claim the booking, or `None` if a save is already pending for it.
    pub fn try_acquire(&self, booking_id: Uuid) -> Option<SaveGuard> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(booking_id) {
            return None;
        }
        Some(SaveGuard {
            pending: Arc::clone(&self.pending),
            booking_id,
        })
    }

    pub fn is_pending(&self, booking_id: Uuid) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&booking_id)
    }
}

/// Releases the booking when dropped.
pub struct SaveGuard {
    pending: Arc<Mutex<HashSet<Uuid>>>,
    booking_id: Uuid,
}

impl Drop for SaveGuard {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.booking_id);
    }
}

pub struct CommercialService {
    gateway: Arc<dyn CommercialRecordGateway>,
    rates: Arc<dyn RateProvider>,
    cache: AppCache,
    locks: SaveLocks,
    timeout: Duration,
}

impl CommercialService {
    pub fn new(
        gateway: Arc<dyn CommercialRecordGateway>,
        rates: Arc<dyn RateProvider>,
        cache: AppCache,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            rates,
            cache,
            locks: SaveLocks::default(),
            timeout,
        }
    }

    pub fn locks(&self) -> &SaveLocks {
        &self.locks
    }

    /// Live recalculation: resolve the auto rate on a copy of the record and
    /// run the pipeline. Nothing is persisted.
    pub async fn preview(&self, record: &CommercialRecord) -> (CommercialRecord, BreakdownResult) {
        let mut resolved = record.clone();
        resolve_exchange_rate(&mut resolved, self.rates.as_ref()).await;
        let breakdown = compute_breakdown(&resolved);
        (resolved, breakdown)
    }

    /// Load the record of a booking, cache first.
    ///
    /// A fetched record only fills an empty slot: if a save wrote through
    /// while the fetch was in flight, the saved record wins.
    pub async fn load(&self, booking_id: Uuid) -> Result<Option<LoadedRecord>, CommercialError> {
        let stored = if let Some(cached) = self.cache.records.get(&booking_id).await {
            debug!("Cache HIT for commercial record of booking: {}", booking_id);
            cached
        } else {
            debug!("Cache MISS for commercial record of booking: {}", booking_id);
            let fetched = self
                .bounded("fetch commercial record", self.gateway.fetch_by_booking(booking_id))
                .await?;
            let Some(stored) = fetched else {
                return Ok(None);
            };
            self.cache
                .records
                .entry(booking_id)
                .or_insert_with(async { Arc::new(stored) })
                .await
                .into_value()
        };

        let stored = (*stored).clone();
        let breakdown = compute_breakdown(&stored.record);
        Ok(Some(LoadedRecord { stored, breakdown }))
    }

    /// Validate, then fetch-existing, create-or-update and link. The saved
    /// record replaces whatever the cache held for the booking.
    ///
    /// `expected_version` is the version the editor loaded; `None` adopts the
    /// stored version. The caller's record is never modified, so a failed
    /// save can simply be retried.
    pub async fn save(
        &self,
        record: &CommercialRecord,
        expected_version: Option<i32>,
    ) -> Result<SaveOutcome, CommercialError> {
        let booking_id = validate_for_save(record)?;

        let _guard = self
            .locks
            .try_acquire(booking_id)
            .ok_or(CommercialError::SaveInProgress(booking_id))?;

        let (resolved, breakdown) = self.preview(record).await;

        let result = self
            .persist(booking_id, &resolved, expected_version)
            .await;

        let (record_id, version, created) = match result {
            Ok(saved) => saved,
            Err(e) => {
                self.cache.invalidate_booking(booking_id).await;
                error!("Saving commercial record for booking {} failed: {}", booking_id, e);
                return Err(CommercialError::Persistence(e));
            }
        };

        let stored = StoredRecord {
            id: record_id,
            version,
            updated_at: Utc::now(),
            record: resolved.clone(),
        };
        self.cache.records.insert(booking_id, Arc::new(stored)).await;

        info!(
            "Saved commercial record {} (version {}) for booking {}",
            record_id, version, booking_id
        );

        Ok(SaveOutcome {
            record_id,
            version,
            created,
            record: resolved,
            breakdown,
        })
    }

    async fn persist(
        &self,
        booking_id: Uuid,
        record: &CommercialRecord,
        expected_version: Option<i32>,
    ) -> Result<(Uuid, i32, bool), PersistenceError> {
        let existing = self
            .bounded("fetch commercial record", self.gateway.fetch_by_booking(booking_id))
            .await?;

        let (record_id, version, created) = match existing {
            None => {
                let id = self
                    .bounded("create commercial record", self.gateway.create(record))
                    .await?;
                (id, 1, true)
            }
            Some(stored) => {
                let expected = expected_version.unwrap_or(stored.version);
                let version = self
                    .bounded(
                        "update commercial record",
                        self.gateway.update(stored.id, expected, record),
                    )
                    .await?;
                (stored.id, version, false)
            }
        };

        self.bounded(
            "link commercial record",
            self.gateway.link_to_booking(record_id, booking_id),
        )
        .await?;

        Ok((record_id, version, created))
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, PersistenceError>>,
    ) -> Result<T, PersistenceError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PersistenceError::Timeout {
                operation,
                after: self.timeout,
            }),
        }
    }
}
