//! In-memory caching using moka
//!
//! Commercial records are read on every booking view and invoice run but
//! only change on an explicit save, so reads go through a short-lived cache
//! that each save invalidates.

use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::commercial::models::StoredRecord;

/// Application cache holding stored commercial records
#[derive(Clone)]
pub struct AppCache {
    /// Commercial records (booking id -> StoredRecord)
    pub records: Cache<Uuid, Arc<StoredRecord>>,
}

impl AppCache {
    /// Create a new cache instance with the given record TTL
    pub fn new(record_ttl: Duration) -> Self {
        Self {
            // Commercial records: 1000 bookings, idle entries dropped after a minute
            records: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(record_ttl)
                .time_to_idle(Duration::from_secs(60).min(record_ttl))
                .build(),
        }
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            records_size: self.records.entry_count(),
        }
    }

    /// Invalidate the record of one booking
    pub async fn invalidate_booking(&self, booking_id: Uuid) {
        self.records.invalidate(&booking_id).await;
        debug!("Cache invalidated for booking: {}", booking_id);
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

/// Cache statistics for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub records_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commercial::models::CommercialRecord;
    use chrono::Utc;

    fn stored() -> StoredRecord {
        StoredRecord {
            id: Uuid::new_v4(),
            version: 1,
            updated_at: Utc::now(),
            record: CommercialRecord::default(),
        }
    }

    #[tokio::test]
    async fn test_invalidate_booking() {
        let cache = AppCache::default();
        let booking_id = Uuid::new_v4();
        cache.records.insert(booking_id, Arc::new(stored())).await;
        assert!(cache.records.get(&booking_id).await.is_some());

        cache.invalidate_booking(booking_id).await;
        assert!(cache.records.get(&booking_id).await.is_none());
    }
}
