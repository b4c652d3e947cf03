//! Exchange rate sources for auto-calculated rates.
//!
//! The calculators never look a rate up themselves; a caller resolves the
//! rate into the record first with [`resolve_exchange_rate`]. A provider that
//! has no entry, or fails, never blocks calculation or persistence: the rate
//! falls back to 1.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use super::coerce;
use super::models::CommercialRecord;

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Units of `to` for one unit of `from`, `None` when the pair is unknown.
    async fn rate(&self, from: &str, to: &str) -> anyhow::Result<Option<Decimal>>;
}

/// Lookup key for a currency pair, e.g. `USD-EUR`.
pub fn rate_key(from: &str, to: &str) -> String {
    format!("{}-{}", coerce::currency_code(from), coerce::currency_code(to))
}

/// Built-in table of a few common pairs.
#[derive(Debug, Clone)]
pub struct StaticRateTable {
    rates: HashMap<String, Decimal>,
}

impl StaticRateTable {
    pub fn new() -> Self {
        Self::empty()
            .with_rate("USD", "EUR", dec!(0.85))
            .with_rate("EUR", "USD", dec!(1.18))
            .with_rate("USD", "GBP", dec!(0.73))
            .with_rate("GBP", "USD", dec!(1.37))
            .with_rate("EUR", "GBP", dec!(0.86))
            .with_rate("GBP", "EUR", dec!(1.16))
            .with_rate("EUR", "MAD", dec!(10.80))
            .with_rate("MAD", "EUR", dec!(0.093))
            .with_rate("USD", "MAD", dec!(10.00))
            .with_rate("MAD", "USD", dec!(0.10))
    }

    pub fn empty() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Self {
        self.rates.insert(rate_key(from, to), rate);
        self
    }

    pub fn get(&self, from: &str, to: &str) -> Option<Decimal> {
        if coerce::currency_code(from) == coerce::currency_code(to) {
            return Some(Decimal::ONE);
        }
        self.rates.get(&rate_key(from, to)).copied()
    }
}

impl Default for StaticRateTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateProvider for StaticRateTable {
    async fn rate(&self, from: &str, to: &str) -> anyhow::Result<Option<Decimal>> {
        Ok(self.get(from, to))
    }
}

/// Caches successful lookups of another provider.
#[derive(Clone)]
pub struct CachingRateProvider<P> {
    inner: P,
    cache: Cache<String, Decimal>,
}

impl<P: RateProvider> CachingRateProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(ttl)
                .build(),
        }
    }
}

#[async_trait]
impl<P: RateProvider> RateProvider for CachingRateProvider<P> {
    async fn rate(&self, from: &str, to: &str) -> anyhow::Result<Option<Decimal>> {
        let key = rate_key(from, to);
        if let Some(rate) = self.cache.get(&key).await {
            debug!("Cache HIT for exchange rate: {}", key);
            return Ok(Some(rate));
        }
        debug!("Cache MISS for exchange rate: {}", key);

        let rate = self.inner.rate(from, to).await?;
        if let Some(rate) = rate {
            self.cache.insert(key, rate).await;
        }
        Ok(rate)
    }
}

#[async_trait]
impl<P: RateProvider + ?Sized> RateProvider for Arc<P> {
    async fn rate(&self, from: &str, to: &str) -> anyhow::Result<Option<Decimal>> {
        (**self).rate(from, to).await
    }
}

/// Fill in `exchange_rate` when the record asks for an automatic rate and
/// the currencies differ. Unknown pairs and provider failures yield 1.
pub async fn resolve_exchange_rate(record: &mut CommercialRecord, provider: &dyn RateProvider) {
    if !record.auto_calculate_rate || !record.needs_conversion() {
        return;
    }

    let from = coerce::currency_code(&record.buying.currency);
    let to = coerce::currency_code(&record.selling.currency);

    let rate = match provider.rate(&from, &to).await {
        Ok(Some(rate)) if rate > Decimal::ZERO => rate,
        Ok(_) => {
            debug!("No exchange rate for {}, using 1", rate_key(&from, &to));
            Decimal::ONE
        }
        Err(e) => {
            warn!("Exchange rate lookup for {} failed: {}", rate_key(&from, &to), e);
            Decimal::ONE
        }
    };

    record.exchange_rate = rate;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingProvider;

    #[async_trait]
    impl RateProvider for FailingProvider {
        async fn rate(&self, _from: &str, _to: &str) -> anyhow::Result<Option<Decimal>> {
            anyhow::bail!("fx service unavailable")
        }
    }

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateProvider for CountingProvider {
        async fn rate(&self, _from: &str, _to: &str) -> anyhow::Result<Option<Decimal>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(dec!(1.25)))
        }
    }

    fn auto_record(from: &str, to: &str) -> CommercialRecord {
        let mut record = CommercialRecord {
            auto_calculate_rate: true,
            exchange_rate: dec!(3),
            ..Default::default()
        };
        record.buying.currency = from.to_string();
        record.selling.currency = to.to_string();
        record
    }

    #[test]
    fn test_rate_key_is_upper_case() {
        assert_eq!(rate_key("usd", " eur"), "USD-EUR");
    }

    #[test]
    fn test_static_table_lookup() {
        let table = StaticRateTable::new();
        assert_eq!(table.get("USD", "EUR"), Some(dec!(0.85)));
        assert_eq!(table.get("eur", "usd"), Some(dec!(1.18)));
        assert_eq!(table.get("EUR", "EUR"), Some(Decimal::ONE));
        assert_eq!(table.get("JPY", "EUR"), None);
    }

    #[tokio::test]
    async fn test_resolve_uses_table() {
        let mut record = auto_record("USD", "EUR");
        resolve_exchange_rate(&mut record, &StaticRateTable::new()).await;
        assert_eq!(record.exchange_rate, dec!(0.85));
    }

    #[tokio::test]
    async fn test_resolve_unknown_pair_defaults_to_one() {
        let mut record = auto_record("JPY", "EUR");
        resolve_exchange_rate(&mut record, &StaticRateTable::new()).await;
        assert_eq!(record.exchange_rate, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_resolve_provider_failure_defaults_to_one() {
        let mut record = auto_record("USD", "EUR");
        resolve_exchange_rate(&mut record, &FailingProvider).await;
        assert_eq!(record.exchange_rate, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_resolve_keeps_manual_rate() {
        let mut record = auto_record("USD", "EUR");
        record.auto_calculate_rate = false;
        resolve_exchange_rate(&mut record, &StaticRateTable::new()).await;
        assert_eq!(record.exchange_rate, dec!(3));

        let mut same = auto_record("EUR", "EUR");
        resolve_exchange_rate(&mut same, &StaticRateTable::new()).await;
        assert_eq!(same.exchange_rate, dec!(3));
    }

    #[tokio::test]
    async fn test_caching_provider_hits_inner_once() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let provider = CachingRateProvider::new(inner.clone(), Duration::from_secs(60));

        assert_eq!(provider.rate("USD", "CHF").await.unwrap(), Some(dec!(1.25)));
        assert_eq!(provider.rate("usd", "chf").await.unwrap(), Some(dec!(1.25)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
