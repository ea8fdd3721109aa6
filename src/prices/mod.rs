//! Price lookups: per-class TTL cache in front of an upstream provider
//!
//! Failures are never cached, so the next request retries upstream. Batch
//! lookups run concurrently and every instrument succeeds or fails on its own.

pub mod catalog;
pub mod provider;

pub use catalog::Instrument;
pub use provider::{HttpPriceProvider, PriceProvider, ProviderConfig};

use crate::cache::TtlMap;
use crate::models::{InstrumentClass, PriceSnapshot};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const PRICE_TTL: Duration = Duration::from_secs(300);

/// Outcome for one instrument of a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub instrument_id: String,
    pub snapshot: Option<PriceSnapshot>,
}

/// Per-instrument results in request order, plus the success tally.
#[derive(Debug, Clone)]
pub struct BatchQuote {
    pub class: InstrumentClass,
    pub items: Vec<BatchItem>,
}

impl BatchQuote {
    pub fn success_count(&self) -> usize {
        self.items.iter().filter(|i| i.snapshot.is_some()).count()
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}

pub struct PriceService {
    provider: Arc<dyn PriceProvider>,
    cache: RwLock<TtlMap<(InstrumentClass, String), PriceSnapshot>>,
}

impl PriceService {
    pub fn new(provider: Arc<dyn PriceProvider>) -> Self {
        Self::with_ttl(provider, PRICE_TTL)
    }

    pub fn with_ttl(provider: Arc<dyn PriceProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            cache: RwLock::new(TtlMap::new(ttl)),
        }
    }

    /// Cached snapshot if younger than the TTL, otherwise one upstream call.
    /// Returns None when the upstream call fails.
    pub async fn get_price(
        &self,
        class: InstrumentClass,
        instrument_id: &str,
    ) -> Option<PriceSnapshot> {
        let key = (class, instrument_id.to_string());

        if let Some(hit) = self.cache.read().await.get(&key) {
            debug!(class = %class, instrument_id, "Price cache hit");
            return Some(hit);
        }

        // The lock is not held across the upstream call.
        match self.provider.fetch(class, instrument_id).await {
            Ok(snapshot) => {
                self.cache.write().await.insert(key, snapshot.clone());
                Some(snapshot)
            }
            Err(e) => {
                warn!(class = %class, instrument_id, error = %e, "Price unavailable");
                None
            }
        }
    }

    /// Fetch every id concurrently; wait for all, never fail fast.
    pub async fn get_batch(&self, class: InstrumentClass, ids: &[&str]) -> BatchQuote {
        let lookups = ids.iter().map(|id| self.get_price(class, id));
        let snapshots = join_all(lookups).await;

        let items = ids
            .iter()
            .zip(snapshots)
            .map(|(id, snapshot)| BatchItem {
                instrument_id: id.to_string(),
                snapshot,
            })
            .collect();

        BatchQuote { class, items }
    }

    /// Batch over the fixed catalog of a class.
    pub async fn get_category(&self, class: InstrumentClass) -> BatchQuote {
        let ids: Vec<&str> = catalog::instruments(class).iter().map(|i| i.id).collect();
        self.get_batch(class, &ids).await
    }

    /// Drop every partition so the next lookups go upstream.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    pub async fn purge_expired(&self) -> usize {
        self.cache.write().await.purge_expired()
    }

    /// Stored quotes, expired ones included until the next purge.
    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }
}
