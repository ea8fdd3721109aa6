//! Background tasks and the interaction supervisor
//!
//! The periodic jobs only touch shared state through the same handles the
//! bot uses (content invalidation, limiter and price sweeps) or the file system
//! (backups). The supervisor keeps pulling interactions and rebuilds the
//! source after a connectivity failure instead of exiting.

use crate::bot::Bot;
use crate::content::{ContentStore, CONTENT_TTL};
use crate::models::Interaction;
use crate::prices::{PriceService, PRICE_TTL};
use crate::rate_limit::RateLimiter;
use crate::storage;
use crate::transport::{Transport, TransportError};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub content_tick: Duration,
    pub backup_period: Duration,
    pub backup_initial_delay: Duration,
    pub restart_delay: Duration,
    pub limiter_sweep: Duration,
    pub price_purge: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            content_tick: CONTENT_TTL,
            backup_period: Duration::from_secs(12 * 60 * 60),
            backup_initial_delay: Duration::from_secs(5),
            restart_delay: Duration::from_secs(5),
            limiter_sweep: Duration::from_secs(60),
            price_purge: PRICE_TTL,
        }
    }
}

//
// ================= Periodic jobs =================
//

/// Invalidate the content cache every `period` so edits on disk show up
/// without a restart.
pub fn spawn_content_tick(content: Arc<ContentStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            content.invalidate().await;
        }
    })
}

pub fn spawn_backups(root: PathBuf, initial_delay: Duration, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(initial_delay).await;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = storage::run_backup(&root).await {
                error!(error = %e, "Backup failed");
            }
        }
    })
}

pub fn spawn_limiter_sweep(limiter: Arc<RateLimiter>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = limiter.sweep_idle().await;
            if evicted > 0 {
                debug!(evicted, "Evicted idle rate-limit keys");
            }
        }
    })
}

/// Expired quotes are never served but stay in the map until removed here.
pub fn spawn_price_purge(prices: Arc<PriceService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = prices.purge_expired().await;
            if evicted > 0 {
                debug!(evicted, "Purged expired price quotes");
            }
        }
    })
}

//
// ================= Supervisor =================
//

/// Stream of inbound interactions from the messaging platform.
#[async_trait::async_trait]
pub trait UpdateSource: Send {
    /// Next batch of interactions; `Ok(None)` once the source is closed.
    async fn next_batch(&mut self) -> Result<Option<Vec<Interaction>>, TransportError>;
}

/// Handle one interaction in its own task. Handler errors and panics are
/// logged, never propagated.
pub fn spawn_interaction(
    bot: Arc<Bot>,
    transport: Arc<dyn Transport>,
    interaction: Interaction,
) -> JoinHandle<()> {
    let user_id = interaction.user_id();
    let work = tokio::spawn(async move { bot.handle(&interaction, transport.as_ref()).await });

    tokio::spawn(async move {
        match work.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(user_id, error = %e, "Interaction failed"),
            Err(e) if e.is_panic() => error!(user_id, "Interaction handler panicked"),
            Err(e) => warn!(user_id, error = %e, "Interaction task cancelled"),
        }
    })
}

/// Pull interactions until the source closes. A source error is logged and
/// the source rebuilt from `factory` after `restart_delay`. Returns how many
/// times the source was (re)built.
pub async fn supervise<F, S>(
    mut factory: F,
    bot: Arc<Bot>,
    transport: Arc<dyn Transport>,
    restart_delay: Duration,
) -> usize
where
    F: FnMut() -> crate::Result<S>,
    S: UpdateSource,
{
    let mut builds = 0;
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

    'restart: loop {
        let mut source = match factory() {
            Ok(source) => {
                builds += 1;
                info!(attempt = builds, "Interaction source started");
                source
            }
            Err(e) => {
                error!(error = %e, "Could not build interaction source");
                sleep(restart_delay).await;
                continue 'restart;
            }
        };

        loop {
            match source.next_batch().await {
                Ok(Some(batch)) => {
                    in_flight.retain(|h| !h.is_finished());
                    for interaction in batch {
                        in_flight.push(spawn_interaction(
                            bot.clone(),
                            transport.clone(),
                            interaction,
                        ));
                    }
                }
                Ok(None) => {
                    info!("Interaction source closed");
                    join_all(in_flight).await;
                    return builds;
                }
                Err(e) => {
                    error!(error = %e, delay = ?restart_delay, "Interaction source failed, restarting");
                    sleep(restart_delay).await;
                    continue 'restart;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StaticContentSource;
    use crate::models::{ContentDocument, InstrumentClass, PriceSnapshot, Sender};
    use crate::rate_limit::RateLimitConfig;

    #[tokio::test(start_paused = true)]
    async fn test_limiter_sweep_evicts_idle_keys() {
        let limiter = Arc::new(RateLimiter::with_config(RateLimitConfig::default()));
        limiter.allow_raw("a").await;

        let handle = spawn_limiter_sweep(limiter.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(limiter.tracked_keys().await, 0);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_price_purge_drops_expired_quotes() {
        struct Fixed;

        #[async_trait::async_trait]
        impl crate::prices::PriceProvider for Fixed {
            async fn fetch(&self, _class: InstrumentClass, id: &str) -> crate::Result<PriceSnapshot> {
                Ok(PriceSnapshot::from_reference(id, None, 10.0, 10.0))
            }
        }

        let prices = Arc::new(PriceService::new(Arc::new(Fixed)));
        prices.get_price(InstrumentClass::Stock, "AAPL").await.unwrap();
        prices.get_price(InstrumentClass::Crypto, "bitcoin").await.unwrap();
        assert_eq!(prices.cached_len().await, 2);

        let handle = spawn_price_purge(prices.clone(), PRICE_TTL);
        tokio::time::sleep(PRICE_TTL / 2).await;
        prices.get_price(InstrumentClass::Index, "^GSPC").await.unwrap();

        // First sweep: the two early quotes have aged out, the third has not.
        tokio::time::sleep(PRICE_TTL / 2 + Duration::from_secs(1)).await;
        assert_eq!(prices.cached_len().await, 1);

        tokio::time::sleep(PRICE_TTL).await;
        assert_eq!(prices.cached_len().await, 0);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_tick_forces_reload() {
        struct Counting(std::sync::atomic::AtomicUsize);

        #[async_trait::async_trait]
        impl crate::content::ContentSource for Counting {
            async fn load(&self) -> crate::Result<ContentDocument> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(ContentDocument::default())
            }
        }

        let source = Arc::new(Counting(std::sync::atomic::AtomicUsize::new(0)));
        let store = Arc::new(ContentStore::with_ttl(source.clone(), Duration::from_secs(3600)));
        store.get_document().await;

        let handle = spawn_content_tick(store.clone(), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(5100)).await;
        store.get_document().await;

        assert_eq!(source.0.load(std::sync::atomic::Ordering::SeqCst), 2);
        handle.abort();
    }

    #[tokio::test]
    async fn test_backups_run_after_initial_delay() {
        let dir = tempfile::tempdir().unwrap();
        storage::JsonFileStore::open(dir.path()).await.unwrap();

        let handle = spawn_backups(
            dir.path().to_path_buf(),
            Duration::from_millis(10),
            Duration::from_secs(3600),
        );
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(storage::latest_backup(dir.path()).await.unwrap().is_some());
        handle.abort();
    }

    struct ScriptedSource {
        script: std::collections::VecDeque<Result<Option<Vec<Interaction>>, TransportError>>,
    }

    #[async_trait::async_trait]
    impl UpdateSource for ScriptedSource {
        async fn next_batch(&mut self) -> Result<Option<Vec<Interaction>>, TransportError> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    fn test_bot() -> Arc<Bot> {
        use crate::bot::BotDeps;
        use crate::premium::DirectoryDelivery;
        use crate::prices::{HttpPriceProvider, PriceService, ProviderConfig};
        use crate::storage::InMemoryUserStore;

        let provider = HttpPriceProvider::new(ProviderConfig::default()).unwrap();
        Arc::new(Bot::new(BotDeps {
            admin_id: 1,
            support_url: "https://t.me/support".to_string(),
            store: Arc::new(InMemoryUserStore::new()),
            prices: Arc::new(PriceService::new(Arc::new(provider))),
            content: Arc::new(ContentStore::new(Arc::new(StaticContentSource::new(
                ContentDocument::default(),
            )))),
            delivery: Arc::new(DirectoryDelivery::new("/nonexistent")),
            limiter: Arc::new(RateLimiter::new()),
            data_root: None,
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_restarts_after_source_error() {
        use crate::transport::BufferedTransport;

        let transport = Arc::new(BufferedTransport::new());
        let start = Interaction::command(10, Sender::new(10), "/start");

        let mut scripts = std::collections::VecDeque::from(vec![
            vec![
                Ok(Some(vec![start.clone()])),
                Err(TransportError::Disconnected("polling error".to_string())),
            ],
            vec![Ok(Some(vec![start])), Ok(None)],
        ]);

        let builds = supervise(
            move || {
                Ok(ScriptedSource {
                    script: scripts.pop_front().unwrap_or_default().into(),
                })
            },
            test_bot(),
            transport.clone(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(builds, 2);
        assert_eq!(transport.actions().await.len(), 2);
    }
}
