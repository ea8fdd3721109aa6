//! Read-through cache over the content document
//!
//! The document is shared as an `Arc` snapshot and swapped atomically on
//! reload, so readers never observe a torn document.

use crate::cache::CacheEntry;
use crate::models::ContentDocument;
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, warn};

pub const CONTENT_TTL: Duration = Duration::from_secs(5);

/// Backing store for the content document.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    async fn load(&self) -> Result<ContentDocument>;
}

/// Content document kept as JSON on disk (`data.json`).
pub struct JsonFileContentSource {
    path: PathBuf,
}

impl JsonFileContentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl ContentSource for JsonFileContentSource {
    async fn load(&self) -> Result<ContentDocument> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Fixed document, for tests and embedding.
pub struct StaticContentSource {
    document: ContentDocument,
}

impl StaticContentSource {
    pub fn new(document: ContentDocument) -> Self {
        Self { document }
    }
}

#[async_trait::async_trait]
impl ContentSource for StaticContentSource {
    async fn load(&self) -> Result<ContentDocument> {
        Ok(self.document.clone())
    }
}

pub struct ContentStore {
    source: Arc<dyn ContentSource>,
    ttl: Duration,
    cached: RwLock<Option<CacheEntry<Arc<ContentDocument>>>>,
    /// Last successfully loaded document; served when a reload fails.
    last_good: RwLock<Option<Arc<ContentDocument>>>,
}

impl ContentStore {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self::with_ttl(source, CONTENT_TTL)
    }

    pub fn with_ttl(source: Arc<dyn ContentSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
            last_good: RwLock::new(None),
        }
    }

    /// Current document, reloading from the source once the TTL elapsed or
    /// after an invalidation.
    pub async fn get_document(&self) -> Arc<ContentDocument> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref().filter(|e| e.is_fresh(self.ttl)) {
                return entry.value.clone();
            }
        }

        let document = match self.source.load().await {
            Ok(doc) => {
                let doc = Arc::new(doc);
                *self.last_good.write().await = Some(doc.clone());
                doc
            }
            Err(e) => {
                error!(error = %e, "Content reload failed");
                match self.last_good.read().await.clone() {
                    Some(doc) => {
                        warn!("Serving last loaded content document");
                        doc
                    }
                    None => Arc::new(ContentDocument::default()),
                }
            }
        };

        *self.cached.write().await = Some(CacheEntry::new(document.clone()));
        document
    }

    /// Force the next read to reload.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FlakySource {
        loads: AtomicUsize,
        failing: AtomicBool,
    }

    impl FlakySource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
            })
        }
    }

    #[async_trait::async_trait]
    impl ContentSource for FlakySource {
        async fn load(&self) -> Result<ContentDocument> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(BotError::Storage("disk gone".to_string()));
            }
            Ok(ContentDocument {
                welcome_text: Some(format!("v{}", n)),
                ..ContentDocument::default()
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_serves_cached_within_ttl() {
        let source = FlakySource::new();
        let store = ContentStore::new(source.clone());

        assert_eq!(store.get_document().await.welcome_text.as_deref(), Some("v1"));
        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert_eq!(store.get_document().await.welcome_text.as_deref(), Some("v1"));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(store.get_document().await.welcome_text.as_deref(), Some("v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_reload() {
        let source = FlakySource::new();
        let store = ContentStore::new(source.clone());

        store.get_document().await;
        store.invalidate().await;
        assert_eq!(store.get_document().await.welcome_text.as_deref(), Some("v2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reload_keeps_last_document() {
        let source = FlakySource::new();
        let store = ContentStore::new(source.clone());

        store.get_document().await;
        source.failing.store(true, Ordering::SeqCst);
        store.invalidate().await;

        assert_eq!(store.get_document().await.welcome_text.as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_failed_first_load_yields_empty_document() {
        let source = FlakySource::new();
        source.failing.store(true, Ordering::SeqCst);
        let store = ContentStore::new(source);

        assert_eq!(*store.get_document().await, ContentDocument::default());
    }

    #[tokio::test]
    async fn test_json_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        tokio::fs::write(&path, r#"{"community_link": "https://t.me/c"}"#)
            .await
            .unwrap();

        let doc = JsonFileContentSource::new(&path).load().await.unwrap();
        assert_eq!(doc.community_link.as_deref(), Some("https://t.me/c"));
    }
}
