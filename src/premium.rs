//! Premium gating and bundle delivery

use crate::cache::CacheEntry;
use crate::error::BotError;
use crate::models::{PremiumLinks, UserId};
use crate::storage::UserStore;
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::error;

pub const PREMIUM_LIST_TTL: Duration = Duration::from_secs(30);

/// True iff the user is the administrator or appears in the premium list.
pub fn is_premium_user(user_id: UserId, admin_id: UserId, premium: &[UserId]) -> bool {
    user_id == admin_id || premium.contains(&user_id)
}

/// Premium lookups through a short-lived cache of the store's premium list.
pub struct PremiumDirectory {
    admin_id: UserId,
    store: Arc<dyn UserStore>,
    ttl: Duration,
    cached: RwLock<Option<CacheEntry<Arc<Vec<UserId>>>>>,
}

impl PremiumDirectory {
    pub fn new(admin_id: UserId, store: Arc<dyn UserStore>) -> Self {
        Self {
            admin_id,
            store,
            ttl: PREMIUM_LIST_TTL,
            cached: RwLock::new(None),
        }
    }

    /// Premium ids, re-read from the store once the cache expired. A failed
    /// read yields an empty list and is not cached.
    pub async fn premium_users(&self) -> Arc<Vec<UserId>> {
        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref().filter(|e| e.is_fresh(self.ttl)) {
                return entry.value.clone();
            }
        }

        match self.store.list_premium().await {
            Ok(users) => {
                let users = Arc::new(users);
                *self.cached.write().await = Some(CacheEntry::new(users.clone()));
                users
            }
            Err(e) => {
                error!(error = %e, "Failed to load premium users");
                Arc::new(Vec::new())
            }
        }
    }

    pub async fn is_premium(&self, user_id: UserId) -> bool {
        if user_id == self.admin_id {
            return true;
        }
        let premium = self.premium_users().await;
        is_premium_user(user_id, self.admin_id, &premium)
    }
}

//
// ================= Products =================
//

/// Downloadable bundles, addressed by their `zip_*` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PremiumProduct {
    Tools,
    Portfolios,
    Lists,
    Complete,
}

impl PremiumProduct {
    pub const ALL: [PremiumProduct; 4] = [
        PremiumProduct::Tools,
        PremiumProduct::Portfolios,
        PremiumProduct::Lists,
        PremiumProduct::Complete,
    ];

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.token() == token)
    }

    pub fn token(self) -> &'static str {
        match self {
            PremiumProduct::Tools => "zip_strumenti",
            PremiumProduct::Portfolios => "zip_portafogli",
            PremiumProduct::Lists => "zip_liste",
            PremiumProduct::Complete => "zip_completo",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            PremiumProduct::Tools => "Strumenti Pro MML.zip",
            PremiumProduct::Portfolios => "Portafogli Modello MML.zip",
            PremiumProduct::Lists => "Liste Database MML.zip",
            PremiumProduct::Complete => "Premium MML 💎.zip",
        }
    }

    pub fn purchase_link(self, links: &PremiumLinks) -> Option<&str> {
        match self {
            PremiumProduct::Tools => links.strumenti.as_deref(),
            PremiumProduct::Portfolios => links.portafogli.as_deref(),
            PremiumProduct::Lists => links.liste.as_deref(),
            PremiumProduct::Complete => links.completo.as_deref(),
        }
    }
}

//
// ================= Delivery =================
//

/// Binary payload handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPayload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Supplies bundle payloads for premium products.
#[async_trait::async_trait]
pub trait DocumentDelivery: Send + Sync {
    /// None when the bundle does not exist.
    async fn locate(&self, product: PremiumProduct) -> Result<Option<DocumentPayload>>;
}

/// Bundles stored as files in a directory, named by `PremiumProduct::file_name`.
pub struct DirectoryDelivery {
    root: PathBuf,
}

impl DirectoryDelivery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl DocumentDelivery for DirectoryDelivery {
    async fn locate(&self, product: PremiumProduct) -> Result<Option<DocumentPayload>> {
        let path = self.root.join(product.file_name());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(DocumentPayload {
                file_name: product.file_name().to_string(),
                bytes,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BotError::Delivery(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryUserStore;

    #[test]
    fn test_is_premium_user_branches() {
        assert!(is_premium_user(1, 1, &[]));
        assert!(is_premium_user(5, 1, &[4, 5]));
        assert!(!is_premium_user(6, 1, &[4, 5]));
        assert!(!is_premium_user(6, 1, &[]));
    }

    #[tokio::test]
    async fn test_directory_checks_admin_and_list() {
        let store = Arc::new(InMemoryUserStore::with_premium(vec![20]));
        let directory = PremiumDirectory::new(1, store);

        assert!(directory.is_premium(1).await);
        assert!(directory.is_premium(20).await);
        assert!(!directory.is_premium(21).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_premium_list_is_cached() {
        let store = Arc::new(InMemoryUserStore::new());
        let directory = PremiumDirectory::new(1, store.clone());

        assert!(!directory.is_premium(9).await);
        store.set_premium(vec![9]).await;
        assert!(!directory.is_premium(9).await);

        tokio::time::advance(PREMIUM_LIST_TTL).await;
        assert!(directory.is_premium(9).await);
    }

    #[test]
    fn test_product_tokens_round_trip() {
        for product in PremiumProduct::ALL {
            assert_eq!(PremiumProduct::from_token(product.token()), Some(product));
        }
        assert_eq!(PremiumProduct::from_token("zip_other"), None);
    }

    #[tokio::test]
    async fn test_directory_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = DirectoryDelivery::new(dir.path());

        assert_eq!(delivery.locate(PremiumProduct::Lists).await.unwrap(), None);

        tokio::fs::write(dir.path().join(PremiumProduct::Lists.file_name()), b"zip")
            .await
            .unwrap();
        let payload = delivery.locate(PremiumProduct::Lists).await.unwrap().unwrap();
        assert_eq!(payload.bytes, b"zip".to_vec());
    }
}
