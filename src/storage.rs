//! Persistence for users, premium ids and feedback
//!
//! The core only relies on list/append/upsert semantics; read-through caching
//! is done by callers. JSON files on disk are the default backend.

use crate::error::BotError;
use crate::models::{FeedbackRecord, UserId, UserRecord};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

pub const CONTENT_FILE: &str = "data.json";
pub const PREMIUM_FILE: &str = "premium_users.json";
pub const USERS_FILE: &str = "users.json";
pub const FEEDBACK_FILE: &str = "feedback.json";
pub const BACKUP_DIR: &str = "backups";

/// Trait for user/premium/feedback persistence
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn list_users(&self) -> Result<Vec<UserRecord>>;
    /// Insert the user if unknown. Returns true when a record was added.
    async fn upsert_user(&self, user: UserRecord) -> Result<bool>;
    async fn list_premium(&self) -> Result<Vec<UserId>>;
    async fn append_feedback(&self, feedback: FeedbackRecord) -> Result<()>;
}

// =============================
// In-memory backend
// =============================

/// In-memory store for development and tests
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<Vec<UserRecord>>>,
    premium: Arc<RwLock<Vec<UserId>>>,
    feedback: Arc<RwLock<Vec<FeedbackRecord>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_premium(premium: Vec<UserId>) -> Self {
        Self {
            premium: Arc::new(RwLock::new(premium)),
            ..Self::default()
        }
    }

    pub async fn set_premium(&self, premium: Vec<UserId>) {
        *self.premium.write().await = premium;
    }

    pub async fn feedback(&self) -> Vec<FeedbackRecord> {
        self.feedback.read().await.clone()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.users.read().await.clone())
    }

    async fn upsert_user(&self, user: UserRecord) -> Result<bool> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.id == user.id) {
            return Ok(false);
        }
        users.push(user);
        Ok(true)
    }

    async fn list_premium(&self) -> Result<Vec<UserId>> {
        Ok(self.premium.read().await.clone())
    }

    async fn append_feedback(&self, feedback: FeedbackRecord) -> Result<()> {
        self.feedback.write().await.push(feedback);
        Ok(())
    }
}

// =============================
// JSON file backend
// =============================

pub struct JsonFileStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on the files.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store rooted at `root`, creating missing files and the backup
    /// directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        ensure_file(&root.join(CONTENT_FILE), "{}").await?;
        ensure_file(&root.join(PREMIUM_FILE), "[]").await?;
        ensure_file(&root.join(USERS_FILE), "[]").await?;
        ensure_file(&root.join(FEEDBACK_FILE), "[]").await?;

        let backups = root.join(BACKUP_DIR);
        if tokio::fs::metadata(&backups).await.is_err() {
            tokio::fs::create_dir_all(&backups).await?;
            info!(path = %backups.display(), "Created backup directory");
        }

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content_path(&self) -> PathBuf {
        self.root.join(CONTENT_FILE)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR)
    }

    async fn load<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.root.join(file);
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            BotError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            BotError::Storage(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    async fn save<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.root.join(file);
        let raw = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&path, raw).await.map_err(|e| {
            BotError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

async fn ensure_file(path: &Path, default_content: &str) -> Result<()> {
    if tokio::fs::metadata(path).await.is_err() {
        tokio::fs::write(path, default_content).await?;
        info!(path = %path.display(), "Created file");
    }
    Ok(())
}

#[async_trait::async_trait]
impl UserStore for JsonFileStore {
    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        self.load(USERS_FILE).await
    }

    async fn upsert_user(&self, user: UserRecord) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut users: Vec<UserRecord> = self.load(USERS_FILE).await?;
        if users.iter().any(|u| u.id == user.id) {
            return Ok(false);
        }

        info!(
            user_id = user.id,
            first_name = user.first_name.as_deref().unwrap_or("N/A"),
            "Registered new user"
        );
        users.push(user);
        self.save(USERS_FILE, &users).await?;
        Ok(true)
    }

    async fn list_premium(&self) -> Result<Vec<UserId>> {
        self.load(PREMIUM_FILE).await
    }

    async fn append_feedback(&self, feedback: FeedbackRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut all: Vec<FeedbackRecord> = self.load(FEEDBACK_FILE).await?;
        all.push(feedback);
        self.save(FEEDBACK_FILE, &all).await
    }
}

// =============================
// Backups
// =============================

/// Copy users, premium and content files into the backup directory with a
/// timestamp suffix. Returns the number of files copied.
pub async fn run_backup(root: &Path) -> Result<usize> {
    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string();
    let dir = root.join(BACKUP_DIR);
    tokio::fs::create_dir_all(&dir).await?;

    let mut copied = 0;
    for name in [USERS_FILE, PREMIUM_FILE, CONTENT_FILE] {
        let src = root.join(name);
        if tokio::fs::metadata(&src).await.is_ok() {
            let dest = dir.join(format!("{}.{}.bak", name, stamp));
            tokio::fs::copy(&src, &dest).await?;
            copied += 1;
        }
    }

    info!(stamp = %stamp, copied, "Backup completed");
    Ok(copied)
}

/// Modification time of the newest `.bak` file, if any.
pub async fn latest_backup(root: &Path) -> Result<Option<DateTime<Utc>>> {
    let dir = root.join(BACKUP_DIR);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<DateTime<Utc>> = None;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_name().to_string_lossy().ends_with(".bak") {
            continue;
        }
        let modified: DateTime<Utc> = entry.metadata().await?.modified()?.into();
        if newest.map_or(true, |n| modified > n) {
            newest = Some(modified);
        }
    }

    Ok(newest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sender;

    #[tokio::test]
    async fn test_open_bootstraps_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        assert!(store.list_users().await.unwrap().is_empty());
        assert!(store.list_premium().await.unwrap().is_empty());
        assert!(store.backup_dir().is_dir());
        assert!(store.content_path().is_file());
    }

    #[tokio::test]
    async fn test_upsert_user_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let user = UserRecord::from_sender(&Sender::new(10));

        assert!(store.upsert_user(user.clone()).await.unwrap());
        assert!(!store.upsert_user(user).await.unwrap());
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_feedback_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        let sender = Sender::new(3);

        store
            .append_feedback(FeedbackRecord::new(&sender, "first"))
            .await
            .unwrap();
        store
            .append_feedback(FeedbackRecord::new(&sender, "second"))
            .await
            .unwrap();

        let raw = tokio::fs::read_to_string(dir.path().join(FEEDBACK_FILE))
            .await
            .unwrap();
        let all: Vec<FeedbackRecord> = serde_json::from_str(&raw).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].message, "second");
    }

    #[tokio::test]
    async fn test_premium_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join(PREMIUM_FILE), "[11, 12]")
            .await
            .unwrap();

        assert_eq!(store.list_premium().await.unwrap(), vec![11, 12]);
    }

    #[tokio::test]
    async fn test_backup_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        JsonFileStore::open(dir.path()).await.unwrap();

        assert_eq!(latest_backup(dir.path()).await.unwrap(), None);
        let copied = tokio_test::assert_ok!(run_backup(dir.path()).await);
        assert_eq!(copied, 3);
        assert!(latest_backup(dir.path()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join(USERS_FILE), "not json")
            .await
            .unwrap();

        assert!(matches!(store.list_users().await, Err(BotError::Storage(_))));
    }
}
