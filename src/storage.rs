//! Key/value persistence contract.
//!
//! Callers treat storage as best-effort: reads that fail or return garbage
//! fall back to defaults, writes that fail are logged and skipped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

pub const NOTIFICATION_PREFS_KEY: &str = "@feed/notification-preferences";
pub const BANNER_PREFS_KEY: &str = "@feed/banner-preferences";
pub const WATCHLIST_FOLDERS_KEY: &str = "@feed/watchlist-folders";

#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store. Also the test double for the file store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded store, handy for hydration tests.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            inner: Mutex::new(map),
        }
    }

    fn map(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map()?.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait::async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

/// Read `key` as JSON. Absent, unreadable or malformed values yield
/// `T::default()`; a malformed value is also removed from the store.
pub async fn read_json_or_default<T>(store: &dyn KvStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!(target: "feed::storage", key, "read failed, using defaults: {e:#}");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "feed::storage", key, "corrupt value, clearing: {e}");
            if let Err(e) = store.remove(key).await {
                tracing::warn!(target: "feed::storage", key, "clear failed: {e:#}");
            }
            T::default()
        }
    }
}

/// Serialize and write `value`; failures are logged and counted, never returned.
pub async fn write_json_best_effort<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) {
    let body = match serde_json::to_string(value) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(target: "feed::storage", key, "serialize failed: {e}");
            counter!("storage_write_errors_total").increment(1);
            return;
        }
    };
    if let Err(e) = store.set(key, &body).await {
        tracing::warn!(target: "feed::storage", key, "write skipped: {e:#}");
        counter!("storage_write_errors_total").increment(1);
    }
}
