//! User-curated ticker folders.
//!
//! In-memory state is the source of truth. Every mutation is mirrored to
//! storage right away; a failed write is logged and the in-memory change
//! stands.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{write_json_best_effort, KvStore, WATCHLIST_FOLDERS_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistFolder {
    pub id: String,
    pub name: String,
    pub tickers: Vec<String>,
    #[serde(default)]
    pub is_expanded: bool,
}

/// Upper-case and trim; `None` for blank input.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let t = raw.trim().to_ascii_uppercase();
    (!t.is_empty()).then_some(t)
}

/// Normalize and drop repeats, keeping first occurrence order.
fn unique_tickers<I, S>(tickers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tickers
        .into_iter()
        .filter_map(|t| normalize_ticker(t.as_ref()))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Parse the stored folder list, skipping entries without id/name/tickers.
pub fn parse_folders(raw: &str) -> Vec<WatchlistFolder> {
    let entries: Vec<Value> = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "feed::watchlist", "folder list unreadable: {e}");
            return Vec::new();
        }
    };

    let total = entries.len();
    let folders: Vec<WatchlistFolder> = entries
        .into_iter()
        .filter_map(|v| serde_json::from_value::<WatchlistFolder>(v).ok())
        .map(|mut f| {
            f.tickers = unique_tickers(&f.tickers);
            f
        })
        .collect();

    if folders.len() < total {
        tracing::warn!(
            target: "feed::watchlist",
            dropped = total - folders.len(),
            "malformed folder entries skipped"
        );
    }
    folders
}

pub struct WatchlistStore {
    store: Arc<dyn KvStore>,
    folders: Vec<WatchlistFolder>,
    active: Option<String>,
}

impl WatchlistStore {
    /// Hydrate from storage; the first folder (if any) becomes active.
    pub async fn load(store: Arc<dyn KvStore>) -> Self {
        let folders = match store.get(WATCHLIST_FOLDERS_KEY).await {
            Ok(Some(raw)) => parse_folders(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(target: "feed::watchlist", "folder read failed: {e:#}");
                Vec::new()
            }
        };
        let active = folders.first().map(|f| f.id.clone());
        tracing::debug!(target: "feed::watchlist", folders = folders.len(), "watchlist hydrated");
        Self {
            store,
            folders,
            active,
        }
    }

    pub fn folders(&self) -> &[WatchlistFolder] {
        &self.folders
    }

    pub fn folder(&self, id: &str) -> Option<&WatchlistFolder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Point the active folder at `id`; unknown ids are ignored.
    pub fn set_active(&mut self, id: &str) -> bool {
        if self.folder(id).is_some() {
            self.active = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Union of every folder's tickers (upper-case).
    pub fn ticker_set(&self) -> HashSet<String> {
        self.folders
            .iter()
            .flat_map(|f| f.tickers.iter().cloned())
            .collect()
    }

    /// New empty folder; returns its id.
    pub async fn create(&mut self, name: &str, activate: bool) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.folders.push(WatchlistFolder {
            id: id.clone(),
            name: name.trim().to_string(),
            tickers: Vec::new(),
            is_expanded: true,
        });
        if activate || self.active.is_none() {
            self.active = Some(id.clone());
        }
        self.persist().await;
        id
    }

    /// Remove a folder. If it was active, the folder that followed it
    /// becomes active (wrapping to the first), or none when empty.
    pub async fn delete(&mut self, id: &str) -> bool {
        let Some(pos) = self.folders.iter().position(|f| f.id == id) else {
            return false;
        };
        self.folders.remove(pos);

        if self.active.as_deref() == Some(id) {
            self.active = self
                .folders
                .get(pos)
                .or_else(|| self.folders.first())
                .map(|f| f.id.clone());
        }
        self.persist().await;
        true
    }

    pub async fn rename(&mut self, id: &str, name: &str) -> bool {
        let Some(f) = self.folder_mut(id) else {
            return false;
        };
        f.name = name.trim().to_string();
        self.persist().await;
        true
    }

    /// Flip the expansion flag; returns the new value.
    pub async fn toggle_expansion(&mut self, id: &str) -> Option<bool> {
        let f = self.folder_mut(id)?;
        f.is_expanded = !f.is_expanded;
        let now = f.is_expanded;
        self.persist().await;
        Some(now)
    }

    /// Add a ticker; `false` when the folder is unknown, the ticker is blank,
    /// or it is already present.
    pub async fn add_ticker(&mut self, folder_id: &str, ticker: &str) -> bool {
        let Some(t) = normalize_ticker(ticker) else {
            return false;
        };
        let Some(f) = self.folder_mut(folder_id) else {
            return false;
        };
        if f.tickers.contains(&t) {
            return false;
        }
        f.tickers.push(t);
        self.persist().await;
        true
    }

    pub async fn remove_ticker(&mut self, folder_id: &str, ticker: &str) -> bool {
        let Some(t) = normalize_ticker(ticker) else {
            return false;
        };
        let Some(f) = self.folder_mut(folder_id) else {
            return false;
        };
        let before = f.tickers.len();
        f.tickers.retain(|x| *x != t);
        if f.tickers.len() == before {
            return false;
        }
        self.persist().await;
        true
    }

    /// Replace the ticker list wholesale (repeats are collapsed).
    pub async fn reorder_tickers(&mut self, folder_id: &str, order: Vec<String>) -> bool {
        let Some(f) = self.folder_mut(folder_id) else {
            return false;
        };
        f.tickers = unique_tickers(order);
        self.persist().await;
        true
    }

    fn folder_mut(&mut self, id: &str) -> Option<&mut WatchlistFolder> {
        self.folders.iter_mut().find(|f| f.id == id)
    }

    async fn persist(&self) {
        write_json_best_effort(self.store.as_ref(), WATCHLIST_FOLDERS_KEY, &self.folders).await;
    }
}
