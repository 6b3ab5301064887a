//! User delivery preferences.
//!
//! Two independent records, each under its own storage key:
//! - [`NotificationPreferences`]: impact threshold + per-category toggles
//!   for the persistent notification path;
//! - [`BannerPreferences`]: toggles for transient in-app banners plus a
//!   `highImpactOnly` switch.
//!
//! Loaded once through [`PreferencesStore::load`]; every setter re-persists
//! the changed record immediately.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classify::Category;
use crate::storage::{
    read_json_or_default, write_json_best_effort, KvStore, BANNER_PREFS_KEY,
    NOTIFICATION_PREFS_KEY,
};

/// Minimum impact delivered through notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    /// High only.
    #[default]
    High,
    /// High or Medium.
    MediumHigh,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    #[serde(default)]
    pub impact_level: ImpactLevel,
    #[serde(default = "yes")]
    pub critical: bool,
    #[serde(default = "yes")]
    pub economic: bool,
    #[serde(default = "yes")]
    pub earnings: bool,
    #[serde(default = "yes")]
    pub watchlist: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            impact_level: ImpactLevel::High,
            critical: true,
            economic: true,
            earnings: true,
            watchlist: true,
        }
    }
}

impl NotificationPreferences {
    pub fn category_enabled(&self, c: Category) -> bool {
        match c {
            Category::Critical => self.critical,
            Category::Economic => self.economic,
            Category::Earnings => self.earnings,
            Category::Watchlist => self.watchlist,
        }
    }

    pub fn set_category(&mut self, c: Category, enabled: bool) {
        match c {
            Category::Critical => self.critical = enabled,
            Category::Economic => self.economic = enabled,
            Category::Earnings => self.earnings = enabled,
            Category::Watchlist => self.watchlist = enabled,
        }
    }
}

/// Toggle names of the in-app banner record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerToggle {
    Critical,
    Earnings,
    Cpi,
    Fed,
    Watchlist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerPreferences {
    #[serde(default = "yes")]
    pub critical: bool,
    #[serde(default = "yes")]
    pub earnings: bool,
    #[serde(default = "yes")]
    pub cpi: bool,
    #[serde(default = "yes")]
    pub fed: bool,
    #[serde(default = "yes")]
    pub watchlist: bool,
    #[serde(default)]
    pub high_impact_only: bool,
}

impl Default for BannerPreferences {
    fn default() -> Self {
        Self {
            critical: true,
            earnings: true,
            cpi: true,
            fed: true,
            watchlist: true,
            high_impact_only: false,
        }
    }
}

impl BannerPreferences {
    pub fn toggle(&self, t: BannerToggle) -> bool {
        match t {
            BannerToggle::Critical => self.critical,
            BannerToggle::Earnings => self.earnings,
            BannerToggle::Cpi => self.cpi,
            BannerToggle::Fed => self.fed,
            BannerToggle::Watchlist => self.watchlist,
        }
    }

    pub fn set_toggle(&mut self, t: BannerToggle, enabled: bool) {
        match t {
            BannerToggle::Critical => self.critical = enabled,
            BannerToggle::Earnings => self.earnings = enabled,
            BannerToggle::Cpi => self.cpi = enabled,
            BannerToggle::Fed => self.fed = enabled,
            BannerToggle::Watchlist => self.watchlist = enabled,
        }
    }
}

/// Read the notification record straight from storage.
pub async fn load_notification_preferences(store: &dyn KvStore) -> NotificationPreferences {
    read_json_or_default(store, NOTIFICATION_PREFS_KEY).await
}

/// Read the banner record straight from storage.
pub async fn load_banner_preferences(store: &dyn KvStore) -> BannerPreferences {
    read_json_or_default(store, BANNER_PREFS_KEY).await
}

/// Cached preferences plus the store they persist to.
pub struct PreferencesStore {
    store: Arc<dyn KvStore>,
    notification: NotificationPreferences,
    banner: BannerPreferences,
}

impl PreferencesStore {
    /// Hydrate both records. Never fails: bad or missing data means defaults.
    pub async fn load(store: Arc<dyn KvStore>) -> Self {
        let notification = load_notification_preferences(store.as_ref()).await;
        let banner = load_banner_preferences(store.as_ref()).await;
        tracing::debug!(
            target: "feed::prefs",
            ?notification,
            ?banner,
            "preferences hydrated"
        );
        Self {
            store,
            notification,
            banner,
        }
    }

    /// Re-read both records from storage.
    pub async fn reload(&mut self) {
        self.notification = load_notification_preferences(self.store.as_ref()).await;
        self.banner = load_banner_preferences(self.store.as_ref()).await;
    }

    pub fn notification(&self) -> NotificationPreferences {
        self.notification
    }

    pub fn banner(&self) -> BannerPreferences {
        self.banner
    }

    pub async fn set_impact_level(&mut self, level: ImpactLevel) {
        self.notification.impact_level = level;
        self.persist_notification().await;
    }

    pub async fn set_category(&mut self, category: Category, enabled: bool) {
        self.notification.set_category(category, enabled);
        self.persist_notification().await;
    }

    pub async fn replace_notification(&mut self, prefs: NotificationPreferences) {
        self.notification = prefs;
        self.persist_notification().await;
    }

    pub async fn set_banner_toggle(&mut self, toggle: BannerToggle, enabled: bool) {
        self.banner.set_toggle(toggle, enabled);
        self.persist_banner().await;
    }

    pub async fn set_high_impact_only(&mut self, on: bool) {
        self.banner.high_impact_only = on;
        self.persist_banner().await;
    }

    pub async fn replace_banner(&mut self, prefs: BannerPreferences) {
        self.banner = prefs;
        self.persist_banner().await;
    }

    async fn persist_notification(&self) {
        write_json_best_effort(self.store.as_ref(), NOTIFICATION_PREFS_KEY, &self.notification)
            .await;
    }

    async fn persist_banner(&self) {
        write_json_best_effort(self.store.as_ref(), BANNER_PREFS_KEY, &self.banner).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn wire_format_matches_stored_records() {
        let p: NotificationPreferences =
            serde_json::from_str(r#"{"impactLevel":"MEDIUM_HIGH","earnings":false}"#).unwrap();
        assert_eq!(p.impact_level, ImpactLevel::MediumHigh);
        assert!(!p.earnings);
        assert!(p.critical && p.economic && p.watchlist);

        let b: BannerPreferences = serde_json::from_str(r#"{"highImpactOnly":true}"#).unwrap();
        assert!(b.high_impact_only && b.cpi && b.fed);
    }

    #[tokio::test]
    async fn setters_persist_immediately() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let mut prefs = PreferencesStore::load(store.clone()).await;
        assert_eq!(prefs.notification(), NotificationPreferences::default());

        prefs.set_impact_level(ImpactLevel::MediumHigh).await;
        prefs.set_category(Category::Watchlist, false).await;
        prefs.set_high_impact_only(true).await;

        let again = PreferencesStore::load(store).await;
        assert_eq!(again.notification().impact_level, ImpactLevel::MediumHigh);
        assert!(!again.notification().watchlist);
        assert!(again.banner().high_impact_only);
    }

    #[tokio::test]
    async fn corrupt_record_falls_back_to_defaults() {
        let store = Arc::new(MemoryStore::with_entries([(
            NOTIFICATION_PREFS_KEY,
            r#"{"impactLevel": 7}"#,
        )]));
        let prefs = PreferencesStore::load(store.clone()).await;
        assert_eq!(prefs.notification(), NotificationPreferences::default());
        assert_eq!(store.get(NOTIFICATION_PREFS_KEY).await.unwrap(), None);
    }
}
