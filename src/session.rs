//! Per-client routing session.
//!
//! Owns everything that used to be ambient state: the watchlist, cached
//! preferences, the bounded notification and critical-alert lists and the
//! banner queue. Scoring, dedup and classification stay pure; the session
//! only wires their results to the delivery surfaces.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::banner::{
    BannerCard, BannerEvent, BannerQueue, TimerId, TimerScheduler, TokioScheduler,
};
use crate::classify::{Category, Entity};
use crate::config::{PipelineConfig, RoutingLimits};
use crate::dedup::{dedupe_with_stats, DedupStats};
use crate::gate::{self, check_banner, check_notification};
use crate::model::{Alert, Impact, Item};
use crate::preferences::PreferencesStore;
use crate::scoring::{score_all, ScoreWeights};
use crate::storage::KvStore;
use crate::watchlist::WatchlistStore;

/// Row in the persistent notification list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEntry {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub impact: Option<Impact>,
    pub score: f64,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BannerAdmission {
    pub id: String,
    pub admitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEntry {
    pub id: String,
    pub reason: String,
}

/// Outcome of one routing pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteReport {
    /// Item ids after ranking and dedup, in ranked order. Empty for alerts.
    pub ranked: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<DedupStats>,
    pub notified: Vec<String>,
    pub critical: Vec<String>,
    pub rejected: Vec<RejectedEntry>,
    pub banners: Vec<BannerAdmission>,
    pub events: Vec<BannerEvent>,
}

pub struct FeedSession<S: TimerScheduler> {
    store: Arc<dyn KvStore>,
    weights: ScoreWeights,
    limits: RoutingLimits,
    prefs: PreferencesStore,
    watchlist: WatchlistStore,
    notifications: VecDeque<NotificationEntry>,
    critical: VecDeque<Alert>,
    banner: BannerQueue<S>,
}

impl<S: TimerScheduler> FeedSession<S> {
    /// Hydrate preferences and watchlist from `store`.
    pub async fn open(store: Arc<dyn KvStore>, cfg: &PipelineConfig, scheduler: S) -> Self {
        crate::metrics::ensure_described();
        let prefs = PreferencesStore::load(store.clone()).await;
        let watchlist = WatchlistStore::load(store.clone()).await;
        tracing::info!(
            target: "feed::route",
            folders = watchlist.folders().len(),
            "session hydrated"
        );
        Self {
            store,
            weights: cfg.scoring,
            limits: cfg.routing,
            prefs,
            watchlist,
            notifications: VecDeque::new(),
            critical: VecDeque::new(),
            banner: BannerQueue::new(cfg.banner, scheduler),
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn preferences(&self) -> &PreferencesStore {
        &self.prefs
    }

    pub fn preferences_mut(&mut self) -> &mut PreferencesStore {
        &mut self.prefs
    }

    pub fn watchlist(&self) -> &WatchlistStore {
        &self.watchlist
    }

    pub fn watchlist_mut(&mut self) -> &mut WatchlistStore {
        &mut self.watchlist
    }

    pub fn banner(&self) -> &BannerQueue<S> {
        &self.banner
    }

    pub fn banner_mut(&mut self) -> &mut BannerQueue<S> {
        &mut self.banner
    }

    /// Newest first.
    pub fn notifications(&self) -> impl Iterator<Item = &NotificationEntry> {
        self.notifications.iter()
    }

    /// Newest first.
    pub fn critical_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.critical.iter()
    }

    /// Score against the current watchlist, then dedupe. `items` is not touched.
    pub fn rank_feed(&self, items: &[Item], now: DateTime<Utc>) -> Vec<Item> {
        self.rank_with_stats(items, now).0
    }

    fn rank_with_stats(&self, items: &[Item], now: DateTime<Utc>) -> (Vec<Item>, DedupStats) {
        let watch = self.watchlist.ticker_set();
        let scored = score_all(items, &watch, now, &self.weights);
        let (ranked, stats) = dedupe_with_stats(&scored);
        tracing::debug!(
            target: "feed::route",
            input = items.len(),
            kept = stats.kept,
            "feed ranked"
        );
        (ranked, stats)
    }

    /// Rank, classify and gate a batch of items. Accepted items land in the
    /// notification list; banner-admitted ones are queued as banners.
    pub fn route_items(&mut self, items: &[Item], now: DateTime<Utc>) -> RouteReport {
        let (ranked, stats) = self.rank_with_stats(items, now);
        let watch = self.watchlist.ticker_set();
        let nprefs = self.prefs.notification();
        let bprefs = self.prefs.banner();

        let mut report = RouteReport {
            ranked: ranked.iter().map(|i| i.id.clone()).collect(),
            dedup: Some(stats),
            ..Default::default()
        };
        let mut accepted: Vec<NotificationEntry> = Vec::new();
        let mut cards = Vec::new();

        for item in &ranked {
            let entity = Entity::Item(item);
            match check_notification(entity, &nprefs, &watch) {
                Ok(category) => {
                    report.notified.push(item.id.clone());
                    accepted.push(NotificationEntry {
                        id: item.id.clone(),
                        title: item.title_text().unwrap_or_default().to_string(),
                        category,
                        impact: item.impact(),
                        score: item.rank_score(),
                        published_at: item.published_at,
                    });
                }
                Err(r) => reject(&mut report, entity, r),
            }

            let admission = check_banner(entity, &bprefs, &watch);
            if admission.is_ok() {
                if let Some(card) = BannerCard::from_item(item) {
                    cards.push(card);
                }
            }
            report.banners.push(admission_of(entity, admission));
        }

        counter!("route_notifications_total").increment(accepted.len() as u64);
        // Oldest first, so the newest ends up at the front.
        accepted.sort_by_key(|e| e.published_at);
        for entry in accepted {
            push_front_bounded(&mut self.notifications, entry, self.limits.notifications, |e| {
                &e.id
            });
        }

        report.events = self.banner.enqueue(cards);
        tracing::info!(
            target: "feed::route",
            ranked = report.ranked.len(),
            notified = report.notified.len(),
            rejected = report.rejected.len(),
            "items routed"
        );
        report
    }

    /// Classify and gate alerts. Accepted ones land in the critical-alerts
    /// list; banner-admitted ones are queued as banners.
    pub fn route_alerts(&mut self, alerts: &[Alert]) -> RouteReport {
        let watch = self.watchlist.ticker_set();
        let nprefs = self.prefs.notification();
        let bprefs = self.prefs.banner();

        let mut report = RouteReport::default();
        let mut accepted: Vec<&Alert> = Vec::new();
        let mut cards = Vec::new();

        for alert in alerts {
            let entity = Entity::Alert(alert);
            match check_notification(entity, &nprefs, &watch) {
                Ok(_) => {
                    report.critical.push(alert.id.clone());
                    accepted.push(alert);
                }
                Err(r) => reject(&mut report, entity, r),
            }

            let admission = check_banner(entity, &bprefs, &watch);
            if admission.is_ok() {
                cards.push(BannerCard::from(alert));
            }
            report.banners.push(admission_of(entity, admission));
        }

        counter!("route_critical_total").increment(accepted.len() as u64);
        accepted.sort_by_key(|a| a.published_at);
        for alert in accepted {
            push_front_bounded(&mut self.critical, alert.clone(), self.limits.critical, |a| {
                &a.id
            });
        }

        report.events = self.banner.enqueue(cards);
        tracing::info!(
            target: "feed::route",
            alerts = alerts.len(),
            critical = report.critical.len(),
            rejected = report.rejected.len(),
            "alerts routed"
        );
        report
    }

    /// Notification decision against preferences freshly read from storage.
    pub async fn should_notify(&self, entity: Entity<'_>) -> bool {
        gate::should_notify(self.store.as_ref(), entity, &self.watchlist.ticker_set()).await
    }

    /// Banner decision against preferences freshly read from storage.
    pub async fn should_show_banner(&self, entity: Entity<'_>) -> bool {
        gate::should_show_banner(self.store.as_ref(), entity, &self.watchlist.ticker_set()).await
    }

    /// Forward a fired timer to the banner queue.
    pub fn on_timer(&mut self, id: TimerId) -> Vec<BannerEvent> {
        self.banner.on_timer(id)
    }

    /// Clear session-scoped state. Persisted data is left alone.
    pub fn reset(&mut self) {
        self.notifications.clear();
        self.critical.clear();
        self.banner.reset();
        tracing::info!(target: "feed::route", "session reset");
    }
}

fn reject(report: &mut RouteReport, entity: Entity<'_>, r: gate::Rejection) {
    counter!("route_rejected_total").increment(1);
    tracing::debug!(target: "feed::route", id = entity.id(), reason = %r, "delivery rejected");
    report.rejected.push(RejectedEntry {
        id: entity.id().to_string(),
        reason: r.to_string(),
    });
}

fn admission_of(entity: Entity<'_>, res: Result<Category, gate::Rejection>) -> BannerAdmission {
    BannerAdmission {
        id: entity.id().to_string(),
        admitted: res.is_ok(),
        reason: res.err().map(|r| r.to_string()),
    }
}

/// Insert at the front, dropping any older copy of the same id, then cap.
fn push_front_bounded<T, F>(list: &mut VecDeque<T>, value: T, cap: usize, id: F)
where
    F: Fn(&T) -> &String,
{
    let key = id(&value).clone();
    list.retain(|v| *id(v) != key);
    list.push_front(value);
    list.truncate(cap);
}

/// Session shared between HTTP handlers and the timer driver.
pub type SharedSession = Arc<Mutex<FeedSession<TokioScheduler>>>;

/// Feed fired timer ids into the session until the scheduler goes away.
pub fn spawn_banner_driver(
    session: SharedSession,
    mut fired: mpsc::UnboundedReceiver<TimerId>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(id) = fired.recv().await {
            let events = session.lock().await.on_timer(id);
            for ev in &events {
                tracing::debug!(target: "feed::banner", ?ev, "banner event");
            }
        }
        tracing::debug!(target: "feed::banner", "banner driver stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::ManualScheduler;
    use crate::model::{AlertType, Classification, Source, Tags};
    use crate::storage::MemoryStore;
    use chrono::Duration;

    async fn session() -> FeedSession<ManualScheduler> {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        FeedSession::open(store, &PipelineConfig::default(), ManualScheduler::new()).await
    }

    fn high_item(id: &str, title: &str, at: DateTime<Utc>) -> Item {
        Item::new(id)
            .with_title(title)
            .with_published_at(at)
            .with_source(Source::new("Wire", 1, 90.0))
            .with_tags(Tags::default())
            .with_classification(Classification::new(Impact::High, 90.0))
    }

    #[test]
    fn bounded_push_dedups_and_caps() {
        let mut list: VecDeque<String> = VecDeque::new();
        for s in ["a", "b", "c", "a"] {
            push_front_bounded(&mut list, s.to_string(), 3, |v| v);
        }
        assert_eq!(list, vec!["a", "c", "b"]);
        push_front_bounded(&mut list, "d".to_string(), 3, |v| v);
        assert_eq!(list, vec!["d", "a", "c"]);
    }

    #[tokio::test]
    async fn routed_items_are_newest_first() {
        let mut s = session().await;
        let now = Utc::now();
        let items = vec![
            high_item("old", "Chipmaker guidance raised sharply", now - Duration::hours(2)),
            high_item("new", "Refinery outage hits supply", now - Duration::minutes(5)),
        ];
        let report = s.route_items(&items, now);
        assert_eq!(report.notified.len(), 2);
        let order: Vec<_> = s.notifications().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn reset_clears_session_state_only() {
        let mut s = session().await;
        let folder = s.watchlist_mut().create("Core", true).await;
        let alert = Alert::new("fed1", AlertType::Fed, "Fed hikes", Impact::High, Utc::now());
        s.route_alerts(std::slice::from_ref(&alert));
        assert_eq!(s.critical_alerts().count(), 1);
        assert!(s.banner().current().is_some());

        s.reset();
        assert_eq!(s.critical_alerts().count(), 0);
        assert!(s.banner().current().is_none());
        assert!(s.watchlist().folder(&folder).is_some());
        assert_eq!(s.watchlist().active(), Some(folder.as_str()));
    }
}
