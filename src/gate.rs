//! Delivery gates.
//!
//! Persistent notifications: category toggle (plus watchlist membership for
//! the `watchlist` category) AND impact threshold.
//!
//! In-app banners: banner toggle for the entity's bucket (plus watchlist
//! membership) AND, with `highImpactOnly`, a High impact or a normalized
//! impact score of at least 0.70. The notification impact threshold does not
//! apply here.
//!
//! An entity that cannot be classified is rejected by both.

use std::collections::HashSet;

use crate::classify::{classify, Category, Entity};
use crate::model::Impact;
use crate::preferences::{
    load_banner_preferences, load_notification_preferences, BannerPreferences, BannerToggle,
    ImpactLevel, NotificationPreferences,
};
use crate::scoring::matches_watchlist;
use crate::storage::KvStore;

/// Normalized impact score that counts as high impact for banners.
pub const HIGH_IMPACT_SCORE: f64 = 0.70;

/// Why a delivery was refused. Used for logs and route reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unclassified,
    CategoryDisabled(Category),
    NotOnWatchlist,
    BelowImpact,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Unclassified => f.write_str("unclassified"),
            Rejection::CategoryDisabled(c) => write!(f, "category {c} disabled"),
            Rejection::NotOnWatchlist => f.write_str("not on watchlist"),
            Rejection::BelowImpact => f.write_str("below impact threshold"),
        }
    }
}

pub fn passes_impact(level: ImpactLevel, impact: Impact) -> bool {
    match (level, impact) {
        (_, Impact::Low) => false,
        (ImpactLevel::High, Impact::High) => true,
        (ImpactLevel::High, Impact::Medium) => false,
        (ImpactLevel::MediumHigh, _) => true,
    }
}

fn on_watchlist(entity: Entity<'_>, watchlist: &HashSet<String>) -> bool {
    matches_watchlist(entity.tickers(), watchlist)
}

/// Notification-path decision with the refusal reason.
pub fn check_notification(
    entity: Entity<'_>,
    prefs: &NotificationPreferences,
    watchlist: &HashSet<String>,
) -> Result<Category, Rejection> {
    let category = classify(entity).ok_or(Rejection::Unclassified)?;

    if !prefs.category_enabled(category) {
        return Err(Rejection::CategoryDisabled(category));
    }
    if category == Category::Watchlist && !on_watchlist(entity, watchlist) {
        return Err(Rejection::NotOnWatchlist);
    }

    let impact = entity.impact().ok_or(Rejection::Unclassified)?;
    if !passes_impact(prefs.impact_level, impact) {
        return Err(Rejection::BelowImpact);
    }
    Ok(category)
}

pub fn allows_notification(
    entity: Entity<'_>,
    prefs: &NotificationPreferences,
    watchlist: &HashSet<String>,
) -> bool {
    check_notification(entity, prefs, watchlist).is_ok()
}

/// Banner toggle governing `category` for this entity. Economic entities
/// split into `fed` (central bank) and `cpi` (data releases).
pub fn banner_toggle_for(entity: Entity<'_>, category: Category) -> BannerToggle {
    match category {
        Category::Critical => BannerToggle::Critical,
        Category::Earnings => BannerToggle::Earnings,
        Category::Watchlist => BannerToggle::Watchlist,
        Category::Economic if entity.is_central_bank() => BannerToggle::Fed,
        Category::Economic => BannerToggle::Cpi,
    }
}

/// Banner-path decision with the refusal reason.
pub fn check_banner(
    entity: Entity<'_>,
    prefs: &BannerPreferences,
    watchlist: &HashSet<String>,
) -> Result<Category, Rejection> {
    let category = classify(entity).ok_or(Rejection::Unclassified)?;

    if !prefs.toggle(banner_toggle_for(entity, category)) {
        return Err(Rejection::CategoryDisabled(category));
    }
    if category == Category::Watchlist && !on_watchlist(entity, watchlist) {
        return Err(Rejection::NotOnWatchlist);
    }

    if prefs.high_impact_only {
        let explicit = entity.impact() == Some(Impact::High);
        if !explicit && entity.impact_score() < HIGH_IMPACT_SCORE {
            return Err(Rejection::BelowImpact);
        }
    }
    Ok(category)
}

pub fn allows_banner(
    entity: Entity<'_>,
    prefs: &BannerPreferences,
    watchlist: &HashSet<String>,
) -> bool {
    check_banner(entity, prefs, watchlist).is_ok()
}

/// Notification decision against the preferences currently in storage.
pub async fn should_notify(
    store: &dyn KvStore,
    entity: Entity<'_>,
    watchlist: &HashSet<String>,
) -> bool {
    let prefs = load_notification_preferences(store).await;
    allows_notification(entity, &prefs, watchlist)
}

/// Banner decision against the preferences currently in storage.
pub async fn should_show_banner(
    store: &dyn KvStore,
    entity: Entity<'_>,
    watchlist: &HashSet<String>,
) -> bool {
    let prefs = load_banner_preferences(store).await;
    allows_banner(entity, &prefs, watchlist)
}
