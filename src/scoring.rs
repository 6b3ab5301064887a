//! Composite relevance score in `[0, 100]` used to rank the feed.
//!
//! Five sub-terms, each clamped before weighting:
//! - `reliability`  : source reliability / 100, in [0,1]
//! - `freshness`    : 1 - |age hours| / 24, in [0,1] (future items are penalized too)
//! - `ticker_match` : 1.0 on a watchlist hit, else 0.3
//! - `surprise`     : 1.0 above 80 confidence, else confidence / 100
//! - `macro_weight` : 1.2 for macro/fed items, else 1.0, clamped to [0,2]
//!
//! `macro_weight` is not normalized to [0,1]; a macro item can land slightly
//! above 100.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::model::Item;

const TICKER_MISS: f64 = 0.3;
const SURPRISE_CUTOFF: f64 = 80.0;
const MACRO_BOOST: f64 = 1.2;
const FRESHNESS_HORIZON_HOURS: f64 = 24.0;

/// Weights of the five sub-terms. Defaults sum to 1.0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub reliability: f64,
    pub freshness: f64,
    pub ticker_match: f64,
    pub surprise: f64,
    pub macro_weight: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            reliability: 0.28,
            freshness: 0.22,
            ticker_match: 0.20,
            surprise: 0.15,
            macro_weight: 0.15,
        }
    }
}

/// Clamped sub-terms plus the final rounded score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub reliability: f64,
    pub freshness: f64,
    pub ticker_match: f64,
    pub surprise: f64,
    pub macro_weight: f64,
    pub total: f64,
}

#[inline]
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    if x.is_finite() {
        x.clamp(lo, hi)
    } else {
        lo
    }
}

/// True if any of `tickers` is in the (upper-case) watchlist set.
pub fn matches_watchlist(tickers: &[String], watchlist: &HashSet<String>) -> bool {
    tickers
        .iter()
        .any(|t| watchlist.contains(&t.trim().to_ascii_uppercase()))
}

/// Sub-terms for `item`, or `None` if a required field is missing.
pub fn breakdown(
    item: &Item,
    watchlist: &HashSet<String>,
    now: DateTime<Utc>,
    w: &ScoreWeights,
) -> Option<ScoreBreakdown> {
    let published_at = item.published_at?;
    let source = item.source.as_ref()?;
    let class = item.classification.as_ref()?;
    let tags = item.tags.as_ref()?;

    let reliability = clamp(source.reliability / 100.0, 0.0, 1.0);

    let age_hours = (now - published_at).num_milliseconds() as f64 / 3_600_000.0;
    let freshness = clamp(1.0 - age_hours.abs() / FRESHNESS_HORIZON_HOURS, 0.0, 1.0);

    let ticker_match = if matches_watchlist(&item.tickers, watchlist) {
        1.0
    } else {
        TICKER_MISS
    };

    let surprise = if class.confidence > SURPRISE_CUTOFF {
        1.0
    } else {
        clamp(class.confidence / 100.0, 0.0, 1.0)
    };

    let macro_weight = clamp(
        if tags.is_macro_or_fed() { MACRO_BOOST } else { 1.0 },
        0.0,
        2.0,
    );

    let raw = reliability * w.reliability
        + freshness * w.freshness
        + ticker_match * w.ticker_match
        + surprise * w.surprise
        + macro_weight * w.macro_weight;

    let total = round2(100.0 * raw);
    Some(ScoreBreakdown {
        reliability,
        freshness,
        ticker_match,
        surprise,
        macro_weight,
        total: if total.is_finite() { total } else { 0.0 },
    })
}

/// Score with explicit weights; 0 when required fields are missing.
pub fn score_item_with(
    item: &Item,
    watchlist: &HashSet<String>,
    now: DateTime<Utc>,
    w: &ScoreWeights,
) -> f64 {
    match breakdown(item, watchlist, now, w) {
        Some(b) => b.total,
        None => {
            tracing::trace!(target: "feed::score", id = %item.id, "missing fields, score 0");
            0.0
        }
    }
}

/// Score with the default weights.
pub fn score_item(item: &Item, watchlist: &HashSet<String>, now: DateTime<Utc>) -> f64 {
    score_item_with(item, watchlist, now, &ScoreWeights::default())
}

/// Clone `items` with `score` filled in. The input is left untouched.
pub fn score_all(
    items: &[Item],
    watchlist: &HashSet<String>,
    now: DateTime<Utc>,
    w: &ScoreWeights,
) -> Vec<Item> {
    counter!("feed_items_scored_total").increment(items.len() as u64);
    items
        .iter()
        .map(|it| {
            let mut out = it.clone();
            out.score = Some(score_item_with(it, watchlist, now, w));
            out
        })
        .collect()
}
