//! Delivery category for items and alerts.
//!
//! Precedence, first match wins:
//! 1. High-impact item              -> `critical`
//! 2. macro/fed item, economic alert -> `economic`
//! 3. earnings item/alert            -> `earnings`
//! 4. any other item -> `watchlist`, any other alert -> `critical`
//!
//! Alerts never land in `watchlist`. Items without a classification or tag
//! set cannot be classified (`None`) and are never delivered.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{Alert, AlertType, Impact, Item};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Critical,
    Economic,
    Earnings,
    Watchlist,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Critical => "critical",
            Category::Economic => "economic",
            Category::Earnings => "earnings",
            Category::Watchlist => "watchlist",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view over either entity kind.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Item(&'a Item),
    Alert(&'a Alert),
}

impl<'a> Entity<'a> {
    pub fn id(&self) -> &'a str {
        match *self {
            Entity::Item(i) => &i.id,
            Entity::Alert(a) => &a.id,
        }
    }

    pub fn impact(&self) -> Option<Impact> {
        match self {
            Entity::Item(i) => i.impact(),
            Entity::Alert(a) => Some(a.impact),
        }
    }

    pub fn tickers(&self) -> &'a [String] {
        match *self {
            Entity::Item(i) => &i.tickers,
            Entity::Alert(a) => &a.tickers,
        }
    }

    /// Impact signal normalized to [0,1]: the ranking score for items,
    /// the classifier confidence for alerts.
    pub fn impact_score(&self) -> f64 {
        let raw = match self {
            Entity::Item(i) => i.rank_score(),
            Entity::Alert(a) => a.confidence,
        };
        (raw / 100.0).clamp(0.0, 1.0)
    }

    /// True for fed-tagged items and Fed/FOMC alerts.
    pub fn is_central_bank(&self) -> bool {
        match self {
            Entity::Item(i) => i.tags.is_some_and(|t| t.fed),
            Entity::Alert(a) => a.kind.is_central_bank(),
        }
    }
}

impl<'a> From<&'a Item> for Entity<'a> {
    fn from(i: &'a Item) -> Self {
        Entity::Item(i)
    }
}

impl<'a> From<&'a Alert> for Entity<'a> {
    fn from(a: &'a Alert) -> Self {
        Entity::Alert(a)
    }
}

pub fn classify(entity: Entity<'_>) -> Option<Category> {
    match entity {
        Entity::Item(i) => classify_item(i),
        Entity::Alert(a) => Some(classify_alert(a)),
    }
}

pub fn classify_item(item: &Item) -> Option<Category> {
    let class = item.classification.as_ref()?;
    let tags = item.tags.as_ref()?;

    let cat = if class.impact == Impact::High {
        Category::Critical
    } else if tags.is_macro_or_fed() {
        Category::Economic
    } else if tags.earnings {
        Category::Earnings
    } else {
        Category::Watchlist
    };
    Some(cat)
}

pub fn classify_alert(alert: &Alert) -> Category {
    if alert.kind.is_economic() {
        Category::Economic
    } else if alert.kind == AlertType::Earnings {
        Category::Earnings
    } else {
        // No watchlist bucket for alerts.
        Category::Critical
    }
}
