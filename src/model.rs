//! # Pipeline records
//! News `Item`s and structured `Alert`s as they arrive from the feed.
//!
//! Everything that may be absent in a raw record is an `Option` so the
//! scoring and classification stages can degrade (score 0, no category)
//! instead of failing. Percent-valued fields are clamped to `[0, 100]` on
//! deserialization and in the constructors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Three-level impact shared by items and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Impact {
    #[serde(alias = "low", alias = "LOW")]
    Low,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "high", alias = "HIGH")]
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    #[serde(alias = "positive")]
    Bullish,
    #[serde(alias = "negative")]
    Bearish,
    #[default]
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RumorLevel {
    #[default]
    Confirmed,
    Unconfirmed,
    Rumor,
}

/// Clamp a percent value into `[0, 100]`; non-finite input maps to 0.
pub fn clamp_percent(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn de_percent<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = f64::deserialize(d)?;
    Ok(clamp_percent(v))
}

fn default_tier() -> u8 {
    2
}

/// Publisher of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    /// Trust tier, 1 = wire/primary, 3 = social/aggregator.
    #[serde(default = "default_tier")]
    pub tier: u8,
    /// Reliability in `[0, 100]`.
    #[serde(default, deserialize_with = "de_percent")]
    pub reliability: f64,
}

impl Source {
    pub fn new(name: impl Into<String>, tier: u8, reliability: f64) -> Self {
        Self {
            name: name.into(),
            tier,
            reliability: clamp_percent(reliability),
        }
    }
}

/// Topic flags attached to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tags {
    #[serde(rename = "macro")]
    pub macro_econ: bool,
    pub fed: bool,
    pub filing: bool,
    pub earnings: bool,
    pub social: bool,
}

impl Tags {
    pub fn is_macro_or_fed(&self) -> bool {
        self.macro_econ || self.fed
    }
}

/// Upstream classifier output for an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub rumor_level: RumorLevel,
    #[serde(default)]
    pub sentiment: Sentiment,
    /// Confidence in `[0, 100]`.
    #[serde(default, deserialize_with = "de_percent")]
    pub confidence: f64,
    pub impact: Impact,
    #[serde(default)]
    pub summary: String,
}

impl Classification {
    pub fn new(impact: Impact, confidence: f64) -> Self {
        Self {
            rumor_level: RumorLevel::default(),
            sentiment: Sentiment::default(),
            confidence: clamp_percent(confidence),
            impact,
            summary: String::new(),
        }
    }
}

/// A news/event unit from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub tags: Option<Tags>,
    #[serde(default)]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Item {
    /// Bare item with only an id; builder-style setters fill the rest.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            published_at: None,
            title: None,
            source: None,
            tickers: Vec::new(),
            tags: None,
            classification: None,
            dedupe_key: None,
            score: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_published_at(mut self, ts: DateTime<Utc>) -> Self {
        self.published_at = Some(ts);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_tickers<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tickers = tickers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_classification(mut self, c: Classification) -> Self {
        self.classification = Some(c);
        self
    }

    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    /// Title if present and not blank.
    pub fn title_text(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn impact(&self) -> Option<Impact> {
        self.classification.as_ref().map(|c| c.impact)
    }

    pub fn reliability(&self) -> Option<f64> {
        self.source.as_ref().map(|s| clamp_percent(s.reliability))
    }

    /// Score used for ordering; unscored items rank as 0.
    pub fn rank_score(&self) -> f64 {
        self.score.filter(|s| s.is_finite()).unwrap_or(0.0)
    }
}

/// Kind of scheduled/critical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Fed,
    Cpi,
    Earnings,
    Ppi,
    Nfp,
    Gdp,
    Fomc,
    #[serde(other)]
    Other,
}

impl AlertType {
    /// Macro releases and central-bank actions.
    pub fn is_economic(self) -> bool {
        matches!(
            self,
            AlertType::Fed
                | AlertType::Cpi
                | AlertType::Ppi
                | AlertType::Nfp
                | AlertType::Gdp
                | AlertType::Fomc
        )
    }

    pub fn is_central_bank(self) -> bool {
        matches!(self, AlertType::Fed | AlertType::Fomc)
    }
}

/// Structured notice for a scheduled release or critical event.
/// No body text: a headline plus metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AlertType,
    pub headline: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    pub impact: Impact,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default, deserialize_with = "de_percent")]
    pub confidence: f64,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub released: bool,
}

impl Alert {
    pub fn new(
        id: impl Into<String>,
        kind: AlertType,
        headline: impl Into<String>,
        impact: Impact,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            headline: headline.into(),
            source: String::new(),
            tickers: Vec::new(),
            forecast: None,
            actual: None,
            verdict: None,
            impact,
            sentiment: Sentiment::default(),
            confidence: 0.0,
            published_at,
            released: false,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_percent(confidence);
        self
    }

    pub fn with_tickers<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tickers = tickers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}
