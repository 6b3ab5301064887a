// src/lib.rs
// Public library surface for the service binary, the demo and integration tests.

pub mod api;
pub mod banner;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod gate;
pub mod metrics;
pub mod model;
pub mod preferences;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod title_key;
pub mod watchlist;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::banner::{BannerCard, BannerEvent, BannerPhase, BannerQueue, BannerTimings};
pub use crate::classify::{classify, Category, Entity};
pub use crate::config::PipelineConfig;
pub use crate::dedup::dedupe;
pub use crate::model::{Alert, AlertType, Impact, Item};
pub use crate::scoring::score_item;
pub use crate::session::{FeedSession, RouteReport, SharedSession};
pub use crate::title_key::title_key;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "FEED_LOG_JSON";

/// Install the global subscriber: `RUST_LOG` filter (default `feed=info,warn`),
/// compact output, or JSON lines when `FEED_LOG_JSON=1`.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feed=info,warn"));
    let json = std::env::var(ENV_LOG_JSON).is_ok_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}
