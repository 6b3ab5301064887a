//! Demo that pushes three alerts through a session and logs the banner
//! lifecycle until the queue drains (in-memory store, real timers).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use feed_router::banner::{BannerPhase, TokioScheduler};
use feed_router::session::{spawn_banner_driver, FeedSession};
use feed_router::storage::{KvStore, MemoryStore};
use feed_router::{init_tracing, Alert, AlertType, Impact, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut cfg = PipelineConfig::load()?;
    // Short enough to watch.
    cfg.banner.auto_dismiss_ms = cfg.banner.auto_dismiss_ms.min(1_500);

    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (scheduler, fired) = TokioScheduler::new();
    let session = Arc::new(Mutex::new(FeedSession::open(store, &cfg, scheduler).await));
    let driver = spawn_banner_driver(session.clone(), fired);

    let now = Utc::now();
    let alerts = [
        Alert::new("cpi-oct", AlertType::Cpi, "CPI 3.4% vs 3.2% est", Impact::High, now)
            .with_source("BLS")
            .with_confidence(88.0),
        Alert::new("fomc-nov", AlertType::Fomc, "FOMC holds rates", Impact::High, now)
            .with_source("Federal Reserve"),
        Alert::new("nvda-q3", AlertType::Earnings, "NVDA beats on revenue", Impact::Medium, now)
            .with_source("Company filing")
            .with_tickers(["NVDA"]),
    ];

    let report = session.lock().await.route_alerts(&alerts);
    for ev in &report.events {
        tracing::info!(target: "feed::banner", ?ev, "banner event");
    }

    loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let s = session.lock().await;
        let snap = s.banner().snapshot();
        tracing::info!(
            target: "feed::banner",
            phase = ?snap.phase,
            current = snap.current.as_ref().map(|c| c.id.as_str()),
            queued = snap.queued.len(),
            "tick"
        );
        if snap.phase == BannerPhase::Idle && snap.queued.is_empty() {
            break;
        }
    }

    driver.abort();
    println!("banner-demo done");
    Ok(())
}
