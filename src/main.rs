//! Feed router service: binary entrypoint.
//! Boots the Axum HTTP server around one routing session backed by the
//! file store, plus the background task that delivers banner timers.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;

use feed_router::banner::TokioScheduler;
use feed_router::metrics::Metrics;
use feed_router::session::{spawn_banner_driver, FeedSession};
use feed_router::storage::{FileStore, KvStore};
use feed_router::{create_router, init_tracing, AppState, PipelineConfig};

const ENV_BIND: &str = "FEED_BIND";
const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Must run before `FeedSession::open`, which describes the series.
    let metrics = Metrics::init()?;
    let cfg = PipelineConfig::load()?;
    let store: Arc<dyn KvStore> = Arc::new(FileStore::new(&cfg.storage.dir));

    let (scheduler, fired) = TokioScheduler::new();
    let session = Arc::new(Mutex::new(FeedSession::open(store, &cfg, scheduler).await));
    let driver = spawn_banner_driver(session.clone(), fired);

    let app = create_router(AppState { session }).merge(metrics.router());

    let bind = std::env::var(ENV_BIND).unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid {ENV_BIND}: {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(target: "feed::route", %addr, storage = %cfg.storage.dir.display(), "listening");

    axum::serve(listener, app).await.context("http server")?;
    driver.abort();
    Ok(())
}
