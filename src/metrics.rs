use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_items_scored_total", "Items passed through the scorer.");
        describe_counter!(
            "feed_dedup_dropped_total",
            "Items removed by deduplication (key, title group or untitled)."
        );
        describe_counter!(
            "route_notifications_total",
            "Items admitted to the persistent notification list."
        );
        describe_counter!(
            "route_critical_total",
            "Alerts admitted to the critical-alerts list."
        );
        describe_counter!(
            "route_rejected_total",
            "Entities refused by the notification gate."
        );
        describe_counter!("banner_shown_total", "Banners promoted to current.");
        describe_counter!("banner_dismissed_total", "Banners that completed dismissal.");
        describe_counter!(
            "storage_write_errors_total",
            "Key/value writes that failed and were skipped."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if one is already set.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
