// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    Router,
};
use http::{Request, StatusCode};
use serde_json::{json, Value as Json};
use tokio::sync::Mutex;
use tower::ServiceExt as _; // for `oneshot`

use feed_router::banner::TokioScheduler;
use feed_router::storage::{KvStore, MemoryStore};
use feed_router::{create_router, AppState, FeedSession, PipelineConfig};

const BODY_LIMIT: usize = 1024 * 1024;

/// Build the same Router the binary uses, on an in-memory store.
async fn test_router() -> Router {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let (scheduler, _fired) = TokioScheduler::new();
    let session = FeedSession::open(store, &PipelineConfig::default(), scheduler).await;
    create_router(AppState {
        session: Arc::new(Mutex::new(session)),
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Json::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}

fn sample_item(id: &str, title: &str, impact: &str) -> Json {
    json!({
        "id": id,
        "published_at": "2025-06-02T13:00:00Z",
        "title": title,
        "source": { "name": "Wire", "tier": 1, "reliability": 90 },
        "tickers": ["NVDA"],
        "tags": { "macro": false, "earnings": false },
        "classification": { "confidence": 85, "impact": impact }
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_router().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Json::String("ok".into()));
}

#[tokio::test]
async fn rank_returns_scored_deduped_items() {
    let app = test_router().await;
    let payload = json!({
        "now": "2025-06-02T14:00:00Z",
        "items": [
            sample_item("a", "Nvidia beats revenue estimates", "High"),
            sample_item("b", "NVIDIA beats revenue estimates again", "High"),
            { "id": "untitled" }
        ]
    });
    let (status, body) = send(&app, "POST", "/feed/rank", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().expect("array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "a");
    assert!(items[0]["score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn route_fills_lists_and_banner() {
    let app = test_router().await;
    let payload = json!({
        "now": "2025-06-02T14:00:00Z",
        "items": [sample_item("i1", "Exchange halts trading", "High")],
        "alerts": [{
            "id": "cpi-1",
            "type": "cpi",
            "headline": "CPI 3.4%",
            "source": "BLS",
            "impact": "High",
            "confidence": 90,
            "published_at": "2025-06-02T12:30:00Z"
        }]
    });
    let (status, body) = send(&app, "POST", "/feed/route", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"]["notified"], json!(["i1"]));
    assert_eq!(body["alerts"]["critical"], json!(["cpi-1"]));

    let (_, notes) = send(&app, "GET", "/notifications", None).await;
    assert_eq!(notes[0]["id"], "i1");
    let (_, crit) = send(&app, "GET", "/alerts/critical", None).await;
    assert_eq!(crit[0]["id"], "cpi-1");

    let (_, banner) = send(&app, "GET", "/banner", None).await;
    assert_eq!(banner["phase"], "showing");
    assert_eq!(banner["current"]["id"], "i1");
    assert_eq!(banner["queued"], json!(["cpi-1"]));

    let (_, events) = send(&app, "POST", "/banner/dismiss", None).await;
    assert_eq!(events[0]["event"], "dismissing");
    let (_, banner) = send(&app, "GET", "/banner", None).await;
    assert_eq!(banner["phase"], "dismissing");
}

#[tokio::test]
async fn preferences_round_trip() {
    let app = test_router().await;
    let (_, prefs) = send(&app, "GET", "/preferences/notifications", None).await;
    assert_eq!(prefs["impactLevel"], "HIGH");
    assert_eq!(prefs["watchlist"], true);

    let (status, prefs) = send(
        &app,
        "PUT",
        "/preferences/notifications",
        Some(json!({ "impactLevel": "MEDIUM_HIGH", "earnings": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prefs["impactLevel"], "MEDIUM_HIGH");
    assert_eq!(prefs["earnings"], false);
    assert_eq!(prefs["critical"], true);

    let (_, banner) = send(
        &app,
        "PUT",
        "/preferences/banner",
        Some(json!({ "highImpactOnly": true })),
    )
    .await;
    assert_eq!(banner["highImpactOnly"], true);
    let (_, banner) = send(&app, "GET", "/preferences/banner", None).await;
    assert_eq!(banner["highImpactOnly"], true);
    assert_eq!(banner["fed"], true);
}

#[tokio::test]
async fn watchlist_endpoints() {
    let app = test_router().await;
    let (status, created) = send(
        &app,
        "POST",
        "/watchlist/folders",
        Some(json!({ "name": "Semis" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().expect("id").to_string();

    let uri = format!("/watchlist/folders/{id}/tickers");
    let (_, added) = send(&app, "POST", &uri, Some(json!({ "ticker": "nvda" }))).await;
    assert_eq!(added["added"], true);
    let (_, added) = send(&app, "POST", &uri, Some(json!({ "ticker": "NVDA" }))).await;
    assert_eq!(added["added"], false);

    let (_, wl) = send(&app, "GET", "/watchlist", None).await;
    assert_eq!(wl["active"], id.as_str());
    assert_eq!(wl["folders"][0]["tickers"], json!(["NVDA"]));
    assert_eq!(wl["folders"][0]["isExpanded"], true);

    let (status, _) = send(&app, "DELETE", &format!("{uri}/NVDA"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &format!("{uri}/NVDA"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/watchlist/folders/missing/tickers",
        Some(json!({ "ticker": "SPY" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &format!("/watchlist/folders/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, wl) = send(&app, "GET", "/watchlist", None).await;
    assert_eq!(wl["folders"], json!([]));
    assert_eq!(wl["active"], Json::Null);
}

#[tokio::test]
async fn blank_folder_name_is_rejected() {
    let app = test_router().await;
    let (status, _) = send(
        &app,
        "POST",
        "/watchlist/folders",
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
