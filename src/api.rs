use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::banner::{BannerEvent, BannerSnapshot};
use crate::model::{Alert, Item};
use crate::preferences::{BannerPreferences, NotificationPreferences};
use crate::session::{NotificationEntry, RouteReport, SharedSession};
use crate::watchlist::WatchlistFolder;

#[derive(Clone)]
pub struct AppState {
    pub session: SharedSession,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/feed/rank", post(rank_feed))
        .route("/feed/route", post(route_feed))
        .route("/notifications", get(notifications))
        .route("/alerts/critical", get(critical_alerts))
        .route("/banner", get(banner_snapshot))
        .route("/banner/dismiss", post(banner_dismiss))
        .route(
            "/preferences/notifications",
            get(get_notification_prefs).put(put_notification_prefs),
        )
        .route(
            "/preferences/banner",
            get(get_banner_prefs).put(put_banner_prefs),
        )
        .route("/watchlist", get(watchlist))
        .route("/watchlist/folders", post(create_folder))
        .route("/watchlist/folders/{id}", delete(delete_folder))
        .route("/watchlist/folders/{id}/tickers", post(add_ticker))
        .route(
            "/watchlist/folders/{id}/tickers/{ticker}",
            delete(remove_ticker),
        )
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct RankReq {
    #[serde(default)]
    items: Vec<Item>,
    /// Reference time for freshness; defaults to now.
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RouteReq {
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    alerts: Vec<Alert>,
    #[serde(default)]
    now: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct RouteResp {
    items: RouteReport,
    alerts: RouteReport,
}

async fn rank_feed(State(state): State<AppState>, Json(body): Json<RankReq>) -> Json<Vec<Item>> {
    let now = body.now.unwrap_or_else(Utc::now);
    let s = state.session.lock().await;
    Json(s.rank_feed(&body.items, now))
}

async fn route_feed(State(state): State<AppState>, Json(body): Json<RouteReq>) -> Json<RouteResp> {
    let now = body.now.unwrap_or_else(Utc::now);
    let mut s = state.session.lock().await;
    let items = s.route_items(&body.items, now);
    let alerts = s.route_alerts(&body.alerts);
    Json(RouteResp { items, alerts })
}

async fn notifications(State(state): State<AppState>) -> Json<Vec<NotificationEntry>> {
    let s = state.session.lock().await;
    Json(s.notifications().cloned().collect())
}

async fn critical_alerts(State(state): State<AppState>) -> Json<Vec<Alert>> {
    let s = state.session.lock().await;
    Json(s.critical_alerts().cloned().collect())
}

async fn banner_snapshot(State(state): State<AppState>) -> Json<BannerSnapshot> {
    let s = state.session.lock().await;
    Json(s.banner().snapshot())
}

async fn banner_dismiss(State(state): State<AppState>) -> Json<Vec<BannerEvent>> {
    let mut s = state.session.lock().await;
    Json(s.banner_mut().dismiss_current())
}

async fn get_notification_prefs(State(state): State<AppState>) -> Json<NotificationPreferences> {
    let s = state.session.lock().await;
    Json(s.preferences().notification())
}

async fn put_notification_prefs(
    State(state): State<AppState>,
    Json(prefs): Json<NotificationPreferences>,
) -> Json<NotificationPreferences> {
    let mut s = state.session.lock().await;
    s.preferences_mut().replace_notification(prefs).await;
    Json(s.preferences().notification())
}

async fn get_banner_prefs(State(state): State<AppState>) -> Json<BannerPreferences> {
    let s = state.session.lock().await;
    Json(s.preferences().banner())
}

async fn put_banner_prefs(
    State(state): State<AppState>,
    Json(prefs): Json<BannerPreferences>,
) -> Json<BannerPreferences> {
    let mut s = state.session.lock().await;
    s.preferences_mut().replace_banner(prefs).await;
    Json(s.preferences().banner())
}

#[derive(Serialize)]
struct WatchlistResp {
    folders: Vec<WatchlistFolder>,
    active: Option<String>,
}

async fn watchlist(State(state): State<AppState>) -> Json<WatchlistResp> {
    let s = state.session.lock().await;
    let w = s.watchlist();
    Json(WatchlistResp {
        folders: w.folders().to_vec(),
        active: w.active().map(str::to_string),
    })
}

#[derive(Deserialize)]
struct CreateFolderReq {
    name: String,
    #[serde(default)]
    activate: bool,
}

async fn create_folder(
    State(state): State<AppState>,
    Json(body): Json<CreateFolderReq>,
) -> impl IntoResponse {
    if body.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "name must not be blank" })),
        );
    }
    let mut s = state.session.lock().await;
    let id = s.watchlist_mut().create(&body.name, body.activate).await;
    (StatusCode::CREATED, Json(serde_json::json!({ "id": id })))
}

async fn delete_folder(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    let mut s = state.session.lock().await;
    if s.watchlist_mut().delete(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Deserialize)]
struct TickerReq {
    ticker: String,
}

async fn add_ticker(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TickerReq>,
) -> impl IntoResponse {
    let mut s = state.session.lock().await;
    if s.watchlist().folder(&id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "unknown folder" })),
        );
    }
    let added = s.watchlist_mut().add_ticker(&id, &body.ticker).await;
    (StatusCode::OK, Json(serde_json::json!({ "added": added })))
}

async fn remove_ticker(
    State(state): State<AppState>,
    Path((id, ticker)): Path<(String, String)>,
) -> StatusCode {
    let mut s = state.session.lock().await;
    if s.watchlist_mut().remove_ticker(&id, &ticker).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
