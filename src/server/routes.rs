use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use moka::future::Cache;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::types::{
    FeedPage, FeedRequest, PageQuery, PlaybackRequest, PlaybackState, ScrollQuery, SearchQuery,
    ServerInfo, SubtitleQuery,
};
use crate::catalog::Catalog;
use crate::error::CatalogError;
use crate::model::ContentId;
use crate::paginator::{CatalogFeed, Paginator};
use crate::playback::PlaybackSession;
use crate::providers::{Feed, Provider};

/// Feeds and playback sessions idle this long are dropped.
const SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

// ── Application state shared across all routes ─────────────────────────────────

#[derive(Clone)]
pub struct ApiState {
    pub catalog: Catalog,
    pub feeds: Cache<String, Arc<Paginator>>,
    pub sessions: Cache<String, Arc<PlaybackSession>>,
    pub scroll_threshold_px: f64,
    pub server_info: Arc<ServerInfo>,
}

impl ApiState {
    pub fn new(catalog: Catalog, scroll_threshold_px: f64, server_info: ServerInfo) -> Self {
        Self {
            catalog,
            feeds: Cache::builder().max_capacity(256).time_to_idle(SESSION_IDLE).build(),
            sessions: Cache::builder().max_capacity(256).time_to_idle(SESSION_IDLE).build(),
            scroll_threshold_px,
            server_info: Arc::new(server_info),
        }
    }
}

// ── Error helpers ─────────────────────────────────────────────────────────────

fn error_body(status: StatusCode, msg: impl std::fmt::Display) -> Response {
    (status, Json(serde_json::json!({ "error": msg.to_string() }))).into_response()
}

fn bad_request(msg: impl std::fmt::Display) -> Response {
    error_body(StatusCode::BAD_REQUEST, msg)
}

fn not_found(msg: impl std::fmt::Display) -> Response {
    error_body(StatusCode::NOT_FOUND, msg)
}

fn catalog_error(e: CatalogError) -> Response {
    match e {
        CatalogError::NoPlayableSource | CatalogError::UnknownSubtitle(_) => not_found(e),
        CatalogError::InvalidId(_)
        | CatalogError::UnknownProvider(_)
        | CatalogError::UnknownFeed(_)
        | CatalogError::Unsupported { .. } => bad_request(e),
        CatalogError::AllTransportsExhausted(_)
        | CatalogError::AllProvidersFailed
        | CatalogError::Network(_)
        | CatalogError::Http { .. }
        | CatalogError::Parse(_) => error_body(StatusCode::BAD_GATEWAY, e),
        CatalogError::SchemaMismatch(_) | CatalogError::Config(_) => {
            warn!(error = %e, "internal error");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

fn vtt_response(body: &str) -> Response {
    (
        [(header::CONTENT_TYPE, "text/vtt; charset=utf-8")],
        Body::from(body.to_string()),
    )
        .into_response()
}

// ── Catalog ───────────────────────────────────────────────────────────────────

async fn handle_info(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.server_info.as_ref().clone())
}

async fn handle_catalog(
    Path(provider): Path<String>,
    Query(q): Query<PageQuery>,
    State(state): State<ApiState>,
) -> Response {
    let provider = match provider.parse::<Provider>() {
        Ok(p) => p,
        Err(e) => return bad_request(e),
    };
    match state.catalog.listing(provider, q.page()).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn handle_named_feed(
    Path((provider, feed)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> Response {
    let (provider, feed) = match (provider.parse::<Provider>(), feed.parse::<Feed>()) {
        (Ok(p), Ok(f)) => (p, f),
        (Err(e), _) | (_, Err(e)) => return bad_request(e),
    };
    match state.catalog.feed(provider, feed).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn handle_trending(Query(q): Query<PageQuery>, State(state): State<ApiState>) -> Response {
    match state.catalog.trending(q.page()).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn handle_search(Query(q): Query<SearchQuery>, State(state): State<ApiState>) -> Response {
    let Some(query) = q.q else {
        return bad_request("Missing q parameter");
    };
    match state.catalog.search(&query).await {
        Ok(items) => Json(items).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn handle_detail(Path(id): Path<String>, State(state): State<ApiState>) -> Response {
    let id = match id.parse::<ContentId>() {
        Ok(id) => id,
        Err(e) => return bad_request(e),
    };
    match state.catalog.detail(&id).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn handle_episode_source(
    Path((id, index)): Path<(String, u32)>,
    State(state): State<ApiState>,
) -> Response {
    let id = match id.parse::<ContentId>() {
        Ok(id) => id,
        Err(e) => return bad_request(e),
    };
    match state.catalog.resolve_episode(&id, index).await {
        Ok(source) => Json(source).into_response(),
        Err(e) => catalog_error(e),
    }
}

// ── Feeds ─────────────────────────────────────────────────────────────────────

async fn feed_page(id: String, feed: &Paginator, added: Option<usize>) -> FeedPage {
    FeedPage {
        id,
        page: feed.page().await,
        added,
        has_more: feed.has_more().await,
        items: feed.items().await,
    }
}

async fn handle_create_feed(
    State(state): State<ApiState>,
    body: Option<Json<FeedRequest>>,
) -> Response {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let provider = match request.provider.as_deref().map(str::parse::<Provider>) {
        None => None,
        Some(Ok(p)) => Some(p),
        Some(Err(e)) => return bad_request(e),
    };

    let feed = Arc::new(Paginator::new(
        CatalogFeed::new(state.catalog.clone(), provider),
        state.scroll_threshold_px,
    ));
    let added = match feed.load_initial().await {
        Ok(added) => added,
        Err(e) => return catalog_error(e),
    };

    let id = uuid::Uuid::new_v4().to_string();
    state.feeds.insert(id.clone(), feed.clone()).await;
    (StatusCode::CREATED, Json(feed_page(id, &feed, added).await)).into_response()
}

async fn handle_feed_scroll(
    Path(id): Path<String>,
    Query(q): Query<ScrollQuery>,
    State(state): State<ApiState>,
) -> Response {
    let Some(distance) = q.distance else {
        return bad_request("Missing distance parameter");
    };
    let Some(feed) = state.feeds.get(&id).await else {
        return not_found("Unknown feed");
    };
    match feed.on_scroll(distance).await {
        Ok(added) => Json(feed_page(id, &feed, added).await).into_response(),
        Err(e) => catalog_error(e),
    }
}

// ── Playback ──────────────────────────────────────────────────────────────────

async fn switch_source(
    state: &ApiState,
    session_id: String,
    session: &PlaybackSession,
    request: PlaybackRequest,
) -> Response {
    let id = match request.id.parse::<ContentId>() {
        Ok(id) => id,
        Err(e) => return bad_request(e),
    };
    let resolve = state.catalog.resolve_episode(&id, request.index);
    match session.switch(resolve).await {
        Ok(source) => Json(PlaybackState {
            session: session_id,
            superseded: source.is_none(),
            source,
        })
        .into_response(),
        Err(e) => catalog_error(e),
    }
}

async fn handle_create_playback(
    State(state): State<ApiState>,
    Json(request): Json<PlaybackRequest>,
) -> Response {
    let session = Arc::new(PlaybackSession::new(state.catalog.transport().clone()));
    let id = uuid::Uuid::new_v4().to_string();
    state.sessions.insert(id.clone(), session.clone()).await;
    switch_source(&state, id, &session, request).await
}

/// Moving to another episode drops the previous selection and its subtitle tracks.
async fn handle_switch_playback(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    Json(request): Json<PlaybackRequest>,
) -> Response {
    let Some(session) = state.sessions.get(&id).await else {
        return not_found("Unknown playback session");
    };
    session.reset().await;
    switch_source(&state, id, &session, request).await
}

async fn handle_playback_subtitles(
    Path(id): Path<String>,
    Query(q): Query<SubtitleQuery>,
    State(state): State<ApiState>,
) -> Response {
    let Some(lang) = q.lang else {
        return bad_request("Missing lang parameter");
    };
    let Some(session) = state.sessions.get(&id).await else {
        return not_found("Unknown playback session");
    };
    match session.subtitle(&lang).await {
        Ok(vtt) => vtt_response(&vtt),
        Err(e) => catalog_error(e),
    }
}

// ── Operability ───────────────────────────────────────────────────────────────

async fn handle_get_debug_log(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.catalog.transport().debug_log().entries())
}

async fn handle_clear_debug_log(State(state): State<ApiState>) -> StatusCode {
    state.catalog.transport().debug_log().clear();
    StatusCode::NO_CONTENT
}

async fn handle_clear_cache(State(state): State<ApiState>) -> StatusCode {
    state.catalog.transport().clear();
    StatusCode::NO_CONTENT
}

// ── Router factory ────────────────────────────────────────────────────────────

pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/info", get(handle_info))
        // Catalog
        .route("/catalog/:provider", get(handle_catalog))
        .route("/catalog/:provider/feeds/:feed", get(handle_named_feed))
        .route("/trending", get(handle_trending))
        .route("/search", get(handle_search))
        .route("/detail/:id", get(handle_detail))
        .route("/detail/:id/episodes/:index/source", get(handle_episode_source))
        // Feeds
        .route("/feeds", post(handle_create_feed))
        .route("/feeds/:id/scroll", get(handle_feed_scroll))
        // Playback
        .route("/playback", post(handle_create_playback))
        .route("/playback/:id", put(handle_switch_playback))
        .route("/playback/:id/subtitles", get(handle_playback_subtitles))
        // Operability
        .route("/debug/log", get(handle_get_debug_log).delete(handle_clear_debug_log))
        .route("/cache", delete(handle_clear_cache))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
