//! HTTP route handlers for the recommendation API.

use crate::server::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

// --- Request/Response types ---

fn default_top_n() -> usize {
    5
}

#[derive(Deserialize)]
pub struct RecommendRequest {
    pub item_id: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct RecItem {
    pub item_id: String,
    pub title: Option<String>,
    pub distance: f32,
    pub image_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RecommendResponse {
    pub item_id: String,
    pub recommendations: Vec<RecItem>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub vector_count: usize,
    pub tree_count: usize,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ReloadResponse {
    pub status: String,
    pub vector_count: usize,
    pub tree_count: usize,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// --- Router ---

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/recommend", post(recommend))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/admin/reload", post(reload))
        .with_state(state)
}

// --- Handlers ---

async fn recommend(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let start = Instant::now();

    let index = state.index.current();
    let neighbors = index
        .recommend(&req.item_id, req.top_n, &state.search)
        .map_err(|e| api_error(state.classify(&e), e.to_string()))?;

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_query(start.elapsed());
    }

    let recommendations = neighbors
        .into_iter()
        .map(|n| {
            let info = state.items.get(&n.item_id);
            RecItem {
                title: info.and_then(|i| i.title.clone()),
                image_url: info.and_then(|i| i.image_url.clone()),
                item_id: n.item_id,
                distance: n.distance,
            }
        })
        .collect();

    Ok(Json(RecommendResponse {
        item_id: req.item_id,
        recommendations,
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let index = state.index.current();
    Json(HealthResponse {
        status: "ok".to_string(),
        vector_count: index.len(),
        tree_count: index.trees().len(),
    })
}

async fn get_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<crate::metrics::MetricsSnapshot>, ApiError> {
    let metrics = state
        .metrics
        .read()
        .map_err(|_| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Lock poisoned"))?;
    Ok(Json(metrics.snapshot()))
}

async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadResponse>, ApiError> {
    let Some(path) = state.index_path.clone() else {
        return Err(api_error(
            StatusCode::CONFLICT,
            "Server was not started from an index file",
        ));
    };

    let worker = Arc::clone(&state);
    tokio::task::spawn_blocking(move || worker.index.reload_from(path))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if let Ok(mut metrics) = state.metrics.write() {
        metrics.record_reload();
    }

    let index = state.index.current();
    Ok(Json(ReloadResponse {
        status: "reloaded".to_string(),
        vector_count: index.len(),
        tree_count: index.trees().len(),
    }))
}
