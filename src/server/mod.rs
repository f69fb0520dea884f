//! HTTP recommendation service.

pub mod routes;

use crate::catalog::ItemInfo;
use crate::error::ForestError;
use crate::forest::{ForestIndex, SearchParams};
use crate::handle::IndexHandle;
use crate::metrics::MetricsCollector;
use axum::http::StatusCode;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Shared application state for the HTTP server.
pub struct AppState {
    pub index: IndexHandle,
    /// Display metadata keyed by item id; may be empty.
    pub items: HashMap<String, ItemInfo>,
    pub search: SearchParams,
    /// Source file for `POST /admin/reload`.
    pub index_path: Option<PathBuf>,
    pub metrics: RwLock<MetricsCollector>,
}

impl AppState {
    pub fn new(index: ForestIndex, search: SearchParams) -> Self {
        Self {
            index: IndexHandle::new(index),
            items: HashMap::new(),
            search,
            index_path: None,
            metrics: RwLock::new(MetricsCollector::new()),
        }
    }

    pub fn with_items(mut self, items: HashMap<String, ItemInfo>) -> Self {
        self.items = items;
        self
    }

    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Status code for a per-request error, counting it in the metrics.
    pub fn classify(&self, err: &ForestError) -> StatusCode {
        let status = status_for(err);
        if let Ok(mut metrics) = self.metrics.write() {
            match status {
                StatusCode::NOT_FOUND => metrics.record_not_found(),
                StatusCode::BAD_REQUEST => metrics.record_bad_request(),
                _ => {}
            }
        }
        status
    }
}

/// Unknown items are 404, malformed requests 400, everything else 500.
pub fn status_for(err: &ForestError) -> StatusCode {
    if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if err.is_bad_request() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Serve `state` on `addr` until the process is stopped.
pub async fn start(addr: &str, state: AppState) -> anyhow::Result<()> {
    let app = routes::create_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "recommendation server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
