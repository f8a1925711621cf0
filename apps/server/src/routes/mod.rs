// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP routes.

pub mod cache;
pub mod health;
pub mod load;
pub mod materials;

use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Multipart framing allowance on top of the file size cap
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size_bytes() as usize + MULTIPART_OVERHEAD;
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Root endpoint - API information
        .route("/", get(health::info))
        .route("/api/v1/health", get(health::check))
        // Load endpoints
        .route("/api/v1/load", post(load::load_single))
        .route("/api/v1/load/batch", post(load::load_batch))
        .route("/api/v1/load/url", post(load::load_url))
        .route("/api/v1/load/stream", post(load::load_stream))
        // Cache administration
        .route("/api/v1/cache/stats", get(cache::stats))
        .route("/api/v1/cache", axum::routing::delete(cache::clear))
        .route("/api/v1/materials", get(materials::list))
        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
