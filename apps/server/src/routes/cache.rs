// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cache administration endpoints.

use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use cadlite_processing::CacheStats;

/// GET /api/v1/cache/stats - Cache occupancy.
pub async fn stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.loader.cache().stats())
}

/// DELETE /api/v1/cache - Clear both tiers.
pub async fn clear(State(state): State<AppState>) -> StatusCode {
    state.loader.cache().clear().await;
    tracing::info!("Cache cleared");
    StatusCode::NO_CONTENT
}
