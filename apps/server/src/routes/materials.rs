// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::types::MaterialsResponse;
use crate::AppState;
use axum::{extract::State, Json};

/// GET /api/v1/materials - Base names of loaded material libraries.
pub async fn list(State(state): State<AppState>) -> Json<MaterialsResponse> {
    Json(MaterialsResponse {
        libraries: state.loader.materials().names(),
    })
}
