// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Health check endpoint.

use axum::Json;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
}

/// API information response.
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

/// Endpoint information.
#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/api/v1/health", "Health check endpoint"),
    ("POST", "/api/v1/load", "Load one uploaded file (multipart)"),
    ("POST", "/api/v1/load/batch", "Load a model with its material libraries (multipart)"),
    ("POST", "/api/v1/load/url", "Download and load a file"),
    ("POST", "/api/v1/load/stream", "Load with progress (Server-Sent Events)"),
    ("GET", "/api/v1/cache/stats", "Cache occupancy"),
    ("DELETE", "/api/v1/cache", "Clear both cache tiers"),
    ("GET", "/api/v1/materials", "Material libraries held by the session"),
];

/// GET /api/v1/health - Health check endpoint.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "cadlite-server",
    })
}

/// GET / - API information endpoint.
pub async fn info() -> Json<ApiInfoResponse> {
    Json(ApiInfoResponse {
        service: "cadlite-server",
        version: env!("CARGO_PKG_VERSION"),
        description: "CAD file loading with a two-tier content cache",
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}
