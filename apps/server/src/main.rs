// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CAD-Lite Server - loads CAD files into a unified assembly model.
//!
//! # Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `POST /api/v1/load` - Load one uploaded file (multipart)
//! - `POST /api/v1/load/batch` - Load a model with its material libraries
//! - `POST /api/v1/load/url` - Download and load a file
//! - `POST /api/v1/load/stream` - Load with progress (SSE)
//! - `GET /api/v1/cache/stats` - Cache occupancy
//! - `DELETE /api/v1/cache` - Clear the cache
//! - `GET /api/v1/materials` - Loaded material libraries

use anyhow::Context;
use cadlite_processing::{CommandKernel, ContentCache, Loader, MaterialLibrary};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod error;
mod routes;
mod types;

use config::{Config, LogFormat};

/// Interval between durable cache expiry sweeps
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub loader: Arc<Loader>,
    pub config: Arc<Config>,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug,cadlite_server=debug".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_format);

    tracing::info!(
        port = config.port,
        cache_dir = %config.cache_dir,
        max_file_size_mb = config.max_file_size_mb,
        memory_cache_entries = config.memory_cache_entries,
        worker_threads = config.worker_threads,
        kernel = config.kernel_command.as_deref().unwrap_or("none"),
        "Starting CAD-Lite Server"
    );

    // Initialize rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build_global()
        .context("Failed to initialize rayon thread pool")?;

    let loader_config = config.loader_config();
    let cache = Arc::new(ContentCache::open(&loader_config).await);
    let mut loader = Loader::new(loader_config, cache.clone(), Arc::new(MaterialLibrary::new()));
    if let Some(kernel) = config.kernel_command.as_deref().and_then(CommandKernel::from_command_line) {
        loader = loader.with_kernel(Arc::new(
            kernel.with_timeout(Duration::from_secs(config.request_timeout_secs)),
        ));
    }

    // Periodic durable cache expiry
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            cache.sweep_expired().await;
        }
    });

    let state = AppState {
        loader: Arc::new(loader),
        config: Arc::new(config.clone()),
    };
    let app = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
