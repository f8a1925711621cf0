// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load endpoints.

use crate::error::ApiError;
use crate::types::{AssemblySummary, LoadResponse, LoadStats, LoadUrlRequest, StreamEvent};
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use cadlite_core::Assembly;
use cadlite_processing::{InputFile, NoProgress, ProgressEvent};
use std::convert::Infallible;
use std::time::Instant;

/// Extract every file field from a multipart request.
async fn extract_files(multipart: &mut Multipart) -> Result<Vec<InputFile>, ApiError> {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        tracing::debug!(field_name = %field_name, "Processing multipart field");

        if field_name == "file" || field_name == "files" {
            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ApiError::BadRequest("file field without a file name".into()))?;
            let bytes = field.bytes().await?;
            tracing::debug!(file = %file_name, size = bytes.len(), "Extracted file from multipart");
            files.push(InputFile::new(file_name, bytes.to_vec()));
        }
    }
    Ok(files)
}

async fn extract_file(multipart: &mut Multipart) -> Result<InputFile, ApiError> {
    let mut files = extract_files(multipart).await?;
    if files.is_empty() {
        tracing::warn!("No 'file' field found in multipart request");
        return Err(ApiError::MissingFile);
    }
    Ok(files.swap_remove(0))
}

fn respond(assembly: &Assembly, started: Instant) -> Response {
    let stats = LoadStats::new(assembly, started.elapsed().as_millis() as u64);
    Json(LoadResponse { assembly, stats }).into_response()
}

/// POST /api/v1/load - Load one uploaded file.
pub async fn load_single(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, ApiError> {
    let started = Instant::now();
    let file = extract_file(&mut multipart).await?;
    let assembly = state.loader.load_bytes(&file.name, file.bytes, &NoProgress).await?;
    Ok(respond(&assembly, started))
}

/// POST /api/v1/load/batch - Load a model together with its material libraries.
pub async fn load_batch(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, ApiError> {
    let started = Instant::now();
    let files = extract_files(&mut multipart).await?;
    if files.is_empty() {
        return Err(ApiError::MissingFile);
    }
    let assembly = state.loader.load_many(files, &NoProgress).await?;
    Ok(respond(&assembly, started))
}

/// POST /api/v1/load/url - Download and load a file.
pub async fn load_url(
    State(state): State<AppState>,
    Json(request): Json<LoadUrlRequest>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    if !(request.url.starts_with("http://") || request.url.starts_with("https://")) {
        return Err(ApiError::BadRequest(format!("not an http(s) URL: {}", request.url)));
    }
    let assembly = state.loader.load_url(&request.url, &NoProgress).await?;
    Ok(respond(&assembly, started))
}

fn sse_event(event: &StreamEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"type\":\"error\",\"message\":\"{}\"}}", e));
    Event::default().data(json)
}

/// POST /api/v1/load/stream - Load with progress as Server-Sent Events.
///
/// Emits one `progress` event per pipeline stage; a successful load ends
/// with a `complete` event carrying the assembly summary, a failed one with
/// a progress event in the `error` stage.
pub async fn load_stream(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let file = extract_file(&mut multipart).await?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    let loader = state.loader.clone();
    let task = tokio::spawn(async move {
        let sink = move |event: ProgressEvent| {
            let _ = tx.send(event);
        };
        loader.load_bytes(&file.name, file.bytes, &sink).await
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(sse_event(&StreamEvent::Progress(event)));
        }
        match task.await {
            Ok(Ok(assembly)) => {
                let summary = AssemblySummary::from(assembly.as_ref());
                yield Ok(sse_event(&StreamEvent::Complete { summary }));
            }
            // The error stage event has already been sent
            Ok(Err(_)) => {}
            Err(e) => {
                yield Ok(sse_event(&StreamEvent::Error { message: e.to_string() }));
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
