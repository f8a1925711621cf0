// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load progress events.

use serde::Serialize;

/// Pipeline stage reported with each event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetching,
    Parsing,
    Optimizing,
    Building,
    Complete,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: Stage,
    /// 0-100
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_loaded: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts_loaded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts_total: Option<usize>,
}

impl ProgressEvent {
    pub fn new(stage: Stage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.min(100),
            message: message.into(),
            bytes_loaded: None,
            bytes_total: None,
            parts_loaded: None,
            parts_total: None,
        }
    }

    pub fn with_bytes(mut self, loaded: u64, total: Option<u64>) -> Self {
        self.bytes_loaded = Some(loaded);
        self.bytes_total = total;
        self
    }

    pub fn with_parts(mut self, loaded: usize, total: usize) -> Self {
        self.parts_loaded = Some(loaded);
        self.parts_total = Some(total);
        self
    }
}

/// Receiver of progress events. Implemented for any `Fn(ProgressEvent)`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Enforces ordering on one load's events: progress never decreases and
/// nothing follows a terminal `complete` or `error` event.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    last: u8,
    finished: bool,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last: 0,
            finished: false,
        }
    }

    pub(crate) fn emit(&mut self, mut event: ProgressEvent) {
        if self.finished {
            return;
        }
        event.progress = event.progress.max(self.last).min(100);
        self.last = event.progress;
        if matches!(event.stage, Stage::Complete | Stage::Error) {
            self.finished = true;
        }
        self.sink.report(event);
    }

    pub(crate) fn stage(&mut self, stage: Stage, progress: u8, message: impl Into<String>) {
        self.emit(ProgressEvent::new(stage, progress, message));
    }

    pub(crate) fn complete(&mut self, message: impl Into<String>, parts: usize) {
        self.emit(ProgressEvent::new(Stage::Complete, 100, message).with_parts(parts, parts));
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        let progress = self.last;
        self.emit(ProgressEvent::new(Stage::Error, progress, message));
    }
}
