// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for load operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Fatal load failures. A load either returns a complete assembly or one
/// of these; nothing half-populated is ever handed out.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File is too large: {actual_mb:.1} MB exceeds the maximum of {max_mb:.0} MB")]
    SizeExceeded { actual_mb: f64, max_mb: f64 },

    #[error("Unsupported format '{format}': {recommendation}")]
    UnsupportedFormat {
        format: String,
        recommendation: String,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Transport failure: {0}")]
    Transport(String),
}

const MB: f64 = 1024.0 * 1024.0;

impl LoadError {
    pub fn size_exceeded(actual_bytes: u64, max_bytes: u64) -> Self {
        LoadError::SizeExceeded {
            actual_mb: actual_bytes as f64 / MB,
            max_mb: max_bytes as f64 / MB,
        }
    }
}

impl From<cadlite_core::Error> for LoadError {
    fn from(err: cadlite_core::Error) -> Self {
        match err {
            cadlite_core::Error::Unsupported {
                format,
                recommendation,
            } => LoadError::UnsupportedFormat {
                format,
                recommendation,
            },
            other => LoadError::MalformedInput(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for LoadError {
    fn from(err: tokio::task::JoinError) -> Self {
        LoadError::MalformedInput(format!("parser task failed: {}", err))
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        LoadError::Transport(err.to_string())
    }
}

/// Cache tier failures. Never surfaced from a load: logged and treated as
/// a miss or a no-op store.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(#[from] cacache::Error),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        CacheError::Task(err.to_string())
    }
}
