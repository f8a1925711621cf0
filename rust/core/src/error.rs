// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for parsing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning raw bytes into an assembly
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed {format} input: {message}")]
    Malformed { format: &'static str, message: String },

    #[error("Unsupported format '{format}': {recommendation}")]
    Unsupported {
        format: String,
        recommendation: String,
    },

    #[error("Geometry kernel failed: {0}")]
    Kernel(String),

    #[error("Mesh import failed: {0}")]
    Import(String),

    #[error("Invalid assembly: {0}")]
    InvalidAssembly(String),

    #[error("Geometry error: {0}")]
    Geometry(#[from] cadlite_geometry::Error),
}

impl Error {
    /// Shorthand for a malformed-input error
    pub fn malformed(format: &'static str, message: impl Into<String>) -> Self {
        Error::Malformed {
            format,
            message: message.into(),
        }
    }
}
