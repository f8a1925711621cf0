// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response types for the API.

use cadlite_core::{Assembly, FormatTag};
use cadlite_processing::ProgressEvent;
use serde::Serialize;

/// Full load response with the assembly.
#[derive(Debug, Serialize)]
pub struct LoadResponse<'a> {
    pub assembly: &'a Assembly,
    pub stats: LoadStats,
}

/// Load statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadStats {
    pub total_parts: usize,
    pub total_geometries: usize,
    pub total_triangles: usize,
    /// True for material libraries; such assemblies must not be rendered.
    pub material_only: bool,
    /// Total request handling time (ms).
    pub total_time_ms: u64,
}

impl LoadStats {
    pub fn new(assembly: &Assembly, total_time_ms: u64) -> Self {
        Self {
            total_parts: assembly.part_count(),
            total_geometries: assembly.geometries.len(),
            total_triangles: assembly.total_triangles,
            material_only: assembly.material_only,
            total_time_ms,
        }
    }
}

/// Assembly overview sent as the final streaming event.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblySummary {
    pub id: String,
    pub name: String,
    pub format: FormatTag,
    pub root_part_ids: Vec<String>,
    pub total_parts: usize,
    pub total_triangles: usize,
    pub file_size: u64,
    pub material_only: bool,
}

impl From<&Assembly> for AssemblySummary {
    fn from(assembly: &Assembly) -> Self {
        Self {
            id: assembly.id.clone(),
            name: assembly.name.clone(),
            format: assembly.format,
            root_part_ids: assembly.root_part_ids.clone(),
            total_parts: assembly.part_count(),
            total_triangles: assembly.total_triangles,
            file_size: assembly.file_size,
            material_only: assembly.material_only,
        }
    }
}

/// Server-Sent Event types for streaming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Progress(ProgressEvent),
    Complete { summary: AssemblySummary },
    Error { message: String },
}

/// Material libraries held by the session.
#[derive(Debug, Clone, Serialize)]
pub struct MaterialsResponse {
    pub libraries: Vec<String>,
}
