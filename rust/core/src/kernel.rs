// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary-representation (STEP) input via an external geometry kernel.
//!
//! Curve and surface tessellation is not done here. A [`GeometryKernel`]
//! turns raw bytes into triangle meshes; this module normalises whatever
//! array shapes the kernel returned into flat buffers and builds the
//! assembly. The flat/nested ambiguity is decoded exactly once, into
//! [`KernelArray`] / [`KernelIndices`], and never inspected again.

use crate::format::FormatTag;
use crate::model::{Assembly, Part, PartMetadata, SourceFile};
use crate::{Error, Result};
use async_trait::async_trait;
use cadlite_geometry::{calculate_normals, Geometry};

const FORMAT: &str = "STEP";

/// Vertex attribute array as emitted by a kernel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum KernelArray {
    Flat(Vec<f32>),
    Nested(Vec<[f32; 3]>),
}

impl KernelArray {
    /// Flatten to `x, y, z` triplets
    pub fn into_flat(self) -> Vec<f32> {
        match self {
            KernelArray::Flat(values) => values,
            KernelArray::Nested(triplets) => triplets.into_iter().flatten().collect(),
        }
    }
}

/// Triangle index array as emitted by a kernel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum KernelIndices {
    Flat(Vec<u32>),
    Nested(Vec<[u32; 3]>),
}

impl KernelIndices {
    pub fn into_flat(self) -> Vec<u32> {
        match self {
            KernelIndices::Flat(values) => values,
            KernelIndices::Nested(triangles) => triangles.into_iter().flatten().collect(),
        }
    }
}

/// One tessellated body
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelMesh {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    pub positions: KernelArray,
    #[cfg_attr(feature = "serde", serde(default))]
    pub normals: Option<KernelArray>,
    pub indices: KernelIndices,
    /// RGB in 0-255
    #[cfg_attr(feature = "serde", serde(default))]
    pub color: Option<[f32; 3]>,
}

/// Kernel response
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernelOutput {
    pub success: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub meshes: Vec<KernelMesh>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub error: Option<String>,
}

/// External service that tessellates boundary-representation files
#[async_trait]
pub trait GeometryKernel: Send + Sync {
    /// Tessellate raw file bytes into meshes
    async fn tessellate(&self, bytes: &[u8]) -> Result<KernelOutput>;
}

/// Build an assembly from kernel output: one root part per mesh.
///
/// Fails when the kernel reports failure or returns no meshes. Missing
/// normals are computed area-weighted per vertex.
pub fn assembly_from_kernel(output: KernelOutput, source: &SourceFile) -> Result<Assembly> {
    if !output.success {
        return Err(Error::Kernel(
            output
                .error
                .unwrap_or_else(|| "kernel reported failure".to_string()),
        ));
    }
    if output.meshes.is_empty() {
        return Err(Error::Kernel("kernel returned no meshes".to_string()));
    }

    let mut parts = Vec::with_capacity(output.meshes.len());
    let mut geometries = Vec::with_capacity(output.meshes.len());

    for (i, mesh) in output.meshes.into_iter().enumerate() {
        let positions = mesh.positions.into_flat();
        let indices = mesh.indices.into_flat();

        if positions.len() % 3 != 0 {
            return Err(Error::malformed(
                FORMAT,
                format!("mesh {}: {} position values is not a multiple of 3", i, positions.len()),
            ));
        }
        if indices.len() % 3 != 0 {
            return Err(Error::malformed(
                FORMAT,
                format!("mesh {}: {} indices is not a multiple of 3", i, indices.len()),
            ));
        }

        let vertex_count = positions.len() / 3;
        if let Some(&bad) = indices.iter().find(|&&ix| ix as usize >= vertex_count) {
            return Err(Error::malformed(
                FORMAT,
                format!("mesh {}: index {} out of range for {} vertices", i, bad, vertex_count),
            ));
        }

        let normals = match mesh.normals.map(KernelArray::into_flat) {
            Some(n) if n.len() == positions.len() => n,
            _ => calculate_normals(&positions, &indices),
        };

        let geometry = Geometry::new(format!("geometry-{}", i), positions, normals, indices, None);
        geometry
            .validate()
            .map_err(|e| Error::malformed(FORMAT, format!("mesh {}: {}", i, e)))?;

        let name = mesh.name.unwrap_or_else(|| format!("Body {}", i + 1));
        let mut part = Part::new(format!("part-{}", i), name, &geometry);
        if let Some([r, g, b]) = mesh.color {
            part = part.with_metadata(PartMetadata {
                color: Some([
                    (r / 255.0).clamp(0.0, 1.0),
                    (g / 255.0).clamp(0.0, 1.0),
                    (b / 255.0).clamp(0.0, 1.0),
                ]),
                ..Default::default()
            });
        }

        parts.push(part);
        geometries.push(geometry);
    }

    Ok(Assembly::from_parts(source, FormatTag::Step, parts, geometries))
}
