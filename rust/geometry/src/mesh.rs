// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Indexed triangle geometry

use crate::bounds::{BoundingBox, BoundingSphere};
use crate::normals::calculate_normals;
use crate::{Error, Result};

/// Indexed triangle mesh shared by every part that references it.
///
/// Buffers are flat: 3 floats per position/normal, 2 per UV, 3 indices per
/// triangle. Consumers must treat them as read-only once loaded.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    pub id: String,
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz), same length as `positions`
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
    /// Texture coordinates (u, v)
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub uvs: Option<Vec<f32>>,
    pub triangle_count: usize,
    pub bounding_sphere: BoundingSphere,
    /// Set by the renderer once it has built a BVH over this mesh
    #[cfg_attr(feature = "serde", serde(default))]
    pub has_bvh: bool,
}

impl Geometry {
    /// Build geometry from raw buffers, deriving triangle count and bounding
    /// sphere. Missing normals (empty buffer) are computed area-weighted.
    pub fn new(
        id: impl Into<String>,
        positions: Vec<f32>,
        normals: Vec<f32>,
        indices: Vec<u32>,
        uvs: Option<Vec<f32>>,
    ) -> Self {
        let normals = if normals.is_empty() && !positions.is_empty() {
            calculate_normals(&positions, &indices)
        } else {
            normals
        };
        let bounding_sphere = BoundingSphere::from_positions(&positions);
        Self {
            id: id.into(),
            triangle_count: indices.len() / 3,
            positions,
            normals,
            indices,
            uvs,
            bounding_sphere,
            has_bvh: false,
        }
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Check if geometry is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Local-space bounds
    #[inline]
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_positions(&self.positions)
    }

    /// Recompute derived fields after buffers were replaced
    pub fn refresh(&mut self) {
        if self.normals.len() != self.positions.len() {
            self.normals = calculate_normals(&self.positions, &self.indices);
        }
        self.triangle_count = self.indices.len() / 3;
        self.bounding_sphere = BoundingSphere::from_positions(&self.positions);
    }

    /// Total float/index elements held in buffers, used for size estimates
    #[inline]
    pub fn element_count(&self) -> usize {
        self.positions.len()
            + self.normals.len()
            + self.indices.len()
            + self.uvs.as_ref().map_or(0, Vec::len)
    }

    /// Check buffer invariants: index count, index range and per-vertex
    /// buffer lengths.
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 {
            return Err(Error::InvalidBuffer(format!(
                "geometry {}: position buffer length {} is not a multiple of 3",
                self.id,
                self.positions.len()
            )));
        }
        if self.indices.len() != self.triangle_count * 3 {
            return Err(Error::InvalidBuffer(format!(
                "geometry {}: {} indices for {} triangles",
                self.id,
                self.indices.len(),
                self.triangle_count
            )));
        }
        if !self.normals.is_empty() && self.normals.len() != self.positions.len() {
            return Err(Error::InvalidBuffer(format!(
                "geometry {}: {} normals for {} positions",
                self.id,
                self.normals.len(),
                self.positions.len()
            )));
        }
        if let Some(uvs) = &self.uvs {
            if uvs.len() / 2 != self.vertex_count() {
                return Err(Error::InvalidBuffer(format!(
                    "geometry {}: {} uv pairs for {} vertices",
                    self.id,
                    uvs.len() / 2,
                    self.vertex_count()
                )));
            }
        }

        let vertex_count = self.vertex_count();
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        Ok(())
    }
}
