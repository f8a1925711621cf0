// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes and bounding spheres.
//!
//! Both volumes are derived deterministically from a flat position buffer
//! (`x, y, z` triplets). The sphere is centred on the box centre and its
//! radius is the exact maximum vertex distance, never a looser bound.

use crate::transform::{transform_point, Transform};
use nalgebra::Vector3;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    /// Create a box from explicit corners
    #[inline]
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Compute the box enclosing every vertex of a flat position buffer.
    ///
    /// An empty buffer yields a degenerate box at the origin.
    pub fn from_positions(positions: &[f32]) -> Self {
        if positions.len() < 3 {
            return Self::default();
        }

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];

        positions.chunks_exact(3).for_each(|chunk| {
            for axis in 0..3 {
                min[axis] = min[axis].min(chunk[axis]);
                max[axis] = max[axis].max(chunk[axis]);
            }
        });

        Self { min, max }
    }

    /// Centre point of the box
    #[inline]
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Edge lengths along each axis
    #[inline]
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Smallest box containing both `self` and `other`
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut out = *self;
        for axis in 0..3 {
            out.min[axis] = out.min[axis].min(other.min[axis]);
            out.max[axis] = out.max[axis].max(other.max[axis]);
        }
        out
    }

    /// Whether a point lies inside the box (inclusive)
    #[inline]
    pub fn contains(&self, point: [f32; 3]) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    /// Box enclosing the eight corners of this box after `transform`
    pub fn transformed(&self, transform: &Transform) -> BoundingBox {
        let mut corners = Vec::with_capacity(24);
        for &x in &[self.min[0], self.max[0]] {
            for &y in &[self.min[1], self.max[1]] {
                for &z in &[self.min[2], self.max[2]] {
                    corners.extend_from_slice(&transform_point(transform, [x, y, z]));
                }
            }
        }
        BoundingBox::from_positions(&corners)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: [0.0; 3],
            max: [0.0; 3],
        }
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingSphere {
    pub center: [f32; 3],
    /// Always >= 0
    pub radius: f32,
}

impl BoundingSphere {
    /// Compute the sphere around the bounding-box centre whose radius is the
    /// largest centre-to-vertex distance.
    pub fn from_positions(positions: &[f32]) -> Self {
        if positions.len() < 3 {
            return Self::default();
        }

        let center = BoundingBox::from_positions(positions).center();
        let c = Vector3::new(center[0] as f64, center[1] as f64, center[2] as f64);

        // Accumulate in f64 so the radius never rounds below a vertex distance
        let max_sq = positions
            .chunks_exact(3)
            .map(|p| {
                let v = Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64);
                (v - c).norm_squared()
            })
            .fold(0.0f64, f64::max);

        let mut radius = max_sq.sqrt() as f32;
        // Round up by one ulp if the f32 cast truncated below the true distance
        if (radius as f64) < max_sq.sqrt() {
            radius = f32::from_bits(radius.to_bits() + 1);
        }

        Self { center, radius }
    }

    /// Whether a point lies within `radius + epsilon` of the centre
    #[inline]
    pub fn contains(&self, point: [f32; 3], epsilon: f32) -> bool {
        let dx = point[0] as f64 - self.center[0] as f64;
        let dy = point[1] as f64 - self.center[1] as f64;
        let dz = point[2] as f64 - self.center[2] as f64;
        (dx * dx + dy * dy + dz * dz).sqrt() <= (self.radius + epsilon) as f64
    }
}
