// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normal generation.
//!
//! Two strategies are provided:
//! - [`flat_normals`]: one unit normal per triangle, written to all three of
//!   its vertices. Used for STL-style buffers where no vertex is shared.
//! - [`calculate_normals`]: area-weighted vertex normals. Unnormalised face
//!   cross products are accumulated per vertex (so larger faces weigh more)
//!   and renormalised once at the end.
//!
//! Degenerate results fall back to +Z in both cases.

use nalgebra::Vector3;

const FALLBACK: [f32; 3] = [0.0, 0.0, 1.0];

#[inline]
fn vertex(positions: &[f32], index: usize) -> Vector3<f64> {
    Vector3::new(
        positions[index * 3] as f64,
        positions[index * 3 + 1] as f64,
        positions[index * 3 + 2] as f64,
    )
}

#[inline]
fn unit_or_fallback(v: Vector3<f64>) -> [f32; 3] {
    let len = v.norm();
    if len > 0.0 && len.is_finite() {
        let n = v / len;
        [n.x as f32, n.y as f32, n.z as f32]
    } else {
        FALLBACK
    }
}

/// Unit normal of triangle `(a, b, c)`: the cross product of the two edges
/// leaving `a`. Falls back to +Z when the triangle has no area.
#[inline]
pub fn face_normal(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [f32; 3] {
    let a = Vector3::new(a[0] as f64, a[1] as f64, a[2] as f64);
    let b = Vector3::new(b[0] as f64, b[1] as f64, b[2] as f64);
    let c = Vector3::new(c[0] as f64, c[1] as f64, c[2] as f64);
    unit_or_fallback((b - a).cross(&(c - a)))
}

/// Flat shading normals: one normal per triangle replicated to its three
/// vertices. Vertices referenced by several triangles keep the normal of the
/// last triangle that touches them.
pub fn flat_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let mut normals = vec![0.0f32; positions.len()];

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let v0 = vertex(positions, i0);
        let v1 = vertex(positions, i1);
        let v2 = vertex(positions, i2);
        let n = unit_or_fallback((v1 - v0).cross(&(v2 - v0)));

        for i in [i0, i1, i2] {
            normals[i * 3..i * 3 + 3].copy_from_slice(&n);
        }
    }

    normals
}

/// Calculate smooth, area-weighted vertex normals for an indexed mesh
pub fn calculate_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    if vertex_count == 0 {
        return Vec::new();
    }

    // Initialize normals to zero
    let mut accumulated = vec![Vector3::<f64>::zeros(); vertex_count];

    // Accumulate face normals
    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let v0 = vertex(positions, i0);
        let v1 = vertex(positions, i1);
        let v2 = vertex(positions, i2);

        // Length of the cross product is twice the triangle area
        let normal = (v1 - v0).cross(&(v2 - v0));

        accumulated[i0] += normal;
        accumulated[i1] += normal;
        accumulated[i2] += normal;
    }

    // Normalize and write back
    let mut normals = Vec::with_capacity(vertex_count * 3);
    for n in accumulated {
        normals.extend_from_slice(&unit_or_fallback(n));
    }
    normals
}
