// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon fan triangulation.
//!
//! An n-gon is split into `n - 2` triangles `(0, i, i + 1)` for
//! `i in 1..n-1`. Every triangle shares the polygon's first vertex. No
//! convexity check is made; concave faces triangulate exactly the same way.

use crate::{Error, Result};

/// Number of triangles a fan over `n` vertices produces
#[inline]
pub fn fan_triangle_count(n: usize) -> usize {
    n.saturating_sub(2)
}

/// Fan-triangulate a polygon with `n` vertices.
/// Returns local corner indices into the polygon.
#[inline]
pub fn fan_triangulate(n: usize) -> Result<Vec<[usize; 3]>> {
    if n < 3 {
        return Err(Error::TriangulationError(format!(
            "Need at least 3 points to triangulate, got {}",
            n
        )));
    }

    // FAST PATH: Triangle - no triangulation needed
    if n == 3 {
        return Ok(vec![[0, 1, 2]]);
    }

    let mut triangles = Vec::with_capacity(n - 2);
    for i in 1..n - 1 {
        triangles.push([0, i, i + 1]);
    }
    Ok(triangles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_degenerate_polygon() {
        assert!(fan_triangulate(2).is_err());
        assert!(fan_triangulate(0).is_err());
        assert_eq!(fan_triangle_count(2), 0);
    }

    #[test]
    fn test_quad() {
        let tris = fan_triangulate(4).unwrap();
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3]]);
    }

    proptest! {
        #[test]
        fn fan_emits_n_minus_two_triangles_sharing_first_vertex(n in 3usize..64) {
            let tris = fan_triangulate(n).unwrap();
            prop_assert_eq!(tris.len(), n - 2);
            prop_assert_eq!(tris.len(), fan_triangle_count(n));
            for tri in &tris {
                prop_assert_eq!(tri[0], 0);
                prop_assert!(tri[1] < n && tri[2] < n);
            }
            // Every polygon corner is covered
            let mut seen = vec![false; n];
            for tri in &tris {
                for &c in tri {
                    seen[c] = true;
                }
            }
            prop_assert!(seen.iter().all(|&s| s));
        }
    }
}
