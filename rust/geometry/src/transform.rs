// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 4x4 affine transforms stored as flat column-major arrays.

use nalgebra::{Matrix4, Point3};

/// Column-major 4x4 matrix, the layout renderers consume directly
pub type Transform = [f32; 16];

/// Identity transform
pub const IDENTITY: Transform = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// View a flat transform as an nalgebra matrix
#[inline]
pub fn to_matrix(transform: &Transform) -> Matrix4<f32> {
    Matrix4::from_column_slice(transform)
}

/// Transform a point (w = 1)
#[inline]
pub fn transform_point(transform: &Transform, point: [f32; 3]) -> [f32; 3] {
    let p = to_matrix(transform).transform_point(&Point3::new(point[0], point[1], point[2]));
    [p.x, p.y, p.z]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roundtrip() {
        assert_eq!(to_matrix(&IDENTITY), Matrix4::identity());
        assert_eq!(transform_point(&IDENTITY, [1.0, 2.0, 3.0]), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_translation_is_column_major() {
        let mut t = IDENTITY;
        t[12] = 5.0;
        t[13] = 6.0;
        t[14] = 7.0;
        assert_eq!(transform_point(&t, [1.0, 1.0, 1.0]), [6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_scale_and_translate() {
        let mut t = IDENTITY;
        t[0] = 2.0;
        t[5] = 2.0;
        t[10] = 2.0;
        t[12] = 1.0;
        assert_eq!(transform_point(&t, [1.0, 0.0, 0.0]), [3.0, 0.0, 0.0]);
    }
}
