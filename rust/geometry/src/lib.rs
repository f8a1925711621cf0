//! CAD-Lite Geometry
//!
//! Pure geometry math shared by every format parser: indexed triangle
//! buffers, bounding volumes, normal generation and polygon fan
//! triangulation. Uses nalgebra for vector math; no state.

pub mod bounds;
pub mod error;
pub mod mesh;
pub mod normals;
pub mod transform;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, Vector3};

pub use bounds::{BoundingBox, BoundingSphere};
pub use error::{Error, Result};
pub use mesh::Geometry;
pub use normals::{calculate_normals, face_normal, flat_normals};
pub use transform::{Transform, IDENTITY};
pub use triangulation::{fan_triangulate, fan_triangle_count};
