// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Legacy scene formats (3DS) via an external mesh importer.
//!
//! The importer yields a scene graph; [`assembly_from_scene`] flattens it
//! into one root part per mesh-bearing node, keeping the node's world
//! transform. Only the material color is carried over.

use crate::format::FormatTag;
use crate::model::{Assembly, Part, PartMetadata, SourceFile};
use crate::{Error, Result};
use async_trait::async_trait;
use cadlite_geometry::{Geometry, Transform, IDENTITY};
use std::sync::Arc;

/// Triangle mesh attached to a scene node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    pub positions: Vec<f32>,
    pub normals: Option<Vec<f32>>,
    /// Sequential triangles when absent
    pub indices: Option<Vec<u32>>,
    /// RGB, 0-1
    pub color: Option<[f32; 3]>,
}

/// Scene graph node as produced by the importer
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    /// Column-major world transform
    pub world_transform: Transform,
    pub mesh: Option<ImportedMesh>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>, children: Vec<SceneNode>) -> Self {
        Self {
            name: name.into(),
            world_transform: IDENTITY,
            mesh: None,
            children,
        }
    }

    pub fn leaf(name: impl Into<String>, world_transform: Transform, mesh: ImportedMesh) -> Self {
        Self {
            name: name.into(),
            world_transform,
            mesh: Some(mesh),
            children: Vec::new(),
        }
    }
}

/// External service that reads legacy triangle-mesh scenes
#[async_trait]
pub trait MeshImporter: Send + Sync {
    async fn import(&self, blob: Arc<[u8]>, file_name: &str) -> Result<SceneNode>;
}

/// Flatten a scene graph: depth-first, one root part per node with a mesh
pub fn assembly_from_scene(root: &SceneNode, source: &SourceFile) -> Result<Assembly> {
    let mut parts = Vec::new();
    let mut geometries = Vec::new();

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        // Reverse so children come out in declaration order
        stack.extend(node.children.iter().rev());

        let Some(mesh) = &node.mesh else {
            continue;
        };
        if mesh.positions.is_empty() {
            continue;
        }

        let i = parts.len();
        let vertex_count = mesh.positions.len() / 3;
        if mesh.positions.len() % 3 != 0 {
            return Err(Error::Import(format!(
                "node '{}': position buffer length {} is not a multiple of 3",
                node.name,
                mesh.positions.len()
            )));
        }
        let indices = mesh
            .indices
            .clone()
            .unwrap_or_else(|| (0..vertex_count as u32).collect());
        if indices.len() % 3 != 0 || indices.iter().any(|&ix| ix as usize >= vertex_count) {
            return Err(Error::Import(format!("node '{}': invalid index buffer", node.name)));
        }
        let normals = mesh
            .normals
            .clone()
            .filter(|n| n.len() == mesh.positions.len())
            .unwrap_or_default();

        let geometry = Geometry::new(format!("geometry-{}", i), mesh.positions.clone(), normals, indices, None);

        let name = if node.name.is_empty() {
            format!("Mesh {}", i + 1)
        } else {
            node.name.clone()
        };
        let mut part = Part::new(format!("part-{}", i), name, &geometry).with_transform(node.world_transform);
        if let Some(color) = mesh.color {
            part = part.with_metadata(PartMetadata {
                color: Some(color),
                ..Default::default()
            });
        }

        parts.push(part);
        geometries.push(geometry);
    }

    if parts.is_empty() {
        return Err(Error::Import("scene contains no meshes".to_string()));
    }

    Ok(Assembly::from_parts(source, FormatTag::LegacyMesh, parts, geometries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(color: Option<[f32; 3]>) -> ImportedMesh {
        ImportedMesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: None,
            indices: None,
            color,
        }
    }

    struct FixedImporter;

    #[async_trait]
    impl MeshImporter for FixedImporter {
        async fn import(&self, _blob: Arc<[u8]>, _file_name: &str) -> Result<SceneNode> {
            let mut moved = IDENTITY;
            moved[12] = 5.0;
            Ok(SceneNode::group(
                "root",
                vec![
                    SceneNode::leaf("wheel", moved, triangle(Some([0.1, 0.1, 0.1]))),
                    SceneNode::group("chassis", vec![SceneNode::leaf("door", IDENTITY, triangle(None))]),
                ],
            ))
        }
    }

    #[tokio::test]
    async fn test_flatten_scene() {
        let source = SourceFile::new("hash", "car.3ds", 10);
        let scene = FixedImporter.import(Arc::from(&b"3ds"[..]), "car.3ds").await.unwrap();
        let assembly = assembly_from_scene(&scene, &source).unwrap();

        let names: Vec<_> = assembly.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["wheel", "door"]);
        assert_eq!(assembly.parts[0].transform[12], 5.0);
        assert_eq!(assembly.parts[0].color(), Some([0.1, 0.1, 0.1]));
        assert_eq!(assembly.parts[1].color(), None);
        assert_eq!(assembly.root_part_ids.len(), 2);
        assert_eq!(assembly.format, FormatTag::LegacyMesh);
        // Normals computed for meshes that had none
        assert_eq!(assembly.geometries["geometry-1"].normals.len(), 9);

        let bounds = assembly.world_bounds().unwrap();
        assert_eq!(bounds.max[0], 6.0);
        assert!(assembly.validate().is_ok());
    }

    #[test]
    fn test_empty_scene_rejected() {
        let source = SourceFile::new("hash", "empty.3ds", 10);
        let scene = SceneNode::group("root", Vec::new());
        assert!(matches!(assembly_from_scene(&scene, &source), Err(Error::Import(_))));
    }
}
