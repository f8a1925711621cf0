// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wavefront OBJ parser.
//!
//! A single pass fills three global pools (`v`, `vn`, `vt`). Faces reference
//! them with 1-based (or negative, relative) indices as `v[/vt][/vn]`.
//! Polygons are fan-triangulated from their first corner and every triangle
//! gets its own three vertices, matching the STL layout.
//!
//! Grouping rules:
//! - `g` / `o` start a new named group.
//! - `usemtl` on a group that already has faces closes it and reopens a
//!   group with the same name under the new material, so one group never
//!   mixes materials.
//! - Groups that end up with no faces are dropped.
//!
//! Each surviving group becomes one root part backed by one geometry. Groups
//! that did not supply a normal for every corner get flat normals.

use crate::fast_parse::{parse_floats, parse_vec3, rest_after_keyword, split_keyword};
use crate::format::FormatTag;
use crate::material::MaterialTable;
use crate::model::{Assembly, Part, PartMetadata, SourceFile};
use crate::{Error, Result};
use cadlite_geometry::{fan_triangulate, flat_normals, Geometry};
use smallvec::SmallVec;

const FORMAT: &str = "OBJ";

/// Group name used before any `g`/`o` directive
const DEFAULT_GROUP: &str = "default";

/// One face corner: pool indices resolved to 0-based
#[derive(Debug, Clone, Copy)]
struct Corner {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

/// Faces collected for one (name, material) pair
#[derive(Debug)]
struct Group {
    name: String,
    material: Option<String>,
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    faces: usize,
    all_normals: bool,
    all_uvs: bool,
}

impl Group {
    fn new(name: String, material: Option<String>) -> Self {
        Self {
            name,
            material,
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            faces: 0,
            all_normals: true,
            all_uvs: true,
        }
    }
}

/// Coordinate pools shared by all groups
#[derive(Debug, Default)]
struct Pools {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
}

/// Resolve an OBJ index (1-based, or negative relative to the pool end)
fn resolve(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw: i64 = token.parse().map_err(|_| {
        Error::malformed(FORMAT, format!("line {}: invalid index '{}'", line_no, token))
    })?;
    let index = if raw > 0 {
        raw - 1
    } else if raw < 0 {
        len as i64 + raw
    } else {
        -1
    };
    if index < 0 || index as usize >= len {
        return Err(Error::malformed(
            FORMAT,
            format!("line {}: index {} out of range (pool has {})", line_no, raw, len),
        ));
    }
    Ok(index as usize)
}

fn parse_corner(token: &str, pools: &Pools, line_no: usize) -> Result<Corner> {
    let mut fields = token.split('/');
    let position = resolve(fields.next().unwrap_or(""), pools.positions.len(), line_no)?;
    let texcoord = match fields.next() {
        Some(t) if !t.is_empty() => Some(resolve(t, pools.texcoords.len(), line_no)?),
        _ => None,
    };
    let normal = match fields.next() {
        Some(n) if !n.is_empty() => Some(resolve(n, pools.normals.len(), line_no)?),
        _ => None,
    };
    Ok(Corner {
        position,
        texcoord,
        normal,
    })
}

/// Parser state across lines
struct ObjBuilder<'m> {
    pools: Pools,
    current: Group,
    finished: Vec<Group>,
    material_libraries: Vec<String>,
    materials: Option<&'m MaterialTable>,
}

impl<'m> ObjBuilder<'m> {
    fn new(materials: Option<&'m MaterialTable>) -> Self {
        Self {
            pools: Pools::default(),
            current: Group::new(DEFAULT_GROUP.to_string(), None),
            finished: Vec::new(),
            material_libraries: Vec::new(),
            materials,
        }
    }

    /// Close the current group and open another
    fn start_group(&mut self, name: String, material: Option<String>) {
        let next = Group::new(name, material);
        let done = std::mem::replace(&mut self.current, next);
        if done.faces > 0 {
            self.finished.push(done);
        }
    }

    fn use_material(&mut self, material: String) {
        if self.current.material.as_deref() == Some(material.as_str()) {
            return;
        }
        if self.current.faces > 0 {
            let name = self.current.name.clone();
            self.start_group(name, Some(material));
        } else {
            self.current.material = Some(material);
        }
    }

    fn add_face<'a>(&mut self, tokens: impl Iterator<Item = &'a str>, line_no: usize) -> Result<()> {
        let corners: SmallVec<[Corner; 4]> = tokens
            .map(|t| parse_corner(t, &self.pools, line_no))
            .collect::<Result<_>>()?;

        let triangles = fan_triangulate(corners.len()).map_err(|_| {
            Error::malformed(
                FORMAT,
                format!("line {}: face has {} vertices, need at least 3", line_no, corners.len()),
            )
        })?;

        let group = &mut self.current;
        for tri in triangles {
            for &local in &tri {
                let corner = corners[local];
                group.positions.extend_from_slice(&self.pools.positions[corner.position]);
                match corner.normal {
                    Some(n) => group.normals.extend_from_slice(&self.pools.normals[n]),
                    None => group.all_normals = false,
                }
                match corner.texcoord {
                    Some(t) => group.uvs.extend_from_slice(&self.pools.texcoords[t]),
                    None => group.all_uvs = false,
                }
            }
        }
        group.faces += 1;
        Ok(())
    }

    fn finish(mut self, source: &SourceFile) -> Result<Assembly> {
        self.start_group(String::new(), None);

        if self.finished.is_empty() {
            return Err(Error::malformed(FORMAT, "file contains no faces"));
        }

        let mut parts = Vec::with_capacity(self.finished.len());
        let mut geometries = Vec::with_capacity(self.finished.len());

        for (i, group) in self.finished.into_iter().enumerate() {
            let vertex_count = (group.positions.len() / 3) as u32;
            let indices: Vec<u32> = (0..vertex_count).collect();
            let normals = if group.all_normals {
                group.normals
            } else {
                flat_normals(&group.positions, &indices)
            };
            let uvs = if group.all_uvs && !group.uvs.is_empty() {
                Some(group.uvs)
            } else {
                None
            };

            let geometry = Geometry::new(format!("geometry-{}", i), group.positions, normals, indices, uvs);

            let mut part = Part::new(format!("part-{}", i), group.name, &geometry);
            if let Some(material) = group.material {
                let color = self
                    .materials
                    .and_then(|table| table.get(&material))
                    .map(|m| m.to_pbr().base_color);
                part = part.with_metadata(PartMetadata {
                    material: Some(material),
                    color,
                    ..Default::default()
                });
            }

            parts.push(part);
            geometries.push(geometry);
        }

        let mut assembly = Assembly::from_parts(source, FormatTag::Obj, parts, geometries);
        if !self.material_libraries.is_empty() {
            if let Some(metadata) = assembly.metadata.as_mut() {
                metadata
                    .properties
                    .insert("mtllib".to_string(), self.material_libraries.join(";"));
            }
        }
        Ok(assembly)
    }
}

/// Parse OBJ text. `materials` is the already-resolved table from the
/// companion `.mtl`, if the caller has one.
pub fn parse_obj(bytes: &[u8], source: &SourceFile, materials: Option<&MaterialTable>) -> Result<Assembly> {
    let text = String::from_utf8_lossy(bytes);
    let mut builder = ObjBuilder::new(materials);

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((keyword, mut tokens)) = split_keyword(line) else {
            continue;
        };

        match keyword {
            "v" => {
                let p = parse_vec3(&mut tokens).ok_or_else(|| {
                    Error::malformed(FORMAT, format!("line {}: invalid vertex", line_no))
                })?;
                builder.pools.positions.push(p);
            }
            "vn" => {
                let n = parse_vec3(&mut tokens).ok_or_else(|| {
                    Error::malformed(FORMAT, format!("line {}: invalid normal", line_no))
                })?;
                builder.pools.normals.push(n);
            }
            "vt" => {
                // `vt u [v [w]]`: w is dropped, missing v is 0
                let t: [f32; 2] = parse_floats(&mut tokens, 0.0).ok_or_else(|| {
                    Error::malformed(FORMAT, format!("line {}: invalid texture coordinate", line_no))
                })?;
                builder.pools.texcoords.push(t);
            }
            "f" => builder.add_face(tokens, line_no)?,
            "g" | "o" => {
                let name = rest_after_keyword(line);
                let name = if name.is_empty() { DEFAULT_GROUP } else { name };
                let material = builder.current.material.clone();
                builder.start_group(name.to_string(), material);
            }
            "usemtl" => builder.use_material(rest_after_keyword(line).to_string()),
            "mtllib" => builder
                .material_libraries
                .push(rest_after_keyword(line).to_string()),
            // s, l, p, and vendor extensions
            _ => {}
        }
    }

    builder.finish(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::parse_mtl;
    use proptest::prelude::*;

    fn source() -> SourceFile {
        SourceFile::new("hash", "model.obj", 0)
    }

    #[test]
    fn test_unit_square_quad() {
        let text = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let assembly = parse_obj(text.as_bytes(), &source(), None).unwrap();
        assert_eq!(assembly.total_triangles, 2);
        assert_eq!(assembly.parts.len(), 1);

        let geometry = &assembly.geometries["geometry-0"];
        // Fan: (1,2,3) and (1,3,4)
        assert_eq!(
            geometry.positions,
            vec![
                0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
            ]
        );
        // All four corners covered
        for corner in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]] {
            assert!(geometry.positions.chunks_exact(3).any(|p| p == corner));
        }
        // Flat normals computed
        assert!(geometry.normals.chunks_exact(3).all(|n| n == [0.0, 0.0, 1.0]));
        assert!(assembly.validate().is_ok());
    }

    #[test]
    fn test_ngon_fan_includes_first_vertex() {
        let text = "v 0 0 0\nv 1 0 0\nv 2 1 0\nv 1 2 0\nv 0 2 0\nv -1 1 0\nf 1 2 3 4 5 6\n";
        let assembly = parse_obj(text.as_bytes(), &source(), None).unwrap();
        let geometry = &assembly.geometries["geometry-0"];
        assert_eq!(geometry.triangle_count, 4);
        for tri in geometry.positions.chunks_exact(9) {
            assert_eq!(&tri[0..3], &[0.0, 0.0, 0.0]);
        }
    }

    #[test]
    fn test_supplied_normals_and_uvs() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 -1\nf 1/1/1 2/2/1 3/3/1\n";
        let assembly = parse_obj(text.as_bytes(), &source(), None).unwrap();
        let geometry = &assembly.geometries["geometry-0"];
        assert!(geometry.normals.chunks_exact(3).all(|n| n == [0.0, 0.0, -1.0]));
        assert_eq!(geometry.uvs.as_deref(), Some(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0][..]));
    }

    #[test]
    fn test_negative_and_normal_only_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 1 0 0\nf -3//1 -2//1 -1//1\n";
        let assembly = parse_obj(text.as_bytes(), &source(), None).unwrap();
        let geometry = &assembly.geometries["geometry-0"];
        assert_eq!(&geometry.normals[0..3], &[1.0, 0.0, 0.0]);
        assert!(geometry.uvs.is_none());
    }

    #[test]
    fn test_groups_and_usemtl_split() {
        let text = "\
mtllib parts.mtl
v 0 0 0
v 1 0 0
v 0 1 0
g empty
g body
usemtl Red
f 1 2 3
usemtl Blue
f 1 3 2
o lid
f 1 2 3
";
        let materials = parse_mtl("newmtl Red\nKd 1 0 0\nnewmtl Blue\nKd 0 0 1\n");
        let assembly = parse_obj(text.as_bytes(), &source(), Some(&materials)).unwrap();

        let names: Vec<_> = assembly.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["body", "body", "lid"]);
        assert_eq!(assembly.parts[0].color(), Some([1.0, 0.0, 0.0]));
        assert_eq!(assembly.parts[1].color(), Some([0.0, 0.0, 1.0]));
        // Material carries over into the next group
        assert_eq!(
            assembly.parts[2].metadata.as_ref().unwrap().material.as_deref(),
            Some("Blue")
        );
        assert_eq!(assembly.root_part_ids.len(), 3);
        assert!(assembly.parts.iter().all(|p| p.parent_id.is_none()));
        assert_eq!(
            assembly.metadata.as_ref().unwrap().properties.get("mtllib").map(String::as_str),
            Some("parts.mtl")
        );
        assert!(assembly.validate().is_ok());
    }

    #[test]
    fn test_repeated_usemtl_keeps_one_group() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Red\nf 1 2 3\nusemtl Red\nf 1 3 2\n";
        let assembly = parse_obj(text.as_bytes(), &source(), None).unwrap();
        assert_eq!(assembly.parts.len(), 1);
        assert_eq!(assembly.total_triangles, 2);
        assert_eq!(
            assembly.parts[0].metadata.as_ref().unwrap().material.as_deref(),
            Some("Red")
        );
    }

    #[test]
    fn test_unknown_material_keeps_name_without_color() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl Missing\nf 1 2 3\n";
        let assembly = parse_obj(text.as_bytes(), &source(), None).unwrap();
        let metadata = assembly.parts[0].metadata.as_ref().unwrap();
        assert_eq!(metadata.material.as_deref(), Some("Missing"));
        assert_eq!(metadata.color, None);
    }

    #[test]
    fn test_errors() {
        assert!(parse_obj(b"v 0 0 0\n", &source(), None).is_err());
        assert!(parse_obj(b"v 0 0 0\nv 1 0 0\nf 1 2\n", &source(), None).is_err());
        assert!(parse_obj(b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n", &source(), None).is_err());
        assert!(parse_obj(b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n", &source(), None).is_err());
    }

    proptest! {
        #[test]
        fn ngon_face_yields_fan_from_first_corner(n in 3usize..24) {
            let mut text = String::new();
            for i in 0..n {
                let angle = i as f32 / n as f32 * std::f32::consts::TAU;
                text.push_str(&format!("v {} {} 0\n", angle.cos() + 2.0, angle.sin()));
            }
            let corners: Vec<String> = (1..=n).map(|i| i.to_string()).collect();
            text.push_str(&format!("f {}\n", corners.join(" ")));

            let assembly = parse_obj(text.as_bytes(), &source(), None).unwrap();
            let geometry = &assembly.geometries["geometry-0"];
            prop_assert_eq!(geometry.triangle_count, n - 2);
            prop_assert_eq!(assembly.total_triangles, n - 2);

            let first = &geometry.positions[0..3];
            for tri in geometry.positions.chunks_exact(9) {
                prop_assert_eq!(&tri[0..3], first);
            }
        }
    }
}
