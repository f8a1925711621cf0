// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STL parser (binary and ASCII).
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    – Header (ignored)
//! UINT32       – Number of triangles (little-endian)
//! foreach triangle
//!     REAL32[3] – Normal vector
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (ignored)
//! end
//! ```
//!
//! STL has no shared vertices: every triangle gets three fresh vertices with
//! sequential indices and the facet normal on each (flat shading). Buffers are
//! sized up front from the triangle count. The result is always one part
//! backed by one geometry.

use crate::fast_parse::{count_occurrences_ignore_ascii_case, parse_vec3};
use crate::format::{is_binary_stl, FormatTag};
use crate::model::{Assembly, Part, SourceFile};
use crate::{Error, Result};
use cadlite_geometry::Geometry;

/// STL binary header size in bytes.
pub const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
pub const TRIANGLE_SIZE: usize = 50;

const FORMAT: &str = "STL";

/// Parse STL, choosing binary or ASCII from the content.
///
/// A binary file whose 80-byte header happens to start with `solid` is still
/// read as binary when its declared triangle count accounts for its length.
pub fn parse_stl(bytes: &[u8], source: &SourceFile) -> Result<Assembly> {
    let looks_ascii = bytes.len() >= 5 && bytes[..5].eq_ignore_ascii_case(b"solid");
    if looks_ascii && !is_binary_stl(bytes) {
        parse_stl_ascii(bytes, source)
    } else {
        parse_stl_binary(bytes, source)
    }
}

#[inline]
fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Parse binary STL
pub fn parse_stl_binary(bytes: &[u8], source: &SourceFile) -> Result<Assembly> {
    if bytes.len() < HEADER_SIZE + 4 {
        return Err(Error::malformed(
            FORMAT,
            format!("binary STL needs at least 84 bytes, got {}", bytes.len()),
        ));
    }

    let triangle_count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let required = HEADER_SIZE + 4 + triangle_count * TRIANGLE_SIZE;
    if bytes.len() < required {
        return Err(Error::malformed(
            FORMAT,
            format!(
                "header declares {} triangles ({} bytes) but file has {} bytes",
                triangle_count,
                required,
                bytes.len()
            ),
        ));
    }
    if triangle_count == 0 {
        return Err(Error::malformed(FORMAT, "file contains no triangles"));
    }

    let mut positions = Vec::with_capacity(triangle_count * 9);
    let mut normals = Vec::with_capacity(triangle_count * 9);

    let records = &bytes[HEADER_SIZE + 4..required];
    for record in records.chunks_exact(TRIANGLE_SIZE) {
        let normal = [read_f32(record, 0), read_f32(record, 4), read_f32(record, 8)];
        for v in 0..3 {
            let offset = 12 + v * 12;
            positions.push(read_f32(record, offset));
            positions.push(read_f32(record, offset + 4));
            positions.push(read_f32(record, offset + 8));
            normals.extend_from_slice(&normal);
        }
        // bytes 48..50: attribute byte count, ignored
    }

    Ok(build_assembly(source, source.base_name(), positions, normals))
}

/// Parse ASCII STL.
///
/// Parsing runs over the whitespace token stream, so files that put several
/// keywords on one line read the same as conventionally formatted ones.
pub fn parse_stl_ascii(bytes: &[u8], source: &SourceFile) -> Result<Assembly> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::malformed(FORMAT, format!("ASCII STL is not valid UTF-8: {}", e)))?;

    // First pass: facet count sizes the buffers
    let expected = count_occurrences_ignore_ascii_case(bytes, b"facet normal");
    let mut positions = Vec::with_capacity(expected * 9);
    let mut normals = Vec::with_capacity(expected * 9);

    let mut solid_name: Option<String> = None;
    let mut normal = [0.0f32; 3];
    let mut facet: Vec<[f32; 3]> = Vec::with_capacity(3);
    let mut in_facet = false;
    let mut facet_index = 0usize;

    let mut tokens = text.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        match token.to_ascii_lowercase().as_str() {
            "solid" => {
                // Name runs until the first facet (or an immediate endsolid)
                let mut words = Vec::new();
                while let Some(next) = tokens.peek() {
                    if next.eq_ignore_ascii_case("facet") || next.eq_ignore_ascii_case("endsolid") {
                        break;
                    }
                    words.push(*next);
                    tokens.next();
                }
                if solid_name.is_none() && !words.is_empty() {
                    solid_name = Some(words.join(" "));
                }
            }
            "facet" => {
                if !tokens.next().is_some_and(|t| t.eq_ignore_ascii_case("normal")) {
                    return Err(Error::malformed(
                        FORMAT,
                        format!("facet {}: expected 'facet normal'", facet_index),
                    ));
                }
                normal = parse_vec3(&mut tokens).ok_or_else(|| {
                    Error::malformed(FORMAT, format!("facet {}: invalid normal", facet_index))
                })?;
                facet.clear();
                in_facet = true;
            }
            "vertex" => {
                let vertex = parse_vec3(&mut tokens).ok_or_else(|| {
                    Error::malformed(FORMAT, format!("facet {}: invalid vertex", facet_index))
                })?;
                facet.push(vertex);
            }
            "endfacet" => {
                if !in_facet || facet.len() != 3 {
                    return Err(Error::malformed(
                        FORMAT,
                        format!(
                            "facet {} closed with {} vertices, expected 3",
                            facet_index,
                            facet.len()
                        ),
                    ));
                }
                for v in &facet {
                    positions.extend_from_slice(v);
                    normals.extend_from_slice(&normal);
                }
                facet.clear();
                in_facet = false;
                facet_index += 1;
            }
            "endsolid" => {
                // Skip the trailing solid name
                while let Some(next) = tokens.peek() {
                    if next.eq_ignore_ascii_case("solid") {
                        break;
                    }
                    tokens.next();
                }
            }
            // outer loop / endloop carry no data
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(Error::malformed(FORMAT, "file contains no triangles"));
    }

    let name = solid_name.unwrap_or_else(|| source.base_name());
    Ok(build_assembly(source, name, positions, normals))
}

fn build_assembly(
    source: &SourceFile,
    part_name: String,
    positions: Vec<f32>,
    normals: Vec<f32>,
) -> Assembly {
    let vertex_count = (positions.len() / 3) as u32;
    let indices: Vec<u32> = (0..vertex_count).collect();
    let geometry = Geometry::new("geometry-0", positions, normals, indices, None);
    let part = Part::new("part-0", part_name, &geometry);
    Assembly::from_parts(source, FormatTag::Stl, vec![part], vec![geometry])
}
