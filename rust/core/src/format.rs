// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Format detection.
//!
//! The file extension wins when it is recognised. Otherwise up to the first
//! [`SNIFF_LEN`] bytes are inspected for content signatures, in this order:
//! ASCII STL, binary STL, OBJ, glTF (JSON, then binary), STEP, IGES.

use crate::fast_parse::{contains_ignore_ascii_case, split_keyword};
use std::fmt;
use std::path::Path;

/// Bytes inspected by content sniffing
pub const SNIFF_LEN: usize = 1024;

/// Binary glTF magic: ASCII "glTF"
pub const GLB_MAGIC: [u8; 4] = *b"glTF";

/// Slack allowed between a binary STL's declared and actual size
const BINARY_STL_TOLERANCE: usize = 100;

/// OBJ first tokens recognised when sniffing
const OBJ_KEYWORDS: &[&str] = &["#", "v", "vn", "vt", "f", "g", "o", "mtllib", "usemtl"];

/// Format tag inferred for an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FormatTag {
    Stl,
    Step,
    Obj,
    Mtl,
    /// 3DS / 3ds Max scenes handled by the mesh-import collaborator
    LegacyMesh,
    Gltf,
    Iges,
    Unknown,
}

impl FormatTag {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatTag::Stl => "stl",
            FormatTag::Step => "step",
            FormatTag::Obj => "obj",
            FormatTag::Mtl => "mtl",
            FormatTag::LegacyMesh => "legacy-mesh",
            FormatTag::Gltf => "gltf",
            FormatTag::Iges => "iges",
            FormatTag::Unknown => "unknown",
        }
    }

    /// Map a file extension (without the dot, any case) to a tag
    pub fn from_extension(ext: &str) -> Option<FormatTag> {
        let tag = match ext.to_ascii_lowercase().as_str() {
            "stl" => FormatTag::Stl,
            "step" | "stp" => FormatTag::Step,
            "obj" => FormatTag::Obj,
            "mtl" => FormatTag::Mtl,
            "3ds" | "max" => FormatTag::LegacyMesh,
            "gltf" | "glb" => FormatTag::Gltf,
            "igs" | "iges" => FormatTag::Iges,
            _ => return None,
        };
        Some(tag)
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension of a file name, if any
fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// File name without directory or extension: `parts/foo.obj` -> `foo`
pub fn base_name(file_name: &str) -> String {
    // Handle both separators regardless of host platform
    let leaf = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name);
    match leaf.rfind('.') {
        Some(0) | None => leaf.to_string(),
        Some(pos) => leaf[..pos].to_string(),
    }
}

/// Infer the format of a file from its name, then its content
pub fn detect(file_name: &str, bytes: &[u8]) -> FormatTag {
    if let Some(tag) = extension(file_name).and_then(|e| FormatTag::from_extension(&e)) {
        return tag;
    }
    detect_content(bytes)
}

/// Infer the format from content signatures alone
pub fn detect_content(bytes: &[u8]) -> FormatTag {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];

    if is_ascii_stl(head) {
        return FormatTag::Stl;
    }
    if is_binary_stl(bytes) {
        return FormatTag::Stl;
    }

    let text = String::from_utf8_lossy(head);

    if is_obj(&text) {
        return FormatTag::Obj;
    }
    if text.starts_with("{\"") {
        return FormatTag::Gltf;
    }
    if head.len() >= 4 && head[..4] == GLB_MAGIC {
        return FormatTag::Gltf;
    }
    if contains_ignore_ascii_case(head, b"iso-10303-21") || contains_ignore_ascii_case(head, b"header;") {
        return FormatTag::Step;
    }
    if is_iges(&text) {
        return FormatTag::Iges;
    }

    FormatTag::Unknown
}

fn is_ascii_stl(head: &[u8]) -> bool {
    head.len() >= 5 && head[..5].eq_ignore_ascii_case(b"solid")
}

/// Binary STL: the declared triangle count must account for the file size
/// within a small tolerance.
pub fn is_binary_stl(bytes: &[u8]) -> bool {
    if bytes.len() < 84 {
        return false;
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as u64;
    let expected = 84 + count * 50;
    expected.abs_diff(bytes.len() as u64) <= BINARY_STL_TOLERANCE as u64
}

fn is_obj(text: &str) -> bool {
    let hits = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(10)
        .filter(|line| {
            line.starts_with('#')
                || split_keyword(line).is_some_and(|(kw, _)| OBJ_KEYWORDS.contains(&kw))
        })
        .count();
    hits >= 2
}

fn is_iges(text: &str) -> bool {
    let hits = text
        .lines()
        .take(5)
        .filter(|line| {
            matches!(
                line.as_bytes().get(72),
                Some(b'S') | Some(b'G') | Some(b'D') | Some(b'P') | Some(b'T')
            )
        })
        .count();
    hits >= 2
}

/// Whether a parser exists for this tag. Step and legacy meshes also need
/// their external collaborator to be configured at load time.
pub fn is_supported(tag: FormatTag) -> bool {
    matches!(
        tag,
        FormatTag::Stl | FormatTag::Obj | FormatTag::Mtl | FormatTag::Step | FormatTag::LegacyMesh
    )
}

/// Human-readable advice for a tag, used in error messages
pub fn get_recommendation(tag: FormatTag, file_name: &str) -> String {
    let ext = extension(file_name).unwrap_or_default();
    match tag {
        FormatTag::LegacyMesh if ext == "max" => format!(
            "'{}' is a native 3ds Max scene which cannot be read directly. \
             Export it to .3ds (File > Export) and load the exported file.",
            file_name
        ),
        FormatTag::Mtl => format!(
            "'{}' is a material library and has no geometry. Load it together with \
             the .obj file that shares its base name.",
            file_name
        ),
        FormatTag::Gltf => format!(
            "glTF scenes ('{}') are not handled by this loader. Export to OBJ or STL.",
            file_name
        ),
        FormatTag::Iges => format!(
            "IGES ('{}') is not supported. Export the model to STEP (.step/.stp) instead.",
            file_name
        ),
        FormatTag::Unknown => format!(
            "Could not recognise '{}'. Supported formats: STL, OBJ (+MTL), STEP, 3DS.",
            file_name
        ),
        FormatTag::Step => "STEP files are tessellated by the geometry kernel service.".to_string(),
        FormatTag::LegacyMesh => "3DS scenes are read by the mesh-import service.".to_string(),
        FormatTag::Stl | FormatTag::Obj => "Format is supported.".to_string(),
    }
}
