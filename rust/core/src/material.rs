// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Material libraries (`.mtl`) and their approximate PBR mapping.
//!
//! The Phong-to-PBR conversion in [`Material::to_pbr`] is a heuristic. It
//! picks plausible metalness/roughness values from shininess and specular
//! color so OBJ models look reasonable under a PBR renderer. It is not a
//! physically exact conversion and should not be relied on as one.

use crate::fast_parse::{parse_f32, parse_floats, rest_after_keyword, split_keyword};
use rustc_hash::FxHashMap;

/// Material table keyed by material name
pub type MaterialTable = FxHashMap<String, Material>;

/// Fallback base color when a material has neither diffuse nor ambient
pub const DEFAULT_BASE_COLOR: [f32; 3] = [0.8, 0.8, 0.8];

/// Texture map references
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialTextures {
    /// `map_Ka`
    pub ambient: Option<String>,
    /// `map_Kd`
    pub diffuse: Option<String>,
    /// `map_Ks`
    pub specular: Option<String>,
    /// `map_Bump` / `bump`
    pub bump: Option<String>,
    /// `map_d`
    pub alpha: Option<String>,
}

/// Phong-style material as written in an MTL file
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    pub name: String,
    pub ambient: Option<[f32; 3]>,
    pub diffuse: Option<[f32; 3]>,
    pub specular: Option<[f32; 3]>,
    /// `Ns`
    pub shininess: Option<f32>,
    /// Opacity from `d`, or `1 - Tr`; 1.0 is fully opaque
    pub dissolve: Option<f32>,
    /// `illum`
    pub illumination: Option<u32>,
    pub textures: MaterialTextures,
}

/// Simplified physically-based shading parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PbrMaterial {
    pub base_color: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
    pub opacity: f32,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn has_specular(&self) -> bool {
        self.specular.is_some_and(|s| s.iter().any(|&c| c > 0.0))
    }

    /// Diffuse, else ambient, else mid-gray
    pub fn base_color(&self) -> [f32; 3] {
        self.diffuse.or(self.ambient).unwrap_or(DEFAULT_BASE_COLOR)
    }

    /// Approximate PBR parameters.
    ///
    /// - roughness: 0.7, or `max(0.1, 1 - Ns/1000)` for shiny specular
    ///   materials (`Ns > 100`)
    /// - metalness: 0.3 for very shiny specular materials (`Ns > 200`),
    ///   else 0.1
    pub fn to_pbr(&self) -> PbrMaterial {
        let shininess = self.shininess.unwrap_or(0.0);
        let specular = self.has_specular();

        let roughness = if specular && shininess > 100.0 {
            (1.0 - shininess / 1000.0).max(0.1)
        } else {
            0.7
        };
        let metalness = if specular && shininess > 200.0 { 0.3 } else { 0.1 };

        PbrMaterial {
            base_color: self.base_color(),
            metalness,
            roughness,
            opacity: self.dissolve.unwrap_or(1.0).clamp(0.0, 1.0),
        }
    }
}

/// Texture path of a `map_*` directive: options (`-bm 0.5`, ...) may
/// precede it, so take the last token.
fn texture_path(line: &str) -> Option<String> {
    let rest = rest_after_keyword(line);
    rest.split_whitespace().last().map(str::to_string)
}

/// Parse MTL text into a name-keyed table. Unknown directives and lines
/// with unparseable values are skipped.
pub fn parse_mtl(text: &str) -> MaterialTable {
    let mut table = MaterialTable::default();
    let mut current: Option<Material> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((keyword, mut tokens)) = split_keyword(line) else {
            continue;
        };

        if keyword == "newmtl" {
            if let Some(done) = current.take() {
                table.insert(done.name.clone(), done);
            }
            current = Some(Material::new(rest_after_keyword(line)));
            continue;
        }

        // Directives before the first newmtl have no owner
        let Some(material) = current.as_mut() else {
            continue;
        };

        match keyword {
            "Ka" => material.ambient = color(&mut tokens),
            "Kd" => material.diffuse = color(&mut tokens),
            "Ks" => material.specular = color(&mut tokens),
            "Ns" => material.shininess = tokens.next().and_then(parse_f32),
            "d" => material.dissolve = tokens.next().and_then(parse_f32),
            "Tr" => material.dissolve = tokens.next().and_then(parse_f32).map(|t| 1.0 - t),
            "illum" => material.illumination = tokens.next().and_then(|t| t.parse().ok()),
            "map_Ka" => material.textures.ambient = texture_path(line),
            "map_Kd" => material.textures.diffuse = texture_path(line),
            "map_Ks" => material.textures.specular = texture_path(line),
            "map_Bump" | "map_bump" | "bump" => material.textures.bump = texture_path(line),
            "map_d" => material.textures.alpha = texture_path(line),
            _ => {}
        }
    }

    if let Some(done) = current.take() {
        table.insert(done.name.clone(), done);
    }
    table
}

/// `Kd 0.5` is shorthand for `Kd 0.5 0.5 0.5`
fn color<'a, I: Iterator<Item = &'a str>>(tokens: &mut I) -> Option<[f32; 3]> {
    let mut values: [f32; 3] = parse_floats(tokens, f32::NAN)?;
    if values[1].is_nan() {
        values = [values[0]; 3];
    } else if values[2].is_nan() {
        values[2] = values[1];
    }
    Some(values)
}
