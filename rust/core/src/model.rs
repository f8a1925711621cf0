// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unified assembly model.
//!
//! An [`Assembly`] is a forest of [`Part`]s sharing a pool of
//! [`Geometry`]. Every parser in this crate produces one; consumers never see
//! format-specific structures.

use crate::format::{base_name, FormatTag};
use crate::{Error, Result};
use cadlite_geometry::{BoundingBox, Geometry, Transform, IDENTITY};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of the file being parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Assembly id; the loader uses the content hash
    pub id: String,
    pub file_name: String,
    pub byte_size: u64,
}

impl SourceFile {
    pub fn new(id: impl Into<String>, file_name: impl Into<String>, byte_size: u64) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            byte_size,
        }
    }

    /// File name without directory or extension
    pub fn base_name(&self) -> String {
        base_name(&self.file_name)
    }
}

/// Optional per-part engineering metadata
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PartMetadata {
    pub part_number: Option<String>,
    pub material: Option<String>,
    pub weight: Option<f64>,
    pub manufacturer: Option<String>,
    pub properties: BTreeMap<String, String>,
    /// Override color (RGB, 0-1)
    pub color: Option<[f32; 3]>,
}

/// One named node in the assembly hierarchy
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Part {
    pub id: String,
    pub name: String,
    /// `None` for roots
    pub parent_id: Option<String>,
    /// Column-major local transform
    pub transform: Transform,
    /// Local-space bounds of the referenced geometry
    pub bounds: BoundingBox,
    pub geometry_id: String,
    pub metadata: Option<PartMetadata>,
    pub visible: bool,
    pub selected: bool,
}

impl Part {
    /// Root part with identity transform, bounds taken from `geometry`
    pub fn new(id: impl Into<String>, name: impl Into<String>, geometry: &Geometry) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: None,
            transform: IDENTITY,
            bounds: geometry.bounds(),
            geometry_id: geometry.id.clone(),
            metadata: None,
            visible: true,
            selected: false,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_metadata(mut self, metadata: PartMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override color, if any
    pub fn color(&self) -> Option<[f32; 3]> {
        self.metadata.as_ref().and_then(|m| m.color)
    }
}

/// Optional assembly-level metadata
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssemblyMetadata {
    pub file_name: Option<String>,
    pub units: Option<String>,
    pub properties: BTreeMap<String, String>,
}

/// Unified, renderer-agnostic CAD model
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Assembly {
    pub id: String,
    pub name: String,
    pub format: FormatTag,
    pub parts: Vec<Part>,
    /// Stored as an entries list; the map is rebuilt from geometry ids
    #[cfg_attr(feature = "serde", serde(with = "geometry_entries"))]
    pub geometries: FxHashMap<String, Geometry>,
    pub root_part_ids: Vec<String>,
    pub total_triangles: usize,
    pub file_size: u64,
    /// Milliseconds since the Unix epoch
    pub loaded_at: u64,
    pub metadata: Option<AssemblyMetadata>,
    /// Placeholder returned for material libraries; must not be rendered
    #[cfg_attr(feature = "serde", serde(default))]
    pub material_only: bool,
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Assembly {
    /// Assemble parts and geometry. Roots and the triangle total are derived.
    pub fn from_parts(
        source: &SourceFile,
        format: FormatTag,
        parts: Vec<Part>,
        geometries: Vec<Geometry>,
    ) -> Self {
        let root_part_ids = parts
            .iter()
            .filter(|p| p.parent_id.is_none())
            .map(|p| p.id.clone())
            .collect();
        let total_triangles = geometries.iter().map(|g| g.triangle_count).sum();
        let geometries = geometries.into_iter().map(|g| (g.id.clone(), g)).collect();

        Self {
            id: source.id.clone(),
            name: source.base_name(),
            format,
            parts,
            geometries,
            root_part_ids,
            total_triangles,
            file_size: source.byte_size,
            loaded_at: now_millis(),
            metadata: Some(AssemblyMetadata {
                file_name: Some(source.file_name.clone()),
                ..Default::default()
            }),
            material_only: false,
        }
    }

    /// Empty placeholder produced when a material library is loaded
    pub fn material_only(source: &SourceFile) -> Self {
        let mut assembly = Self::from_parts(source, FormatTag::Mtl, Vec::new(), Vec::new());
        assembly.material_only = true;
        assembly
    }

    /// Look up a part by id
    pub fn part(&self, id: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == id)
    }

    /// Parts whose parent is `id`, in declaration order
    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Part> + 'a {
        self.parts
            .iter()
            .filter(move |p| p.parent_id.as_deref() == Some(id))
    }

    /// Root parts in `root_part_ids` order
    pub fn roots(&self) -> impl Iterator<Item = &Part> {
        self.root_part_ids.iter().filter_map(move |id| self.part(id))
    }

    /// Geometry referenced by a part
    pub fn geometry_for(&self, part: &Part) -> Option<&Geometry> {
        self.geometries.get(&part.geometry_id)
    }

    /// Union of every part's bounds after its own transform. Parent
    /// transforms are not composed: parsers emit world transforms directly.
    pub fn world_bounds(&self) -> Option<BoundingBox> {
        self.parts
            .iter()
            .map(|p| p.bounds.transformed(&p.transform))
            .reduce(|a, b| a.union(&b))
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Check the model invariants: geometry and parent references resolve,
    /// roots are parentless parts, the hierarchy has no cycles, geometry
    /// buffers are consistent and the triangle total matches.
    pub fn validate(&self) -> Result<()> {
        let ids: FxHashSet<&str> = self.parts.iter().map(|p| p.id.as_str()).collect();
        if ids.len() != self.parts.len() {
            return Err(Error::InvalidAssembly("duplicate part id".into()));
        }

        for part in &self.parts {
            if !self.geometries.contains_key(&part.geometry_id) {
                return Err(Error::InvalidAssembly(format!(
                    "part {} references missing geometry {}",
                    part.id, part.geometry_id
                )));
            }
            if let Some(parent) = &part.parent_id {
                if !ids.contains(parent.as_str()) {
                    return Err(Error::InvalidAssembly(format!(
                        "part {} references missing parent {}",
                        part.id, parent
                    )));
                }
            }
        }

        for root in &self.root_part_ids {
            match self.part(root) {
                Some(p) if p.parent_id.is_none() => {}
                _ => {
                    return Err(Error::InvalidAssembly(format!(
                        "root {} is not a parentless part",
                        root
                    )))
                }
            }
        }

        self.check_acyclic()?;

        for geometry in self.geometries.values() {
            geometry.validate()?;
        }

        let total: usize = self.geometries.values().map(|g| g.triangle_count).sum();
        if total != self.total_triangles {
            return Err(Error::InvalidAssembly(format!(
                "total_triangles is {} but geometries hold {}",
                self.total_triangles, total
            )));
        }
        Ok(())
    }

    fn check_acyclic(&self) -> Result<()> {
        let parents: FxHashMap<&str, &str> = self
            .parts
            .iter()
            .filter_map(|p| p.parent_id.as_deref().map(|parent| (p.id.as_str(), parent)))
            .collect();

        for part in &self.parts {
            let mut current = part.id.as_str();
            // A chain longer than the part count must revisit a node
            for _ in 0..=self.parts.len() {
                match parents.get(current) {
                    Some(&parent) => current = parent,
                    None => break,
                }
                if current == part.id {
                    return Err(Error::InvalidAssembly(format!(
                        "part {} is its own ancestor",
                        part.id
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod geometry_entries {
    use cadlite_geometry::Geometry;
    use rustc_hash::FxHashMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &FxHashMap<String, Geometry>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<&Geometry> = map.values().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<FxHashMap<String, Geometry>, D::Error> {
        let entries = Vec::<Geometry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|g| (g.id.clone(), g)).collect())
    }
}
