// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CAD-Lite Core
//!
//! Format detection and parsing of CAD model files into one unified,
//! renderer-agnostic [`Assembly`] model.
//!
//! ## Overview
//!
//! - **Format Detection**: extension first, then content signatures
//!   ([`detect`])
//! - **STL**: binary and ASCII ([`parse_stl`])
//! - **OBJ**: n-gon fan triangulation, groups, `usemtl` splits ([`parse_obj`])
//! - **MTL**: material tables and an approximate PBR mapping ([`parse_mtl`])
//! - **Boundary representation**: normalisation of external geometry kernel
//!   output ([`assembly_from_kernel`])
//! - **Legacy scenes**: flattening of an external mesh importer's scene graph
//!   ([`assembly_from_scene`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadlite_core::{detect, parse_stl, FormatTag, SourceFile};
//!
//! let bytes = std::fs::read("bracket.stl")?;
//! assert_eq!(detect("bracket.stl", &bytes), FormatTag::Stl);
//!
//! let source = SourceFile::new("content-hash", "bracket.stl", bytes.len() as u64);
//! let assembly = parse_stl(&bytes, &source)?;
//! println!("{} triangles", assembly.total_triangles);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization of the model and kernel output types

pub mod error;
pub mod fast_parse;
pub mod format;
pub mod kernel;
pub mod material;
pub mod model;
pub mod obj;
pub mod scene;
pub mod stl;

pub use error::{Error, Result};
pub use format::{base_name, detect, get_recommendation, is_supported, FormatTag};
pub use kernel::{assembly_from_kernel, GeometryKernel, KernelArray, KernelIndices, KernelMesh, KernelOutput};
pub use material::{parse_mtl, Material, MaterialTable, MaterialTextures, PbrMaterial};
pub use model::{Assembly, AssemblyMetadata, Part, PartMetadata, SourceFile};
pub use obj::parse_obj;
pub use scene::{assembly_from_scene, ImportedMesh, MeshImporter, SceneNode};
pub use stl::{parse_stl, parse_stl_ascii, parse_stl_binary};
