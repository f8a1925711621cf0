// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load pipeline.
//!
//! Every entry point runs the same stages in order:
//! validate size, hash, cache lookup, detect, parse, optimise, store.
//! A cache hit jumps straight to completion. Material libraries are parsed
//! into the [`MaterialLibrary`] and answered with a material-only
//! placeholder that is never cached.

use crate::cache::ContentCache;
use crate::config::LoaderConfig;
use crate::error::{LoadError, Result};
use crate::hash::content_hash;
use crate::materials::MaterialLibrary;
use crate::progress::{ProgressEvent, ProgressSink, ProgressTracker, Stage};
use cadlite_core::{
    assembly_from_kernel, assembly_from_scene, detect, get_recommendation, is_supported, parse_mtl,
    parse_obj, parse_stl, Assembly, FormatTag, GeometryKernel, MeshImporter, SourceFile,
};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// One file of a batch load
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    fn is_material(&self) -> bool {
        detect(&self.name, &self.bytes) == FormatTag::Mtl
    }
}

pub struct Loader {
    config: LoaderConfig,
    cache: Arc<ContentCache>,
    materials: Arc<MaterialLibrary>,
    kernel: Option<Arc<dyn GeometryKernel>>,
    importer: Option<Arc<dyn MeshImporter>>,
    http: reqwest::Client,
}

impl Loader {
    pub fn new(config: LoaderConfig, cache: Arc<ContentCache>, materials: Arc<MaterialLibrary>) -> Self {
        Self {
            config,
            cache,
            materials,
            kernel: None,
            importer: None,
            http: reqwest::Client::new(),
        }
    }

    /// Enable STEP loads through a geometry kernel
    pub fn with_kernel(mut self, kernel: Arc<dyn GeometryKernel>) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Enable 3DS loads through a mesh importer
    pub fn with_importer(mut self, importer: Arc<dyn MeshImporter>) -> Self {
        self.importer = Some(importer);
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn materials(&self) -> &Arc<MaterialLibrary> {
        &self.materials
    }

    /// Whether a tag can be loaded with the collaborators configured here
    pub fn can_load(&self, tag: FormatTag) -> bool {
        match tag {
            FormatTag::Step => self.kernel.is_some(),
            FormatTag::LegacyMesh => self.importer.is_some(),
            other => is_supported(other),
        }
    }

    /// Load a file already held in memory
    pub async fn load_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        progress: &dyn ProgressSink,
    ) -> Result<Arc<Assembly>> {
        let mut tracker = ProgressTracker::new(progress);
        let result = self.run(file_name, bytes, &mut tracker).await;
        finish(result, file_name, &mut tracker)
    }

    /// Load a file from disk. The size cap is checked against file
    /// metadata before anything is read.
    pub async fn load_file(&self, path: impl AsRef<Path>, progress: &dyn ProgressSink) -> Result<Arc<Assembly>> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut tracker = ProgressTracker::new(progress);
        let result = async {
            let metadata = tokio::fs::metadata(path)
                .await
                .map_err(|e| LoadError::Transport(format!("{}: {}", path.display(), e)))?;
            self.check_size(metadata.len())?;
            tracker.emit(
                ProgressEvent::new(Stage::Fetching, 2, format!("Reading {}", file_name))
                    .with_bytes(0, Some(metadata.len())),
            );
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| LoadError::Transport(format!("{}: {}", path.display(), e)))?;
            self.run(&file_name, bytes, &mut tracker).await
        }
        .await;
        finish(result, &file_name, &mut tracker)
    }

    /// Download and load a file. A declared content length over the cap
    /// fails before the body is read; undeclared bodies are checked as they
    /// stream in.
    pub async fn load_url(&self, url: &str, progress: &dyn ProgressSink) -> Result<Arc<Assembly>> {
        let mut tracker = ProgressTracker::new(progress);
        let mut file_name = file_name_from_url(url);
        let result = async {
            tracker.stage(Stage::Fetching, 0, format!("Requesting {}", url));
            let mut response = self.http.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::Transport(format!("{} returned {}", url, status)));
            }
            file_name = file_name_from_url(response.url().as_str());

            let declared = response.content_length();
            if let Some(len) = declared {
                self.check_size(len)?;
            }

            let mut bytes = Vec::with_capacity(declared.unwrap_or(0) as usize);
            while let Some(chunk) = response.chunk().await? {
                bytes.extend_from_slice(&chunk);
                let loaded = bytes.len() as u64;
                self.check_size(loaded)?;
                let percent = declared
                    .filter(|&total| total > 0)
                    .map(|total| (loaded * 10 / total) as u8)
                    .unwrap_or(0);
                tracker.emit(
                    ProgressEvent::new(Stage::Fetching, percent, format!("Downloading {}", file_name))
                        .with_bytes(loaded, declared),
                );
            }
            tracing::debug!(url = %url, bytes = bytes.len(), "Downloaded");

            self.run(&file_name, bytes, &mut tracker).await
        }
        .await;
        finish(result, &file_name, &mut tracker)
    }

    /// Load a set of files where material libraries accompany one model.
    /// Materials are loaded first, then the first non-material file.
    pub async fn load_many(&self, mut files: Vec<InputFile>, progress: &dyn ProgressSink) -> Result<Arc<Assembly>> {
        files.sort_by_key(|f| !f.is_material());
        let material_count = files.iter().take_while(|f| f.is_material()).count();
        let mut rest = files.split_off(material_count);
        let label = rest
            .first()
            .map(|f| f.name.clone())
            .unwrap_or_else(|| "batch".to_string());

        let mut tracker = ProgressTracker::new(progress);
        let result = async {
            for (i, file) in files.iter().enumerate() {
                self.check_size(file.bytes.len() as u64)?;
                self.store_materials(&file.name, &file.bytes);
                tracker.emit(
                    ProgressEvent::new(Stage::Parsing, 0, format!("Loaded materials {}", file.name))
                        .with_parts(i + 1, material_count),
                );
            }

            if rest.is_empty() {
                return Err(LoadError::UnsupportedFormat {
                    format: FormatTag::Mtl.to_string(),
                    recommendation: get_recommendation(FormatTag::Mtl, &label),
                });
            }
            if rest.len() > 1 {
                tracing::warn!(
                    loading = %label,
                    ignored = rest.len() - 1,
                    "Batch contains several models, only the first is loaded"
                );
            }
            let model = rest.swap_remove(0);
            self.run(&model.name, model.bytes, &mut tracker).await
        }
        .await;
        finish(result, &label, &mut tracker)
    }

    async fn run(&self, file_name: &str, bytes: Vec<u8>, tracker: &mut ProgressTracker<'_>) -> Result<Arc<Assembly>> {
        let started = Instant::now();
        let byte_size = bytes.len() as u64;
        self.check_size(byte_size)?;

        tracker.emit(
            ProgressEvent::new(Stage::Fetching, 10, "Computing content hash").with_bytes(byte_size, Some(byte_size)),
        );
        let bytes: Arc<[u8]> = bytes.into();
        let algorithm = self.config.hash_algorithm;
        let hash = {
            let bytes = Arc::clone(&bytes);
            tokio::task::spawn_blocking(move || content_hash(&bytes, algorithm)).await?
        };

        tracker.stage(Stage::Fetching, 15, "Checking cache");
        if let Some(cached) = self.cache.get(&hash).await {
            tracing::info!(file = %file_name, hash = %hash, "Cache hit");
            tracker.complete(format!("Loaded {} from cache", file_name), cached.part_count());
            return Ok(cached);
        }
        tracing::info!(file = %file_name, hash = %hash, "Cache miss");

        let format = detect(file_name, &bytes);
        let source = SourceFile::new(hash.clone(), file_name, byte_size);
        tracing::debug!(file = %file_name, format = %format, "Detected format");

        if format == FormatTag::Mtl {
            tracker.stage(Stage::Parsing, 30, format!("Parsing materials {}", file_name));
            let count = self.store_materials(file_name, &bytes);
            tracker.complete(format!("Loaded {} materials", count), 0);
            return Ok(Arc::new(Assembly::material_only(&source)));
        }

        // Native .max scenes need exporting even when an importer exists
        let native_max = file_name.to_ascii_lowercase().ends_with(".max");
        if !self.can_load(format) || native_max {
            return Err(LoadError::UnsupportedFormat {
                format: format.to_string(),
                recommendation: get_recommendation(format, file_name),
            });
        }

        tracker.stage(Stage::Parsing, 20, format!("Parsing {} ({})", file_name, format));
        let mut assembly = self.parse(format, bytes, source).await?;

        tracker.emit(
            ProgressEvent::new(Stage::Optimizing, 80, "Optimizing geometry")
                .with_parts(0, assembly.part_count()),
        );
        assembly = tokio::task::spawn_blocking(move || optimize(assembly)).await??;

        tracker.emit(
            ProgressEvent::new(Stage::Building, 90, "Storing in cache")
                .with_parts(assembly.part_count(), assembly.part_count()),
        );
        let assembly = Arc::new(assembly);
        self.cache.put(&hash, Arc::clone(&assembly)).await;

        tracing::info!(
            file = %file_name,
            format = %format,
            parts = assembly.part_count(),
            triangles = assembly.total_triangles,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded assembly"
        );
        tracker.complete(
            format!("Loaded {} ({} triangles)", file_name, assembly.total_triangles),
            assembly.part_count(),
        );
        Ok(assembly)
    }

    async fn parse(&self, format: FormatTag, bytes: Arc<[u8]>, source: SourceFile) -> Result<Assembly> {
        let assembly = match format {
            FormatTag::Stl => tokio::task::spawn_blocking(move || parse_stl(&bytes, &source)).await??,
            FormatTag::Obj => {
                let table = self.materials.get(&source.base_name());
                if table.is_none() {
                    tracing::debug!(file = %source.file_name, "No material library for OBJ");
                }
                tokio::task::spawn_blocking(move || parse_obj(&bytes, &source, table.as_deref())).await??
            }
            FormatTag::Step => {
                let kernel = self.kernel.clone().ok_or_else(|| unsupported(format, &source))?;
                let output = kernel.tessellate(&bytes).await?;
                tokio::task::spawn_blocking(move || assembly_from_kernel(output, &source)).await??
            }
            FormatTag::LegacyMesh => {
                let importer = self.importer.clone().ok_or_else(|| unsupported(format, &source))?;
                let scene = importer.import(bytes, &source.file_name).await?;
                tokio::task::spawn_blocking(move || assembly_from_scene(&scene, &source)).await??
            }
            _ => return Err(unsupported(format, &source)),
        };
        Ok(assembly)
    }

    /// Parse a material library into the session library; returns the
    /// number of materials it defined.
    fn store_materials(&self, file_name: &str, bytes: &[u8]) -> usize {
        let table = parse_mtl(&String::from_utf8_lossy(bytes));
        let count = table.len();
        let base = cadlite_core::base_name(file_name);
        tracing::debug!(library = %base, materials = count, "Stored material library");
        self.materials.insert(base, table);
        count
    }

    fn check_size(&self, actual: u64) -> Result<()> {
        if actual > self.config.max_input_bytes {
            return Err(LoadError::size_exceeded(actual, self.config.max_input_bytes));
        }
        Ok(())
    }
}

/// Refresh derived geometry data in parallel, then check model invariants
fn optimize(mut assembly: Assembly) -> Result<Assembly> {
    assembly.geometries.par_iter_mut().for_each(|(_, geometry)| geometry.refresh());
    assembly.total_triangles = assembly.geometries.values().map(|g| g.triangle_count).sum();
    assembly.validate()?;
    Ok(assembly)
}

fn finish(result: Result<Arc<Assembly>>, file_name: &str, tracker: &mut ProgressTracker<'_>) -> Result<Arc<Assembly>> {
    if let Err(e) = &result {
        tracing::warn!(file = %file_name, error = %e, "Load failed");
        tracker.fail(e.to_string());
    }
    result
}

fn unsupported(format: FormatTag, source: &SourceFile) -> LoadError {
    LoadError::UnsupportedFormat {
        format: format.to_string(),
        recommendation: get_recommendation(format, &source.file_name),
    }
}

/// Last path segment of a URL, without query or fragment
fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or("download")
        .to_string()
}
