// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Durable cache tier on top of cacache.
//!
//! Entries are JSON-serialized assemblies keyed by content hash. An
//! in-memory index ordered by insertion time, rebuilt from the cacache
//! index on open, drives TTL expiry and oldest-first size eviction. All
//! methods block; callers run them on the blocking pool.

use crate::error::CacheError;
use cacache::{Integrity, WriteOpts};
use cadlite_core::{Assembly, AssemblyMetadata, FormatTag, Part};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const SIZE_METADATA_KEY: &str = "estimated_size";

#[derive(Debug, Clone)]
struct IndexEntry {
    time: u64,
    size: u64,
    integrity: Integrity,
}

#[derive(Debug, Default)]
struct DurableIndex {
    entries: FxHashMap<String, IndexEntry>,
    /// (insertion time, key), oldest first
    by_time: BTreeSet<(u64, String)>,
    total_bytes: u64,
}

impl DurableIndex {
    fn insert(&mut self, key: String, entry: IndexEntry) {
        self.remove(&key);
        self.total_bytes += entry.size;
        self.by_time.insert((entry.time, key.clone()));
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> Option<IndexEntry> {
        let entry = self.entries.remove(key)?;
        self.by_time.remove(&(entry.time, key.to_string()));
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    fn oldest(&self) -> Option<(u64, String)> {
        self.by_time.iter().next().cloned()
    }
}

/// Assembly fields other than the geometry pool, borrowed for size
/// estimation
#[derive(Serialize)]
struct AssemblyHeader<'a> {
    id: &'a str,
    name: &'a str,
    format: FormatTag,
    parts: &'a [Part],
    root_part_ids: &'a [String],
    total_triangles: usize,
    file_size: u64,
    loaded_at: u64,
    metadata: &'a Option<AssemblyMetadata>,
    material_only: bool,
}

/// Estimated stored size: twice the JSON length of everything except
/// geometry, plus four bytes per buffer element.
pub fn estimate_size(assembly: &Assembly) -> Result<u64, CacheError> {
    let header = AssemblyHeader {
        id: &assembly.id,
        name: &assembly.name,
        format: assembly.format,
        parts: &assembly.parts,
        root_part_ids: &assembly.root_part_ids,
        total_triangles: assembly.total_triangles,
        file_size: assembly.file_size,
        loaded_at: assembly.loaded_at,
        metadata: &assembly.metadata,
        material_only: assembly.material_only,
    };
    let header_len = serde_json::to_vec(&header)?.len() as u64;
    let elements: u64 = assembly
        .geometries
        .values()
        .map(|g| g.element_count() as u64)
        .sum();
    Ok(header_len * 2 + elements * 4)
}

/// Size- and age-bounded persistent store of assemblies
#[derive(Debug)]
pub struct DurableCache {
    dir: PathBuf,
    ttl_ms: u64,
    max_bytes: u64,
    index: Mutex<DurableIndex>,
}

impl DurableCache {
    /// Open (creating if needed) the store in `dir` and rebuild the time
    /// index from existing entries.
    pub fn open(dir: impl Into<PathBuf>, ttl: Duration, max_bytes: u64) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut index = DurableIndex::default();
        for metadata in cacache::list_sync(&dir) {
            let metadata = match metadata {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable durable cache index entry");
                    continue;
                }
            };
            let size = metadata
                .metadata
                .get(SIZE_METADATA_KEY)
                .and_then(|v| v.as_u64())
                .unwrap_or(metadata.size as u64);
            index.insert(
                metadata.key,
                IndexEntry {
                    time: metadata.time as u64,
                    size,
                    integrity: metadata.integrity,
                },
            );
        }

        tracing::debug!(
            dir = %dir.display(),
            entries = index.entries.len(),
            total_bytes = index.total_bytes,
            "Opened durable cache"
        );

        Ok(Self {
            dir,
            ttl_ms: ttl.as_millis() as u64,
            max_bytes,
            index: Mutex::new(index),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the size estimates of stored entries
    pub fn total_bytes(&self) -> u64 {
        self.lock().total_bytes
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Read an entry. Entries that no longer deserialize are dropped.
    pub fn get(&self, key: &str) -> Result<Option<Assembly>, CacheError> {
        let data = match cacache::read_sync(&self.dir, key) {
            Ok(data) => data,
            Err(cacache::Error::EntryNotFound(_, _)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&data) {
            Ok(assembly) => Ok(Some(assembly)),
            Err(e) => {
                let mut index = self.lock();
                self.delete(&mut index, key)?;
                Err(e.into())
            }
        }
    }

    /// Store an entry stamped with `now_ms`, evicting oldest entries first
    /// until it fits. Returns false when the entry alone exceeds the cap
    /// and was not stored.
    pub fn put(&self, key: &str, assembly: &Assembly, now_ms: u64) -> Result<bool, CacheError> {
        let size = estimate_size(assembly)?;
        if size > self.max_bytes {
            tracing::warn!(
                key = %key,
                size,
                max_bytes = self.max_bytes,
                "Entry larger than durable cache cap, not stored"
            );
            return Ok(false);
        }

        let data = serde_json::to_vec(assembly)?;
        let mut index = self.lock();
        self.delete(&mut index, key)?;

        while index.total_bytes + size > self.max_bytes {
            let Some((_, oldest)) = index.oldest() else {
                break;
            };
            tracing::debug!(key = %oldest, "Evicting durable cache entry for space");
            self.delete(&mut index, &oldest)?;
        }

        let mut writer = WriteOpts::new()
            .size(data.len())
            .time(now_ms as u128)
            .metadata(serde_json::json!({ SIZE_METADATA_KEY: size }))
            .open_sync(&self.dir, key)?;
        writer.write_all(&data)?;
        let integrity = writer.commit()?;

        index.insert(
            key.to_string(),
            IndexEntry {
                time: now_ms,
                size,
                integrity,
            },
        );
        tracing::debug!(key = %key, size, total_bytes = index.total_bytes, "Stored durable cache entry");
        Ok(true)
    }

    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let mut index = self.lock();
        self.delete(&mut index, key)
    }

    /// Delete entries inserted more than the TTL before `now_ms`
    pub fn sweep_expired(&self, now_ms: u64) -> Result<usize, CacheError> {
        let cutoff = now_ms.saturating_sub(self.ttl_ms);
        let mut index = self.lock();
        let expired: Vec<String> = index
            .by_time
            .iter()
            .take_while(|(time, _)| *time < cutoff)
            .map(|(_, key)| key.clone())
            .collect();
        for key in &expired {
            self.delete(&mut index, key)?;
        }
        if !expired.is_empty() {
            tracing::info!(removed = expired.len(), "Swept expired durable cache entries");
        }
        Ok(expired.len())
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        let mut index = self.lock();
        cacache::clear_sync(&self.dir)?;
        *index = DurableIndex::default();
        Ok(())
    }

    fn delete(&self, index: &mut DurableIndex, key: &str) -> Result<bool, CacheError> {
        let Some(entry) = index.remove(key) else {
            return Ok(false);
        };
        cacache::remove_sync(&self.dir, key)?;
        match cacache::remove_hash_sync(&self.dir, &entry.integrity) {
            Ok(()) | Err(cacache::Error::EntryNotFound(_, _)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, DurableIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadlite_core::SourceFile;
    use cadlite_geometry::Geometry;

    const DAY_MS: u64 = 24 * 60 * 60 * 1000;

    fn assembly(id: &str, triangles: usize) -> Assembly {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for t in 0..triangles {
            let z = t as f32;
            positions.extend_from_slice(&[0.0, 0.0, z, 1.0, 0.0, z, 0.0, 1.0, z]);
            let base = (t * 3) as u32;
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }
        let geometry = Geometry::new("geometry-0", positions, Vec::new(), indices, None);
        let part = Part::new("part-0", "part", &geometry);
        let source = SourceFile::new(id, format!("{}.stl", id), 1234);
        Assembly::from_parts(&source, FormatTag::Stl, vec![part], vec![geometry])
    }

    #[test]
    fn test_estimate_counts_geometry_elements() {
        let one = estimate_size(&assembly("a", 1)).unwrap();
        let two = estimate_size(&assembly("a", 2)).unwrap();
        // 9 positions + 9 normals + 3 indices per triangle, 4 bytes each
        assert_eq!(two - one, 21 * 4);
    }

    #[test]
    fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DurableCache::open(dir.path(), Duration::from_millis(7 * DAY_MS), u64::MAX).unwrap();
        let original = assembly("abc", 3);

        assert!(cache.put("abc", &original, 1_000).unwrap());
        let loaded = cache.get("abc").unwrap().unwrap();
        assert_eq!(loaded, original);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.total_bytes(), estimate_size(&original).unwrap());
        assert!(cache.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_index_rebuilt_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let ttl = Duration::from_millis(7 * DAY_MS);
        {
            let cache = DurableCache::open(dir.path(), ttl, u64::MAX).unwrap();
            cache.put("a", &assembly("a", 1), 10).unwrap();
            cache.put("b", &assembly("b", 2), 20).unwrap();
        }
        let cache = DurableCache::open(dir.path(), ttl, u64::MAX).unwrap();
        assert_eq!(cache.len(), 2);
        let expected = estimate_size(&assembly("a", 1)).unwrap() + estimate_size(&assembly("b", 2)).unwrap();
        assert_eq!(cache.total_bytes(), expected);
        assert_eq!(cache.sweep_expired(15 + 7 * DAY_MS).unwrap(), 1);
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_size_cap_evicts_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let entry = estimate_size(&assembly("k0", 4)).unwrap();
        let cap = entry * 2 + entry / 2;
        let cache = DurableCache::open(dir.path(), Duration::from_millis(7 * DAY_MS), cap).unwrap();

        for i in 0..5u64 {
            let key = format!("k{}", i);
            assert!(cache.put(&key, &assembly(&key, 4), 100 + i).unwrap());
            assert!(cache.total_bytes() <= cap);
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("k3"));
        assert!(cache.contains("k4"));
        assert!(cache.get("k0").unwrap().is_none());
    }

    #[test]
    fn test_oversized_entry_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DurableCache::open(dir.path(), Duration::from_millis(DAY_MS), 16).unwrap();
        assert!(!cache.put("big", &assembly("big", 10), 0).unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DurableCache::open(dir.path(), Duration::from_millis(7 * DAY_MS), u64::MAX).unwrap();
        cache.put("old", &assembly("old", 1), 0).unwrap();
        cache.put("new", &assembly("new", 1), 6 * DAY_MS).unwrap();

        assert_eq!(cache.sweep_expired(7 * DAY_MS).unwrap(), 0);
        assert_eq!(cache.sweep_expired(8 * DAY_MS).unwrap(), 1);
        assert!(!cache.contains("old"));
        assert!(cache.get("new").unwrap().is_some());
    }

    #[test]
    fn test_clear_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DurableCache::open(dir.path(), Duration::from_millis(DAY_MS), u64::MAX).unwrap();
        cache.put("a", &assembly("a", 1), 0).unwrap();
        cache.put("b", &assembly("b", 1), 0).unwrap();
        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());
        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
        assert!(cache.get("b").unwrap().is_none());
    }
}
