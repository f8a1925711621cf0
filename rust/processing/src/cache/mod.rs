// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two-tier content-addressed cache of parsed assemblies.
//!
//! Lookups try the in-memory LRU tier, then the durable tier, promoting
//! durable hits into memory. Stores go to both tiers. The durable tier is
//! optional and every failure in it is logged and swallowed.

mod durable;
mod memory;

pub use durable::{estimate_size, DurableCache};
pub use memory::LruCache;

use crate::config::LoaderConfig;
use crate::error::CacheError;
use cadlite_core::model::now_millis;
use cadlite_core::Assembly;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub memory_capacity: usize,
    pub durable_enabled: bool,
    pub durable_entries: usize,
    pub durable_bytes: u64,
    pub durable_max_bytes: u64,
}

pub struct ContentCache {
    memory: Mutex<LruCache<Arc<Assembly>>>,
    durable: Option<Arc<DurableCache>>,
}

impl ContentCache {
    /// Memory tier only
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            durable: None,
        }
    }

    /// Open both tiers from config and sweep expired durable entries. A
    /// durable tier that fails to open is disabled.
    pub async fn open(config: &LoaderConfig) -> Self {
        let mut cache = Self::in_memory(config.memory_capacity);
        let Some(dir) = config.cache_dir.clone() else {
            return cache;
        };

        let ttl = config.durable_ttl;
        let max_bytes = config.durable_max_bytes;
        let opened = tokio::task::spawn_blocking(move || DurableCache::open(dir, ttl, max_bytes))
            .await
            .map_err(CacheError::from)
            .and_then(|r| r);

        match opened {
            Ok(durable) => {
                cache.durable = Some(Arc::new(durable));
                cache.sweep_expired().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Durable cache unavailable, continuing with memory tier only");
            }
        }
        cache
    }

    /// Wrap an already opened durable tier
    pub fn with_durable(capacity: usize, durable: DurableCache) -> Self {
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            durable: Some(Arc::new(durable)),
        }
    }

    pub fn durable(&self) -> Option<&DurableCache> {
        self.durable.as_deref()
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Assembly>> {
        if let Some(hit) = self.memory().get(key).cloned() {
            tracing::debug!(key = %key, tier = "memory", "Cache hit");
            return Some(hit);
        }

        let durable = self.durable.clone()?;
        let owned_key = key.to_string();
        let result = tokio::task::spawn_blocking(move || durable.get(&owned_key))
            .await
            .map_err(CacheError::from)
            .and_then(|r| r);

        match result {
            Ok(Some(assembly)) => {
                tracing::debug!(key = %key, tier = "durable", "Cache hit");
                let assembly = Arc::new(assembly);
                self.memory().insert(key, Arc::clone(&assembly));
                Some(assembly)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Durable cache read failed");
                None
            }
        }
    }

    pub async fn put(&self, key: &str, assembly: Arc<Assembly>) {
        if let Some(evicted) = self.memory().insert(key, Arc::clone(&assembly)) {
            tracing::debug!(key = %evicted, "Evicted from memory cache");
        }

        let Some(durable) = self.durable.clone() else {
            return;
        };
        let owned_key = key.to_string();
        let result = tokio::task::spawn_blocking(move || durable.put(&owned_key, &assembly, now_millis()))
            .await
            .map_err(CacheError::from)
            .and_then(|r| r);
        if let Err(e) = result {
            tracing::warn!(key = %key, error = %e, "Durable cache write failed");
        }
    }

    /// Delete expired durable entries; returns how many were removed
    pub async fn sweep_expired(&self) -> usize {
        let Some(durable) = self.durable.clone() else {
            return 0;
        };
        let result = tokio::task::spawn_blocking(move || durable.sweep_expired(now_millis()))
            .await
            .map_err(CacheError::from)
            .and_then(|r| r);
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Durable cache sweep failed");
            0
        })
    }

    pub async fn clear(&self) {
        self.memory().clear();
        let Some(durable) = self.durable.clone() else {
            return;
        };
        let result = tokio::task::spawn_blocking(move || durable.clear())
            .await
            .map_err(CacheError::from)
            .and_then(|r| r);
        if let Err(e) = result {
            tracing::warn!(error = %e, "Durable cache clear failed");
        }
    }

    pub fn contains_in_memory(&self, key: &str) -> bool {
        self.memory().contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        let memory = self.memory();
        let mut stats = CacheStats {
            memory_entries: memory.len(),
            memory_capacity: memory.capacity(),
            ..Default::default()
        };
        drop(memory);
        if let Some(durable) = &self.durable {
            stats.durable_enabled = true;
            stats.durable_entries = durable.len();
            stats.durable_bytes = durable.total_bytes();
            stats.durable_max_bytes = durable.max_bytes();
        }
        stats
    }

    fn memory(&self) -> MutexGuard<'_, LruCache<Arc<Assembly>>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
