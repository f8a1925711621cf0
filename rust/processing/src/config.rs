// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loader configuration.

use crate::hash::HashAlgorithm;
use std::path::PathBuf;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Input size cap
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 500 * MIB;
/// Memory tier capacity in assemblies
pub const DEFAULT_MEMORY_CAPACITY: usize = 10;
/// Durable entry lifetime
pub const DEFAULT_DURABLE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Durable tier size cap (estimated bytes)
pub const DEFAULT_DURABLE_MAX_BYTES: u64 = 500 * MIB;

/// Pipeline and cache settings.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Inputs larger than this fail before being read or parsed.
    pub max_input_bytes: u64,
    /// Number of assemblies kept in the in-memory LRU tier.
    pub memory_capacity: usize,
    /// Durable entries older than this are swept.
    pub durable_ttl: Duration,
    /// Cap on the summed size estimate of durable entries.
    pub durable_max_bytes: u64,
    /// Durable tier location; `None` disables it.
    pub cache_dir: Option<PathBuf>,
    pub hash_algorithm: HashAlgorithm,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            durable_ttl: DEFAULT_DURABLE_TTL,
            durable_max_bytes: DEFAULT_DURABLE_MAX_BYTES,
            cache_dir: None,
            hash_algorithm: HashAlgorithm::Sha256,
        }
    }
}

impl LoaderConfig {
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_max_input_bytes(mut self, bytes: u64) -> Self {
        self.max_input_bytes = bytes;
        self
    }

    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }

    pub fn with_durable_limits(mut self, ttl: Duration, max_bytes: u64) -> Self {
        self.durable_ttl = ttl;
        self.durable_max_bytes = max_bytes;
        self
    }

    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.max_input_bytes, 500 * 1024 * 1024);
        assert_eq!(config.memory_capacity, 10);
        assert_eq!(config.durable_ttl.as_secs(), 604_800);
        assert!(config.cache_dir.is_none());
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
    }
}
