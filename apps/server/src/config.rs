// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use cadlite_processing::LoaderConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Directory for the durable cache tier.
    pub cache_dir: String,
    /// Maximum input size in MB.
    pub max_file_size_mb: u64,
    /// Durable cache entry lifetime in days.
    pub cache_max_age_days: u64,
    /// Durable cache size cap in MB.
    pub cache_max_size_mb: u64,
    /// Assemblies kept in memory.
    pub memory_cache_entries: usize,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Number of worker threads for parallel processing.
    pub worker_threads: usize,
    /// External geometry kernel command line for STEP files.
    pub kernel_command: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unparsable values fall back
    /// to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
            lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
        }

        Self {
            port: parsed(&lookup, "PORT", 8080),
            cache_dir: lookup("CACHE_DIR").unwrap_or_else(|| {
                std::env::current_dir()
                    .ok()
                    .and_then(|dir| dir.join(".cache").to_str().map(|s| s.to_string()))
                    .unwrap_or_else(|| "./.cache".into())
            }),
            max_file_size_mb: parsed(&lookup, "MAX_FILE_SIZE_MB", 500),
            cache_max_age_days: parsed(&lookup, "CACHE_MAX_AGE_DAYS", 7),
            cache_max_size_mb: parsed(&lookup, "CACHE_MAX_SIZE_MB", 500),
            memory_cache_entries: parsed(&lookup, "MEMORY_CACHE_ENTRIES", 10),
            request_timeout_secs: parsed(&lookup, "REQUEST_TIMEOUT_SECS", 300),
            worker_threads: parsed(&lookup, "WORKER_THREADS", num_cpus::get()),
            kernel_command: lookup("KERNEL_COMMAND").filter(|c| !c.trim().is_empty()),
            log_format: parsed(&lookup, "LOG_FORMAT", LogFormat::Pretty),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * MIB
    }

    /// Pipeline settings derived from this configuration
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig::default()
            .with_cache_dir(PathBuf::from(&self.cache_dir))
            .with_max_input_bytes(self.max_file_size_bytes())
            .with_memory_capacity(self.memory_cache_entries)
            .with_durable_limits(
                Duration::from_secs(self.cache_max_age_days * 24 * 60 * 60),
                self.cache_max_size_mb * MIB,
            )
    }
}
