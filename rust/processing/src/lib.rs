// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # CAD-Lite Processing
//!
//! The load pipeline shared by every consumer of `cadlite-core`:
//! size check, content hashing, a two-tier content cache, format
//! dispatch and post-parse optimisation.
//!
//! ```rust,ignore
//! use cadlite_processing::{ContentCache, Loader, LoaderConfig, MaterialLibrary};
//! use std::sync::Arc;
//!
//! let config = LoaderConfig::default().with_cache_dir("./.cache");
//! let cache = Arc::new(ContentCache::open(&config).await);
//! let loader = Loader::new(config, cache, Arc::new(MaterialLibrary::new()));
//!
//! let assembly = loader
//!     .load_bytes("bracket.stl", bytes, &|event| println!("{:?}", event))
//!     .await?;
//! ```

pub mod cache;
pub mod command_kernel;
pub mod config;
pub mod error;
pub mod hash;
pub mod loader;
pub mod materials;
pub mod progress;

pub use cache::{CacheStats, ContentCache, DurableCache, LruCache};
pub use command_kernel::CommandKernel;
pub use config::LoaderConfig;
pub use error::{CacheError, LoadError, Result};
pub use hash::{content_hash, fnv1a_32, sha256_hex, HashAlgorithm};
pub use loader::{InputFile, Loader};
pub use materials::MaterialLibrary;
pub use progress::{NoProgress, ProgressEvent, ProgressSink, Stage};
