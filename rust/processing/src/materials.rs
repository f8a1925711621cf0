// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session-scoped store of parsed material libraries.

use cadlite_core::MaterialTable;
use rustc_hash::FxHashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Material tables keyed by the base name of the file they came from, so
/// `part.mtl` is found when `part.obj` is loaded. Writes are last-writer
/// wins.
#[derive(Debug, Default)]
pub struct MaterialLibrary {
    tables: RwLock<FxHashMap<String, Arc<MaterialTable>>>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, base_name: impl Into<String>, table: MaterialTable) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(base_name.into(), Arc::new(table));
    }

    pub fn get(&self, base_name: &str) -> Option<Arc<MaterialTable>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(base_name)
            .cloned()
    }

    pub fn remove(&self, base_name: &str) -> Option<Arc<MaterialTable>> {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(base_name)
    }

    pub fn clear(&self) {
        self.tables.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Stored base names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
