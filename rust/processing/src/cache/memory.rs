// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-capacity LRU map.
//!
//! Entries live in a slab linked most-recent-last; the hash index maps keys
//! to slab slots so `get`, `insert` and `remove` are O(1).

use rustc_hash::FxHashMap;

#[derive(Debug)]
struct Node<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
pub struct LruCache<V> {
    capacity: usize,
    index: FxHashMap<String, usize>,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    /// Least recently used
    head: Option<usize>,
    /// Most recently used
    tail: Option<usize>,
}

impl<V> LruCache<V> {
    /// A capacity of zero stores nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: FxHashMap::default(),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Look up a value and mark it most recently used
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.detach(slot);
        self.push_back(slot);
        self.slots[slot].as_ref().map(|n| &n.value)
    }

    /// Look up without touching recency
    pub fn peek(&self, key: &str) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.slots[slot].as_ref().map(|n| &n.value)
    }

    /// Insert or replace a value as most recently used. Returns the key
    /// evicted to make room, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<String> {
        if self.capacity == 0 {
            return None;
        }
        let key = key.into();

        if let Some(&slot) = self.index.get(&key) {
            if let Some(node) = self.slots[slot].as_mut() {
                node.value = value;
            }
            self.detach(slot);
            self.push_back(slot);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.pop_front()
        } else {
            None
        };

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, slot);
        self.push_back(slot);
        evicted
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.detach(slot);
        self.free.push(slot);
        self.slots[slot].take().map(|n| n.value)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            match self.slots[slot].as_ref() {
                Some(node) => {
                    keys.push(node.key.as_str());
                    cursor = node.next;
                }
                None => break,
            }
        }
        keys
    }

    fn pop_front(&mut self) -> Option<String> {
        let slot = self.head?;
        self.detach(slot);
        self.free.push(slot);
        let node = self.slots[slot].take()?;
        self.index.remove(&node.key);
        Some(node.key)
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = match self.slots[slot].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(n) = self.slots[p].as_mut() {
                    n.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.slots[nx].as_mut() {
                    n.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(node) = self.slots[slot].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_back(&mut self, slot: usize) {
        let old_tail = self.tail;
        if let Some(node) = self.slots[slot].as_mut() {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(t) => {
                if let Some(n) = self.slots[t].as_mut() {
                    n.next = Some(slot);
                }
            }
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }
}
