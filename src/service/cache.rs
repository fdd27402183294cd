// lcp-core - Readium LCP license and decryption service
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Validated-license cache
//!
//! Keyed by the SHA-256 of the license content. Only the content-only
//! verification result is cached; revocation, the rights window and key
//! matching are re-run by the service on every call.

use crate::license::VerifiedLicense;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Least-recently-used cache of verified licenses
#[derive(Debug)]
pub struct LicenseCache {
    capacity: usize,
    entries: HashMap<String, Arc<VerifiedLicense>>,
    // Front is least recently used
    order: VecDeque<String>,
}

impl LicenseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Look up an entry and mark it most recently used
    pub fn get(&mut self, content_hash: &str) -> Option<Arc<VerifiedLicense>> {
        let entry = self.entries.get(content_hash).cloned()?;
        self.touch(content_hash);
        Some(entry)
    }

    /// Insert an entry, evicting the least recently used one when full
    pub fn insert(&mut self, verified: VerifiedLicense) -> Arc<VerifiedLicense> {
        let key = verified.content_hash.clone();
        let entry = Arc::new(verified);

        if self.entries.insert(key.clone(), Arc::clone(&entry)).is_some() {
            self.touch(&key);
            return entry;
        }

        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        entry
    }

    pub fn contains(&self, content_hash: &str) -> bool {
        self.entries.contains_key(content_hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self, content_hash: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == content_hash) {
            if let Some(key) = self.order.remove(pos) {
                self.order.push_back(key);
            }
        }
    }
}
