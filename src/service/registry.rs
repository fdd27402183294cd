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


//! Handle registry
//!
//! Services live in a slot arena. A handle packs the slot generation in the
//! high 32 bits and the slot index plus one in the low 32 bits:
//!
//! ```text
//! handle = (generation << 32) | (index + 1)
//! ```
//!
//! Releasing a slot bumps its generation, so a stale handle never resolves
//! to a service created later in the same slot. Zero is never a valid handle.

use crate::error::{LcpError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque service handle passed across the FFI boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceHandle(u64);

impl ServiceHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }

    fn new(index: usize, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64 + 1))
    }

    fn index(&self) -> Option<usize> {
        let low = (self.0 & 0xffff_ffff) as usize;
        low.checked_sub(1)
    }

    fn generation(&self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl std::fmt::Display for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

/// Generational arena of shared values
#[derive(Debug)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value and return its handle
    pub fn insert(&mut self, value: T) -> ServiceHandle {
        let value = Arc::new(value);
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.value = Some(value);
                ServiceHandle::new(index, slot.generation)
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                ServiceHandle::new(self.slots.len() - 1, 0)
            }
        }
    }

    /// Resolve a handle to a shared reference
    ///
    /// # Errors
    /// - InvalidHandle if the handle was never issued or was released
    pub fn get(&self, handle: ServiceHandle) -> Result<Arc<T>> {
        self.slot(handle)
            .and_then(|slot| slot.value.clone())
            .ok_or(LcpError::InvalidHandle(handle.as_raw()))
    }

    /// Release a handle
    ///
    /// Operations already holding the value keep it alive until they finish.
    pub fn remove(&mut self, handle: ServiceHandle) -> Result<Arc<T>> {
        let index = handle
            .index()
            .ok_or(LcpError::InvalidHandle(handle.as_raw()))?;
        let slot = match self.slots.get_mut(index) {
            Some(slot) if slot.generation == handle.generation() && slot.value.is_some() => slot,
            _ => return Err(LcpError::InvalidHandle(handle.as_raw())),
        };

        let value = slot.value.take().ok_or(LcpError::InvalidHandle(handle.as_raw()))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        Ok(value)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.value.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, handle: ServiceHandle) -> Option<&Slot<T>> {
        let slot = self.slots.get(handle.index()?)?;
        (slot.generation == handle.generation()).then_some(slot)
    }
}
