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


//! User keys known to a service
//!
//! A key may be scoped to a user id, a provider or a single license. Scoped
//! keys are only tried against licenses that match every field the scope
//! sets; an empty scope matches all licenses.

use crate::crypto::UserKey;
use crate::license::document::LicenseDocument;
use serde::{Deserialize, Serialize};

/// Licenses a user key applies to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserKeyScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_id: Option<String>,
}

impl UserKeyScope {
    /// Scope that matches every license
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matches(&self, document: &LicenseDocument) -> bool {
        let user_id = document.user.as_ref().and_then(|user| user.id.as_deref());
        self.license_id.as_deref().map_or(true, |id| id == document.id)
            && self.provider.as_deref().map_or(true, |p| p == document.provider)
            && self.user_id.as_deref().map_or(true, |u| Some(u) == user_id)
    }
}

#[derive(Debug, Default)]
pub struct Keyring {
    entries: Vec<(UserKey, UserKeyScope)>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key under a scope
    ///
    /// Returns false if the same key was already registered with the same
    /// scope.
    pub fn add(&mut self, key: UserKey, scope: UserKeyScope) -> bool {
        if self.entries.iter().any(|(k, s)| *k == key && *s == scope) {
            return false;
        }
        self.entries.push((key, scope));
        true
    }

    /// Keys whose scope matches `document`, in registration order
    pub fn candidates<'a>(
        &'a self,
        document: &'a LicenseDocument,
    ) -> impl Iterator<Item = &'a UserKey> + 'a {
        self.entries
            .iter()
            .filter(move |(_, scope)| scope.matches(document))
            .map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
