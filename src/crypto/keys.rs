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


//! User keys and content keys
//!
//! # Key Hierarchy (basic profile)
//! - **User key**: SHA-256 of the user passphrase. Never stored in the license.
//! - **Content key**: random AES-256 key chosen by the provider, stored in the
//!   license encrypted with the user key.
//!
//! Both are 32 bytes and are wiped from memory on drop. Neither is ever
//! written to logs; `Debug` prints a redacted placeholder.

use crate::error::{LcpError, Result};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of user and content keys in bytes (AES-256)
pub const KEY_SIZE: usize = 32;

/// Key derived from a user passphrase
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct UserKey([u8; KEY_SIZE]);

impl UserKey {
    /// Derive a user key from a passphrase (SHA-256 of its UTF-8 bytes)
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Parse a user key from its hex encoding
    ///
    /// Hosts that keep hashed passphrases in their own key store hand them
    /// over in this form.
    ///
    /// # Errors
    /// - InvalidInput if the string is not 64 hex characters
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let decoded = hex::decode(hex_key.trim())
            .map_err(|e| LcpError::invalid_input(format!("Invalid user key hex: {}", e)))?;
        let bytes: [u8; KEY_SIZE] = decoded.as_slice().try_into().map_err(|_| {
            LcpError::invalid_input(format!(
                "User key must be {} bytes, got {}",
                KEY_SIZE,
                decoded.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UserKey").field(&"[REDACTED]").finish()
    }
}

/// Key that decrypts the publication resources
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey([u8; KEY_SIZE]);

impl ContentKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a content key from a decrypted buffer
    ///
    /// # Errors
    /// - InvalidInput if the buffer is not exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            LcpError::invalid_input(format!(
                "Content key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ContentKey").field(&"[REDACTED]").finish()
    }
}

/// SHA-256 of the given bytes as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
