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


//! Service configuration
//!
//! Hosts pass the configuration as JSON when creating a service:
//!
//! ```json
//! {
//!   "root_certificate": "-----BEGIN CERTIFICATE-----\n...",
//!   "user_passphrases": ["library card 1234"],
//!   "revoked_certificates": ["04:1f"],
//!   "license_cache_capacity": 32
//! }
//! ```
//!
//! Only `root_certificate` is required.

use crate::crypto::{Certificate, UserKey};
use crate::error::{LcpError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of validated licenses kept per service
pub const DEFAULT_LICENSE_CACHE_CAPACITY: usize = 32;

/// Configuration for an LCP service
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Trusted root certificate, PEM or base64 DER
    pub root_certificate: String,

    /// Passphrases to derive user keys from
    pub user_passphrases: Vec<String>,

    /// Pre-hashed user keys, hex SHA-256
    pub user_keys: Vec<String>,

    /// Revoked provider certificate serials, hex
    pub revoked_certificates: Vec<String>,

    /// Revoked license ids
    pub revoked_licenses: Vec<String>,

    /// Certificate revocation list, base64 DER
    pub revocation_list: Option<String>,

    /// Maximum number of validated licenses to cache
    pub license_cache_capacity: usize,

    /// Require the provider certificate to be valid at the license date
    pub check_certificate_dates: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_certificate: String::new(),
            user_passphrases: Vec::new(),
            user_keys: Vec::new(),
            revoked_certificates: Vec::new(),
            revoked_licenses: Vec::new(),
            revocation_list: None,
            license_cache_capacity: DEFAULT_LICENSE_CACHE_CAPACITY,
            check_certificate_dates: true,
        }
    }
}

// Passphrases and keys stay out of debug output
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("root_certificate_len", &self.root_certificate.len())
            .field("user_passphrases", &self.user_passphrases.len())
            .field("user_keys", &self.user_keys.len())
            .field("revoked_certificates", &self.revoked_certificates)
            .field("revoked_licenses", &self.revoked_licenses)
            .field("revocation_list", &self.revocation_list.is_some())
            .field("license_cache_capacity", &self.license_cache_capacity)
            .field("check_certificate_dates", &self.check_certificate_dates)
            .finish()
    }
}

impl ServiceConfig {
    pub fn new(root_certificate: impl Into<String>) -> Self {
        Self {
            root_certificate: root_certificate.into(),
            ..Default::default()
        }
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.user_passphrases.push(passphrase.into());
        self
    }

    pub fn with_revoked_certificate(mut self, serial: impl Into<String>) -> Self {
        self.revoked_certificates.push(serial.into());
        self
    }

    pub fn with_revoked_license(mut self, license_id: impl Into<String>) -> Self {
        self.revoked_licenses.push(license_id.into());
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.license_cache_capacity = capacity;
        self
    }

    pub fn with_certificate_dates(mut self, check: bool) -> Self {
        self.check_certificate_dates = check;
        self
    }

    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LcpError::invalid_config(format!("Invalid service config JSON: {}", e)))
    }

    /// Read a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            LcpError::invalid_config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Check every field and decode what the service needs
    ///
    /// # Errors
    /// - InvalidConfiguration naming the first offending field
    pub fn validate(&self) -> Result<ValidatedConfig> {
        if self.root_certificate.trim().is_empty() {
            return Err(LcpError::invalid_config("root_certificate is required"));
        }
        let root_certificate = Certificate::from_pem_or_base64(&self.root_certificate)
            .map_err(|e| LcpError::invalid_config(format!("root_certificate: {}", e)))?;

        if self.license_cache_capacity == 0 {
            return Err(LcpError::invalid_config(
                "license_cache_capacity must be at least 1",
            ));
        }

        let mut user_keys: Vec<UserKey> = self
            .user_passphrases
            .iter()
            .map(|p| UserKey::from_passphrase(p))
            .collect();
        for (i, hex_key) in self.user_keys.iter().enumerate() {
            let key = UserKey::from_hex(hex_key)
                .map_err(|e| LcpError::invalid_config(format!("user_keys[{}]: {}", i, e)))?;
            user_keys.push(key);
        }

        let revocation_list = match &self.revocation_list {
            Some(encoded) => Some(
                STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| LcpError::invalid_config(format!("revocation_list: {}", e)))?,
            ),
            None => None,
        };

        Ok(ValidatedConfig {
            root_certificate,
            user_keys,
            revoked_certificates: self.revoked_certificates.clone(),
            revoked_licenses: self.revoked_licenses.clone(),
            revocation_list,
            license_cache_capacity: self.license_cache_capacity,
            check_certificate_dates: self.check_certificate_dates,
        })
    }
}

/// Decoded configuration, ready to build a service from
#[derive(Debug)]
pub struct ValidatedConfig {
    pub root_certificate: Certificate,
    pub user_keys: Vec<UserKey>,
    pub revoked_certificates: Vec<String>,
    pub revoked_licenses: Vec<String>,
    pub revocation_list: Option<Vec<u8>>,
    pub license_cache_capacity: usize,
    pub check_certificate_dates: bool,
}
