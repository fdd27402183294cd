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


//! LCP service
//!
//! An [`LcpService`] holds everything a host needs to open licenses and
//! decrypt publications: the trusted root certificate, the user keys, the
//! revocation state and a cache of verified licenses.
//!
//! Hosts address services through opaque [`ServiceHandle`]s issued by a
//! process-wide registry. Every handle-level function resolves the handle,
//! clones the service `Arc` out of the registry and releases the registry
//! lock before doing any work.
//!
//! # Locking
//! - User keys and revocation state: `RwLock`
//! - License cache and rights ledger: `Mutex`
//! - Container writes: one `Mutex<()>` per service, so injections are
//!   serialized while decryptions run concurrently

pub mod cache;
pub mod registry;

pub use registry::{Registry, ServiceHandle};

use crate::config::{ServiceConfig, ValidatedConfig};
use crate::container;
use crate::crypto::{sha256_hex, Certificate, UserKey};
use crate::decrypt;
use crate::error::{DecryptError, LcpError, Result};
use crate::license::validator::{self, LicenseValidator, VerifiedLicense};
use crate::license::{
    Keyring, License, RevocationState, Right, RightsLedger, RightsReport, UserKeyScope,
};
use cache::LicenseCache;
use chrono::Utc;
use lazy_static::lazy_static;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

lazy_static! {
    static ref SERVICES: Mutex<Registry<LcpService>> = Mutex::new(Registry::new());
}

/// License and decryption service
#[derive(Debug)]
pub struct LcpService {
    root_certificate: Certificate,
    check_certificate_dates: bool,
    user_keys: RwLock<Keyring>,
    revocation: RwLock<RevocationState>,
    cache: Mutex<LicenseCache>,
    rights: Mutex<RightsLedger>,
    container_lock: Mutex<()>,
}

impl LcpService {
    /// Build a service from a configuration
    ///
    /// # Errors
    /// - InvalidConfiguration if the configuration does not validate
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        Self::from_validated(config.validate()?)
    }

    fn from_validated(config: ValidatedConfig) -> Result<Self> {
        let mut revocation = RevocationState::new();
        for serial in &config.revoked_certificates {
            revocation.revoke_certificate(serial);
        }
        for license_id in &config.revoked_licenses {
            revocation.revoke_license(license_id);
        }
        if let Some(crl) = &config.revocation_list {
            revocation
                .merge_crl(crl)
                .map_err(|e| LcpError::invalid_config(format!("revocation_list: {}", e)))?;
        }

        let mut user_keys = Keyring::new();
        for key in config.user_keys {
            user_keys.add(key, UserKeyScope::any());
        }

        debug!(
            root = %config.root_certificate.subject(),
            user_keys = user_keys.len(),
            revoked_certificates = revocation.revoked_certificate_count(),
            revoked_licenses = revocation.revoked_license_count(),
            "Building LCP service"
        );

        Ok(Self {
            root_certificate: config.root_certificate,
            check_certificate_dates: config.check_certificate_dates,
            user_keys: RwLock::new(user_keys),
            revocation: RwLock::new(revocation),
            cache: Mutex::new(LicenseCache::new(config.license_cache_capacity)),
            rights: Mutex::new(RightsLedger::new()),
            container_lock: Mutex::new(()),
        })
    }

    /// Open and validate a license
    ///
    /// # Errors
    /// - Any `LicenseError` kind; a license that fails is never returned
    pub fn open_license(&self, license_content: &str) -> Result<License> {
        let verified = self.verified(license_content)?;

        let revocation = self.revocation.read().map_err(poisoned)?;
        let user_keys = self.user_keys.read().map_err(poisoned)?;
        let license = validator::evaluate(&verified, &revocation, &user_keys, Utc::now())?;

        debug!(
            license_id = %license.id(),
            has_content_key = license.has_content_key(),
            "Opened license"
        );
        Ok(license)
    }

    /// Read the license embedded in a container and open it
    pub fn open_container_license(&self, container_path: &Path) -> Result<License> {
        let content = container::read_license(container_path)?;
        self.open_license(&content)
    }

    /// Write or replace the license inside a container
    ///
    /// Holds the service container lock for the whole rewrite.
    pub fn inject_license(&self, container_path: &Path, license_content: &str) -> Result<()> {
        let _guard = self.container_lock.lock().map_err(poisoned)?;
        container::inject_license(container_path, license_content)
    }

    /// Decrypt a resource with the content key of a license
    ///
    /// Returns the number of plaintext bytes written.
    ///
    /// # Errors
    /// - Any `LicenseError` if the license does not validate
    /// - KeyUnavailable if no user key unlocks the license
    /// - IoFailure or CorruptCiphertext from the transform itself
    pub fn decrypt_file(
        &self,
        license_content: &str,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<u64> {
        let license = self.open_license(license_content)?;
        let content_key = license.content_key().ok_or_else(|| {
            DecryptError::KeyUnavailable(format!(
                "no user key matches license {}",
                license.id()
            ))
        })?;

        decrypt::decrypt_file(content_key, input_path, output_path)
    }

    /// Register a user passphrase
    ///
    /// Returns false if the derived key was already known.
    pub fn add_user_key(&self, passphrase: &str) -> Result<bool> {
        self.insert_user_key(UserKey::from_passphrase(passphrase), UserKeyScope::any())
    }

    /// Register a user key given as hex SHA-256
    pub fn add_user_key_hex(&self, hex_key: &str) -> Result<bool> {
        self.insert_user_key(UserKey::from_hex(hex_key)?, UserKeyScope::any())
    }

    /// Register a user key given as hex SHA-256, tried only on licenses
    /// matching `scope`
    pub fn add_scoped_user_key_hex(&self, hex_key: &str, scope: UserKeyScope) -> Result<bool> {
        self.insert_user_key(UserKey::from_hex(hex_key)?, scope)
    }

    /// Print and copy allowances of a license
    ///
    /// # Errors
    /// - Any `LicenseError` if the license does not validate
    pub fn rights(&self, license_content: &str) -> Result<RightsReport> {
        let license = self.open_license(license_content)?;
        Ok(self.rights.lock().map_err(poisoned)?.report(license.document()))
    }

    /// Use up `amount` pages (print) or characters (copy) of a license
    ///
    /// # Errors
    /// - Any `LicenseError` if the license does not validate
    /// - RightUnavailable if less than `amount` is left
    pub fn consume_right(
        &self,
        license_content: &str,
        right: Right,
        amount: u64,
    ) -> Result<RightsReport> {
        let license = self.open_license(license_content)?;
        let report = self
            .rights
            .lock()
            .map_err(poisoned)?
            .consume(license.document(), right, amount)?;
        info!(license_id = %license.id(), %right, amount, "Consumed license right");
        Ok(report)
    }

    /// Revoke a license id for this service
    pub fn revoke_license(&self, license_id: &str) -> Result<bool> {
        let added = self.revocation.write().map_err(poisoned)?.revoke_license(license_id);
        info!(license_id, added, "Revoked license");
        Ok(added)
    }

    /// Revoke a provider certificate serial for this service
    pub fn revoke_certificate(&self, serial_hex: &str) -> Result<bool> {
        let added = self
            .revocation
            .write()
            .map_err(poisoned)?
            .revoke_certificate(serial_hex);
        info!(serial = serial_hex, added, "Revoked certificate");
        Ok(added)
    }

    /// Merge a DER CRL into the revocation state
    ///
    /// Returns the number of newly revoked serials.
    pub fn load_revocation_list(&self, crl_der: &[u8]) -> Result<usize> {
        let added = self.revocation.write().map_err(poisoned)?.merge_crl(crl_der)?;
        info!(added, "Loaded certificate revocation list");
        Ok(added)
    }

    pub fn cached_license_count(&self) -> Result<usize> {
        Ok(self.cache.lock().map_err(poisoned)?.len())
    }

    fn insert_user_key(&self, key: UserKey, scope: UserKeyScope) -> Result<bool> {
        let mut keys = self.user_keys.write().map_err(poisoned)?;
        let added = keys.add(key, scope);
        debug!(user_keys = keys.len(), added, "Added user key");
        Ok(added)
    }

    /// Content-only verification, served from the cache when possible
    fn verified(&self, license_content: &str) -> Result<Arc<VerifiedLicense>> {
        let content_hash = sha256_hex(license_content.as_bytes());
        if let Some(hit) = self.cache.lock().map_err(poisoned)?.get(&content_hash) {
            debug!(content_hash = %content_hash, "License cache hit");
            return Ok(hit);
        }

        // Verification runs without the cache lock so concurrent opens of
        // different licenses do not serialize on RSA work
        let verified = LicenseValidator::new(&self.root_certificate, self.check_certificate_dates)
            .verify(license_content)
            .map_err(|e| {
                warn!(error = %e, "License verification failed");
                e
            })?;

        Ok(self.cache.lock().map_err(poisoned)?.insert(verified))
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> LcpError {
    LcpError::internal("service lock poisoned by a panicked operation")
}

fn registry() -> Result<std::sync::MutexGuard<'static, Registry<LcpService>>> {
    SERVICES
        .lock()
        .map_err(|_| LcpError::internal("service registry lock poisoned"))
}

/// Resolve a handle to its service
pub fn service(handle: ServiceHandle) -> Result<Arc<LcpService>> {
    registry()?.get(handle)
}

// ===== Handle-level API =====

/// Create a service and return its handle
pub fn create_service(config: &ServiceConfig) -> Result<ServiceHandle> {
    let service = LcpService::new(config)?;
    let handle = registry()?.insert(service);
    info!(handle = %handle, "Created LCP service");
    Ok(handle)
}

/// Release a service
///
/// Operations already running on it finish normally; later calls with the
/// same handle fail with InvalidHandle.
pub fn release_service(handle: ServiceHandle) -> Result<()> {
    registry()?.remove(handle)?;
    info!(handle = %handle, "Released LCP service");
    Ok(())
}

pub fn open_license(handle: ServiceHandle, license_content: &str) -> Result<License> {
    service(handle)?.open_license(license_content)
}

pub fn inject_license(
    handle: ServiceHandle,
    container_path: &Path,
    license_content: &str,
) -> Result<()> {
    service(handle)?.inject_license(container_path, license_content)
}

pub fn decrypt_file(
    handle: ServiceHandle,
    license_content: &str,
    input_path: &Path,
    output_path: &Path,
) -> Result<u64> {
    service(handle)?.decrypt_file(license_content, input_path, output_path)
}

pub fn open_container_license(handle: ServiceHandle, container_path: &Path) -> Result<License> {
    service(handle)?.open_container_license(container_path)
}

pub fn add_user_key(handle: ServiceHandle, passphrase: &str) -> Result<bool> {
    service(handle)?.add_user_key(passphrase)
}

pub fn add_user_key_hex(handle: ServiceHandle, hex_key: &str) -> Result<bool> {
    service(handle)?.add_user_key_hex(hex_key)
}

pub fn add_scoped_user_key_hex(
    handle: ServiceHandle,
    hex_key: &str,
    scope: UserKeyScope,
) -> Result<bool> {
    service(handle)?.add_scoped_user_key_hex(hex_key, scope)
}

pub fn rights(handle: ServiceHandle, license_content: &str) -> Result<RightsReport> {
    service(handle)?.rights(license_content)
}

pub fn consume_right(
    handle: ServiceHandle,
    license_content: &str,
    right: Right,
    amount: u64,
) -> Result<RightsReport> {
    service(handle)?.consume_right(license_content, right, amount)
}

pub fn revoke_license(handle: ServiceHandle, license_id: &str) -> Result<bool> {
    service(handle)?.revoke_license(license_id)
}

pub fn revoke_certificate(handle: ServiceHandle, serial_hex: &str) -> Result<bool> {
    service(handle)?.revoke_certificate(serial_hex)
}

pub fn load_revocation_list(handle: ServiceHandle, crl_der: &[u8]) -> Result<usize> {
    service(handle)?.load_revocation_list(crl_der)
}
