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


//! Revoked provider certificates and license ids

use crate::crypto::certificate::{normalize_serial, revoked_serials_from_crl};
use crate::error::{LcpError, LicenseError, Result};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct RevocationState {
    certificates: HashSet<String>,
    licenses: HashSet<String>,
}

impl RevocationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke a certificate by serial (hex, any case, colons allowed)
    ///
    /// Returns false if the serial was already revoked.
    pub fn revoke_certificate(&mut self, serial: &str) -> bool {
        self.certificates.insert(normalize_serial(serial))
    }

    /// Returns false if the license id was already revoked.
    pub fn revoke_license(&mut self, license_id: &str) -> bool {
        self.licenses.insert(license_id.to_string())
    }

    /// Merge the serials listed in a DER CRL, returning how many were new
    pub fn merge_crl(&mut self, der: &[u8]) -> Result<usize> {
        let serials = revoked_serials_from_crl(der)
            .map_err(|e| LcpError::invalid_input(format!("Cannot load revocation list: {}", e)))?;
        Ok(serials
            .into_iter()
            .filter(|serial| self.certificates.insert(serial.clone()))
            .count())
    }

    pub fn is_certificate_revoked(&self, serial: &str) -> bool {
        self.certificates.contains(&normalize_serial(serial))
    }

    pub fn is_license_revoked(&self, license_id: &str) -> bool {
        self.licenses.contains(license_id)
    }

    /// Fail with `Revoked` if either the license or its provider certificate is
    pub fn check(&self, license_id: &str, certificate_serial: &str) -> Result<()> {
        if self.is_license_revoked(license_id) {
            return Err(LicenseError::Revoked(format!("license {} is revoked", license_id)).into());
        }
        if self.is_certificate_revoked(certificate_serial) {
            return Err(LicenseError::Revoked(format!(
                "provider certificate {} is revoked",
                certificate_serial
            ))
            .into());
        }
        Ok(())
    }

    pub fn revoked_certificate_count(&self) -> usize {
        self.certificates.len()
    }

    pub fn revoked_license_count(&self) -> usize {
        self.licenses.len()
    }
}
