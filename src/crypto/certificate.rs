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


//! X.509 certificates and revocation lists
//!
//! # Trust Model
//! - The service is configured with one root certificate.
//! - Each license embeds its provider certificate (base64 DER).
//! - The provider certificate must be signed by the root with
//!   sha256WithRSAEncryption, and must not appear in the revocation state.
//!
//! Only the fields the license checks need are exposed: the subject public
//! key, the serial number and the validity window.

use crate::crypto::signature::verify_rsa_sha256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use thiserror::Error;
use x509_cert::crl::CertificateList;
use x509_cert::der::oid::ObjectIdentifier;
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::time::Time;

/// sha256WithRSAEncryption (RFC 4055)
pub const SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// Certificate handling failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    #[error("certificate encoding is invalid: {0}")]
    Encoding(String),

    #[error("unsupported signature algorithm {0}")]
    UnsupportedAlgorithm(String),

    #[error("certificate is not signed by the trusted root: {0}")]
    UntrustedIssuer(String),

    #[error("certificate was not valid at {0}")]
    NotValidAt(DateTime<Utc>),
}

/// A parsed X.509 certificate
#[derive(Debug, Clone)]
pub struct Certificate {
    inner: x509_cert::Certificate,
}

impl Certificate {
    /// Parse a DER-encoded certificate
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        let inner = x509_cert::Certificate::from_der(der)
            .map_err(|e| CertificateError::Encoding(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse a base64 DER certificate, the form embedded in licenses
    pub fn from_base64(encoded: &str) -> Result<Self, CertificateError> {
        let der = decode_base64(encoded)?;
        Self::from_der(&der)
    }

    /// Parse a PEM certificate or bare base64 DER
    ///
    /// Accepts the two forms hosts use to ship the root certificate.
    pub fn from_pem_or_base64(text: &str) -> Result<Self, CertificateError> {
        let text = text.trim();
        if text.starts_with("-----") {
            let inner = x509_cert::Certificate::from_pem(text)
                .map_err(|e| CertificateError::Encoding(format!("invalid PEM: {}", e)))?;
            Ok(Self { inner })
        } else {
            Self::from_base64(text)
        }
    }

    /// Serial number as normalized lowercase hex
    pub fn serial_hex(&self) -> String {
        normalize_serial(&hex::encode(self.inner.tbs_certificate.serial_number.as_bytes()))
    }

    /// Subject distinguished name
    pub fn subject(&self) -> String {
        self.inner.tbs_certificate.subject.to_string()
    }

    /// Start of the validity window
    pub fn not_before(&self) -> DateTime<Utc> {
        time_to_datetime(&self.inner.tbs_certificate.validity.not_before)
    }

    /// End of the validity window
    pub fn not_after(&self) -> DateTime<Utc> {
        time_to_datetime(&self.inner.tbs_certificate.validity.not_after)
    }

    /// Check that `at` falls inside the validity window
    pub fn check_valid_at(&self, at: DateTime<Utc>) -> Result<(), CertificateError> {
        if at < self.not_before() || at > self.not_after() {
            return Err(CertificateError::NotValidAt(at));
        }
        Ok(())
    }

    /// RSA public key from the subject public key info
    pub fn public_key(&self) -> Result<RsaPublicKey, CertificateError> {
        let spki = self
            .inner
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| CertificateError::Encoding(e.to_string()))?;
        RsaPublicKey::from_public_key_der(&spki)
            .map_err(|e| CertificateError::Encoding(format!("not an RSA public key: {}", e)))
    }

    /// Verify that `issuer` signed this certificate
    pub fn verify_issued_by(&self, issuer: &Certificate) -> Result<(), CertificateError> {
        let algorithm = self.inner.signature_algorithm.oid;
        if algorithm != SHA256_WITH_RSA {
            return Err(CertificateError::UnsupportedAlgorithm(algorithm.to_string()));
        }

        let tbs = self
            .inner
            .tbs_certificate
            .to_der()
            .map_err(|e| CertificateError::Encoding(e.to_string()))?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CertificateError::Encoding("signature bit string has unused bits".to_string())
        })?;

        let issuer_key = issuer.public_key()?;
        verify_rsa_sha256(&issuer_key, &tbs, signature).map_err(CertificateError::UntrustedIssuer)
    }
}

/// Revoked serial numbers listed in a DER-encoded CRL
///
/// The list is trusted as configured; its own signature is not checked.
pub fn revoked_serials_from_crl(der: &[u8]) -> Result<Vec<String>, CertificateError> {
    let crl = CertificateList::from_der(der)
        .map_err(|e| CertificateError::Encoding(format!("invalid CRL: {}", e)))?;

    Ok(crl
        .tbs_cert_list
        .revoked_certificates
        .unwrap_or_default()
        .iter()
        .map(|revoked| normalize_serial(&hex::encode(revoked.serial_number.as_bytes())))
        .collect())
}

/// Normalize a hex serial so that `00:1A`, `1a` and `001A` compare equal
pub fn normalize_serial(serial: &str) -> String {
    let digits: String = serial
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, CertificateError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| CertificateError::Encoding(format!("invalid base64: {}", e)))
}

fn time_to_datetime(time: &Time) -> DateTime<Utc> {
    let secs = time.to_unix_duration().as_secs() as i64;
    Utc.timestamp_opt(secs, 0).single().unwrap_or(DateTime::<Utc>::MAX_UTC)
}
