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


//! License validation
//!
//! # Checks
//! Validation is split in two stages.
//!
//! [`LicenseValidator::verify`] covers everything that depends only on the
//! license content and the root certificate:
//! 1. Parse and structural checks
//! 2. Encryption profile
//! 3. Algorithm identifiers
//! 4. Provider certificate signed by the root
//! 5. Provider certificate valid at the license date
//! 6. Document signature over the canonical form
//!
//! Its output is stable for a given content and can be cached.
//!
//! [`evaluate`] covers the checks whose outcome changes over time:
//! 7. Revocation of the license id or provider certificate
//! 8. Rights window against the current time
//! 9. User key matching and content key decryption
//! 10. Decryption of the user fields listed in `user.encrypted`

use crate::crypto::signature::verify_rsa_sha256;
use crate::crypto::{aes_cbc, algorithms, sha256_hex, Certificate, ContentKey, UserKey};
use crate::decrypt::decrypt_resource;
use crate::error::{LcpError, LicenseError, Result};
use crate::license::document::{canonical_form, LicenseDocument, UserInfo, BASIC_PROFILE};
use crate::license::keyring::Keyring;
use crate::license::model::License;
use crate::license::revocation::RevocationState;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

/// License content that passed the content-only checks
#[derive(Debug, Clone)]
pub struct VerifiedLicense {
    pub document: LicenseDocument,
    pub original_content: String,
    pub content_hash: String,
    pub certificate_serial: String,
}

/// Verifies license content against a trusted root certificate
pub struct LicenseValidator<'a> {
    root: &'a Certificate,
    check_certificate_dates: bool,
}

impl<'a> LicenseValidator<'a> {
    pub fn new(root: &'a Certificate, check_certificate_dates: bool) -> Self {
        Self {
            root,
            check_certificate_dates,
        }
    }

    /// Run the content-only checks
    ///
    /// # Errors
    /// - MalformedLicense for parse, structure and algorithm failures
    /// - UnsupportedProfile for any profile other than basic
    /// - SignatureInvalid for certificate chain, certificate date and
    ///   document signature failures
    pub fn verify(&self, content: &str) -> Result<VerifiedLicense> {
        let document = LicenseDocument::parse(content)?;

        check_profile(&document)?;
        check_algorithms(&document)?;

        let provider = Certificate::from_base64(&document.signature.certificate)
            .map_err(|e| LcpError::signature_invalid(format!("provider certificate: {}", e)))?;
        provider
            .verify_issued_by(self.root)
            .map_err(|e| LcpError::signature_invalid(format!("provider certificate: {}", e)))?;

        if self.check_certificate_dates {
            provider
                .check_valid_at(document.effective_date())
                .map_err(|e| LcpError::signature_invalid(format!("provider certificate: {}", e)))?;
        }

        let canonical = canonical_form(content)?;
        let signature = document.signature_bytes()?;
        let provider_key = provider
            .public_key()
            .map_err(|e| LcpError::signature_invalid(format!("provider key: {}", e)))?;
        verify_rsa_sha256(&provider_key, canonical.as_bytes(), &signature)
            .map_err(LcpError::signature_invalid)?;

        Ok(VerifiedLicense {
            certificate_serial: provider.serial_hex(),
            content_hash: sha256_hex(content.as_bytes()),
            original_content: content.to_string(),
            document,
        })
    }
}

/// Run the time-dependent checks and build the caller's `License`
///
/// # Errors
/// - Revoked, Expired or NotYetValid
/// - MalformedLicense if a user key matches but the content key or the
///   encrypted user fields cannot be decrypted with it
pub fn evaluate(
    verified: &VerifiedLicense,
    revocation: &RevocationState,
    keyring: &Keyring,
    now: DateTime<Utc>,
) -> Result<License> {
    let document = &verified.document;
    revocation.check(&document.id, &verified.certificate_serial)?;
    check_rights_window(document, now)?;
    let content_key = unlock_content_key(document, keyring.candidates(document))?;

    let user = match (&document.user, &content_key) {
        (Some(user), Some(key)) => Some(decrypt_user_info(user, key)?),
        (user, _) => user.clone(),
    };

    Ok(License::new(
        document.clone(),
        verified.original_content.clone(),
        verified.content_hash.clone(),
        verified.certificate_serial.clone(),
        user,
        content_key,
    ))
}

/// Fail if `now` is outside the license rights window
pub fn check_rights_window(document: &LicenseDocument, now: DateTime<Utc>) -> Result<()> {
    let Some(rights) = &document.rights else {
        return Ok(());
    };
    if let Some(end) = rights.end {
        if end < now {
            return Err(LicenseError::Expired { end }.into());
        }
    }
    if let Some(start) = rights.start {
        if start > now {
            return Err(LicenseError::NotYetValid { start }.into());
        }
    }
    Ok(())
}

/// Find the user key that passes the key check and decrypt the content key
///
/// Returns `Ok(None)` when no key matches.
pub fn unlock_content_key<'k>(
    document: &LicenseDocument,
    user_keys: impl IntoIterator<Item = &'k UserKey>,
) -> Result<Option<ContentKey>> {
    let key_check = document.key_check_bytes()?;
    let Some(user_key) = user_keys
        .into_iter()
        .find(|key| passes_key_check(key, &key_check, &document.id))
    else {
        return Ok(None);
    };

    let encrypted = document.encrypted_content_key_bytes()?;
    let plaintext = Zeroizing::new(
        aes_cbc::decrypt(user_key.as_bytes(), &encrypted)
            .map_err(|e| LcpError::malformed(format!("content key does not decrypt: {}", e)))?,
    );
    let content_key = ContentKey::from_slice(&plaintext)
        .map_err(|e| LcpError::malformed(format!("content key: {}", e)))?;
    Ok(Some(content_key))
}

/// Replace the user fields named in `user.encrypted` by their plaintext
///
/// Providers encrypt `email` and `name` with the content key. Unknown field
/// names are left as they are.
pub fn decrypt_user_info(user: &UserInfo, content_key: &ContentKey) -> Result<UserInfo> {
    let mut decrypted = user.clone();
    for field in &user.encrypted {
        let slot = match field.as_str() {
            "email" => &mut decrypted.email,
            "name" => &mut decrypted.name,
            _ => continue,
        };
        let Some(encoded) = slot.as_deref() else {
            continue;
        };
        let data = STANDARD
            .decode(encoded)
            .map_err(|e| LcpError::malformed(format!("user.{}: invalid base64: {}", field, e)))?;
        let plaintext = decrypt_resource(content_key, &data)
            .map_err(|e| LcpError::malformed(format!("user.{}: {}", field, e)))?;
        let value = String::from_utf8(plaintext)
            .map_err(|e| LcpError::malformed(format!("user.{}: {}", field, e)))?;
        *slot = Some(value);
    }
    decrypted.encrypted.clear();
    Ok(decrypted)
}

fn passes_key_check(key: &UserKey, key_check: &[u8], license_id: &str) -> bool {
    match aes_cbc::decrypt(key.as_bytes(), key_check) {
        Ok(plaintext) => plaintext == license_id.as_bytes(),
        Err(_) => false,
    }
}

fn check_profile(document: &LicenseDocument) -> Result<()> {
    if document.encryption.profile != BASIC_PROFILE {
        return Err(LicenseError::UnsupportedProfile(document.encryption.profile.clone()).into());
    }
    Ok(())
}

fn check_algorithms(document: &LicenseDocument) -> Result<()> {
    let expected = [
        ("content_key", &document.encryption.content_key.algorithm, algorithms::AES256_CBC),
        ("user_key", &document.encryption.user_key.algorithm, algorithms::SHA256),
        ("signature", &document.signature.algorithm, algorithms::RSA_SHA256),
    ];
    for (field, actual, wanted) in expected {
        if actual != wanted {
            return Err(LcpError::malformed(format!(
                "unsupported {} algorithm: {}",
                field, actual
            )));
        }
    }
    Ok(())
}
