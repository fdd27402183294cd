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


//! Validated license handed to callers

use crate::crypto::ContentKey;
use crate::license::document::{LicenseDocument, Link, Rights, UserInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validity state of a license
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Valid,
    Expired,
    NotYetValid,
    Revoked,
    Malformed,
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LicenseStatus::Valid => "valid",
            LicenseStatus::Expired => "expired",
            LicenseStatus::NotYetValid => "not_yet_valid",
            LicenseStatus::Revoked => "revoked",
            LicenseStatus::Malformed => "malformed",
        };
        f.write_str(name)
    }
}

/// A license that passed validation
///
/// Every `License` is an independent value; the service never hands out a
/// reference into its cache.
#[derive(Clone)]
pub struct License {
    document: LicenseDocument,
    original_content: String,
    content_hash: String,
    certificate_serial: String,
    user: Option<UserInfo>,
    status: LicenseStatus,
    content_key: Option<ContentKey>,
}

impl License {
    pub(crate) fn new(
        document: LicenseDocument,
        original_content: String,
        content_hash: String,
        certificate_serial: String,
        user: Option<UserInfo>,
        content_key: Option<ContentKey>,
    ) -> Self {
        Self {
            document,
            original_content,
            content_hash,
            certificate_serial,
            user,
            status: LicenseStatus::Valid,
            content_key,
        }
    }

    pub fn id(&self) -> &str {
        &self.document.id
    }

    pub fn provider(&self) -> &str {
        &self.document.provider
    }

    pub fn issued(&self) -> DateTime<Utc> {
        self.document.issued
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.document.updated
    }

    /// User fields, decrypted when the content key is available
    ///
    /// Without the content key, fields listed in `encrypted` still hold
    /// their base64 ciphertext.
    pub fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    pub fn rights(&self) -> Option<&Rights> {
        self.document.rights.as_ref()
    }

    pub fn links(&self) -> &[Link] {
        &self.document.links
    }

    pub fn profile(&self) -> &str {
        &self.document.encryption.profile
    }

    pub fn text_hint(&self) -> &str {
        &self.document.encryption.user_key.text_hint
    }

    /// The full parsed document, user fields as signed
    pub fn document(&self) -> &LicenseDocument {
        &self.document
    }

    /// Serialized content exactly as it was opened
    pub fn original_content(&self) -> &str {
        &self.original_content
    }

    /// SHA-256 of the original content, lowercase hex
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Serial of the provider certificate, normalized hex
    pub fn certificate_serial(&self) -> &str {
        &self.certificate_serial
    }

    pub fn status(&self) -> LicenseStatus {
        self.status
    }

    /// Content key, present when one of the service's user keys matched
    pub fn content_key(&self) -> Option<&ContentKey> {
        self.content_key.as_ref()
    }

    pub fn has_content_key(&self) -> bool {
        self.content_key.is_some()
    }

    /// Serializable view without key material
    pub fn summary(&self) -> LicenseSummary {
        LicenseSummary {
            id: self.document.id.clone(),
            provider: self.document.provider.clone(),
            issued: self.document.issued,
            updated: self.document.updated,
            status: self.status,
            profile: self.document.encryption.profile.clone(),
            text_hint: self.document.encryption.user_key.text_hint.clone(),
            user: self.user.clone(),
            rights: self.document.rights.clone(),
            links: self.document.links.clone(),
            certificate_serial: self.certificate_serial.clone(),
            content_hash: self.content_hash.clone(),
            has_content_key: self.has_content_key(),
        }
    }
}

impl std::fmt::Debug for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("License")
            .field("id", &self.document.id)
            .field("provider", &self.document.provider)
            .field("status", &self.status)
            .field("content_hash", &self.content_hash)
            .field("certificate_serial", &self.certificate_serial)
            .field("content_key", &self.content_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// License fields as returned across the FFI boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseSummary {
    pub id: String,
    pub provider: String,
    pub issued: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    pub status: LicenseStatus,
    pub profile: String,
    pub text_hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rights: Option<Rights>,
    pub links: Vec<Link>,
    pub certificate_serial: String,
    pub content_hash: String,
    pub has_content_key: bool,
}
