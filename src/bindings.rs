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


//! UniFFI exports
//!
//! Typed counterpart of [`crate::bridge`] for hosts that consume generated
//! bindings (Swift, Kotlin) instead of JSON envelopes.

use crate::error::LcpError;
use crate::license::{License, Right, RightAllowance, RightsReport, UserKeyScope};
use crate::service::{self, ServiceHandle};
use crate::ServiceConfig;
use std::path::Path;

/// Error surfaced to generated bindings
///
/// `kind` carries [`LcpError::kind`] so hosts can branch without parsing
/// the message.
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum LcpFfiError {
    #[error("{message}")]
    License { kind: String, message: String },

    #[error("{message}")]
    Container { kind: String, message: String },

    #[error("{message}")]
    Decrypt { kind: String, message: String },

    #[error("{message}")]
    Service { kind: String, message: String },
}

impl From<LcpError> for LcpFfiError {
    fn from(err: LcpError) -> Self {
        let kind = err.kind().to_string();
        let message = err.to_string();
        match err {
            LcpError::License(_) => LcpFfiError::License { kind, message },
            LcpError::Container(_) => LcpFfiError::Container { kind, message },
            LcpError::Decrypt(_) => LcpFfiError::Decrypt { kind, message },
            _ => LcpFfiError::Service { kind, message },
        }
    }
}

/// License fields exposed to generated bindings
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiLicense {
    pub id: String,
    pub provider: String,
    /// RFC 3339
    pub issued: String,
    pub updated: Option<String>,
    pub status: String,
    pub text_hint: String,
    pub has_content_key: bool,
    pub original_content: String,
    /// Full summary as JSON (rights, user, links)
    pub summary_json: String,
}

impl TryFrom<License> for FfiLicense {
    type Error = LcpFfiError;

    fn try_from(license: License) -> Result<Self, Self::Error> {
        let summary_json = serde_json::to_string(&license.summary()).map_err(LcpError::from)?;
        Ok(Self {
            id: license.id().to_string(),
            provider: license.provider().to_string(),
            issued: license.issued().to_rfc3339(),
            updated: license.updated().map(|d| d.to_rfc3339()),
            status: license.status().to_string(),
            text_hint: license.text_hint().to_string(),
            has_content_key: license.has_content_key(),
            original_content: license.original_content().to_string(),
            summary_json,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiRight {
    Print,
    Copy,
}

impl From<FfiRight> for Right {
    fn from(right: FfiRight) -> Self {
        match right {
            FfiRight::Print => Right::Print,
            FfiRight::Copy => Right::Copy,
        }
    }
}

/// `limit` and `remaining` are absent when the right is unlimited
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiRightAllowance {
    pub limit: Option<u64>,
    pub used: u64,
    pub remaining: Option<u64>,
}

impl From<RightAllowance> for FfiRightAllowance {
    fn from(allowance: RightAllowance) -> Self {
        Self {
            limit: allowance.limit,
            used: allowance.used,
            remaining: allowance.remaining,
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiRightsReport {
    pub license_id: String,
    pub print: FfiRightAllowance,
    pub copy: FfiRightAllowance,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl From<RightsReport> for FfiRightsReport {
    fn from(report: RightsReport) -> Self {
        Self {
            license_id: report.license_id,
            print: report.print.into(),
            copy: report.copy.into(),
            start: report.start.map(|d| d.to_rfc3339()),
            end: report.end.map(|d| d.to_rfc3339()),
        }
    }
}

#[uniffi::export]
pub fn lcp_create_service(config_json: String) -> Result<u64, LcpFfiError> {
    let config = ServiceConfig::from_json_str(&config_json)?;
    Ok(service::create_service(&config)?.as_raw())
}

#[uniffi::export]
pub fn lcp_release_service(handle: u64) -> Result<(), LcpFfiError> {
    Ok(service::release_service(ServiceHandle::from_raw(handle))?)
}

#[uniffi::export]
pub fn lcp_open_license(handle: u64, license_content: String) -> Result<FfiLicense, LcpFfiError> {
    service::open_license(ServiceHandle::from_raw(handle), &license_content)?.try_into()
}

#[uniffi::export]
pub fn lcp_open_container_license(
    handle: u64,
    container_path: String,
) -> Result<FfiLicense, LcpFfiError> {
    service::open_container_license(ServiceHandle::from_raw(handle), Path::new(&container_path))?
        .try_into()
}

#[uniffi::export]
pub fn lcp_inject_license(
    handle: u64,
    container_path: String,
    license_content: String,
) -> Result<(), LcpFfiError> {
    Ok(service::inject_license(
        ServiceHandle::from_raw(handle),
        Path::new(&container_path),
        &license_content,
    )?)
}

#[uniffi::export]
pub fn lcp_decrypt_file(
    handle: u64,
    license_content: String,
    input_path: String,
    output_path: String,
) -> Result<u64, LcpFfiError> {
    Ok(service::decrypt_file(
        ServiceHandle::from_raw(handle),
        &license_content,
        Path::new(&input_path),
        Path::new(&output_path),
    )?)
}

#[uniffi::export]
pub fn lcp_add_user_key(handle: u64, passphrase: String) -> Result<bool, LcpFfiError> {
    Ok(service::add_user_key(ServiceHandle::from_raw(handle), &passphrase)?)
}

#[uniffi::export]
pub fn lcp_add_user_key_hex(handle: u64, hex_key: String) -> Result<bool, LcpFfiError> {
    Ok(service::add_user_key_hex(ServiceHandle::from_raw(handle), &hex_key)?)
}

#[uniffi::export]
pub fn lcp_add_scoped_user_key_hex(
    handle: u64,
    hex_key: String,
    user_id: Option<String>,
    provider: Option<String>,
    license_id: Option<String>,
) -> Result<bool, LcpFfiError> {
    let scope = UserKeyScope {
        user_id,
        provider,
        license_id,
    };
    Ok(service::add_scoped_user_key_hex(ServiceHandle::from_raw(handle), &hex_key, scope)?)
}

#[uniffi::export]
pub fn lcp_rights(handle: u64, license_content: String) -> Result<FfiRightsReport, LcpFfiError> {
    Ok(service::rights(ServiceHandle::from_raw(handle), &license_content)?.into())
}

#[uniffi::export]
pub fn lcp_consume_right(
    handle: u64,
    license_content: String,
    right: FfiRight,
    amount: u64,
) -> Result<FfiRightsReport, LcpFfiError> {
    let report = service::consume_right(
        ServiceHandle::from_raw(handle),
        &license_content,
        right.into(),
        amount,
    )?;
    Ok(report.into())
}

#[uniffi::export]
pub fn lcp_revoke_license(handle: u64, license_id: String) -> Result<bool, LcpFfiError> {
    Ok(service::revoke_license(ServiceHandle::from_raw(handle), &license_id)?)
}

#[uniffi::export]
pub fn lcp_revoke_certificate(handle: u64, serial_hex: String) -> Result<bool, LcpFfiError> {
    Ok(service::revoke_certificate(ServiceHandle::from_raw(handle), &serial_hex)?)
}

#[uniffi::export]
pub fn lcp_load_revocation_list(handle: u64, crl_der: Vec<u8>) -> Result<u64, LcpFfiError> {
    let added = service::load_revocation_list(ServiceHandle::from_raw(handle), &crl_der)?;
    Ok(added as u64)
}
