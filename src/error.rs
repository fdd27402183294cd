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


//! Error types for lcp-core
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by the operation that produced them so callers on the
//! other side of the FFI boundary can react without parsing messages.
//!
//! ## Categories
//!
//! - [`LicenseError`] - opening and validating a license document
//! - [`ContainerError`] - reading or writing the license inside an EPUB
//! - [`DecryptError`] - turning an encrypted resource back into plaintext
//!
//! All three are wrapped by [`LcpError`], which also carries the service-level
//! failures (unknown handle, bad configuration, bad input).

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias using our LcpError type
pub type Result<T> = std::result::Result<T, LcpError>;

/// License validation failures
///
/// A license that produces any of these is never used to decrypt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LicenseError {
    /// Content is empty, not JSON, or does not follow the license schema
    #[error("Malformed license: {0}")]
    MalformedLicense(String),

    /// Provider certificate or document signature did not verify
    #[error("License signature is invalid: {0}")]
    SignatureInvalid(String),

    /// The rights window closed before now
    #[error("License expired on {end}")]
    Expired { end: DateTime<Utc> },

    /// The rights window opens after now
    #[error("License is not valid before {start}")]
    NotYetValid { start: DateTime<Utc> },

    /// License id or provider certificate is revoked
    #[error("License revoked: {0}")]
    Revoked(String),

    /// Encryption profile this client cannot handle
    #[error("Unsupported encryption profile: {0}")]
    UnsupportedProfile(String),

    /// A print or copy request exceeds what the license still allows
    #[error("Not enough {right} rights left: requested {requested}, remaining {remaining}")]
    RightUnavailable {
        right: String,
        requested: u64,
        remaining: u64,
    },
}

/// EPUB container failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// Container path does not exist
    #[error("Container not found: {0}")]
    NotFound(String),

    /// Staging, writing, syncing or renaming the new archive failed
    #[error("Failed to write container: {0}")]
    WriteFailed(String),

    /// The file is not a readable ZIP package
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// The container holds no embedded license
    #[error("Container has no embedded license: {0}")]
    MissingLicense(String),
}

/// Resource decryption failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    /// The license is valid but no user key unlocked its content key
    #[error("Content key unavailable: {0}")]
    KeyUnavailable(String),

    /// Reading the input or writing the output failed
    #[error("Decryption I/O failure: {0}")]
    IoFailure(String),

    /// Ciphertext is truncated or its padding is wrong
    #[error("Corrupt ciphertext: {0}")]
    CorruptCiphertext(String),
}

/// Main error type for lcp-core
#[derive(Error, Debug)]
pub enum LcpError {
    // ===== Operation Errors =====

    #[error(transparent)]
    License(#[from] LicenseError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    // ===== Service Errors =====

    /// Handle was never issued, or its service was released
    #[error("Invalid service handle: {0:#x}")]
    InvalidHandle(u64),

    /// Service configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),

    // ===== External Library Errors =====

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JNI bridge error (Android only)
    #[error("JNI error: {0}")]
    #[cfg(target_os = "android")]
    JniError(String),
}

impl From<std::string::FromUtf8Error> for LcpError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        LcpError::InvalidInput(format!("UTF-8 conversion error: {}", err))
    }
}

// Helper methods for creating common errors
impl LcpError {
    /// Create a MalformedLicense error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        LicenseError::MalformedLicense(message.into()).into()
    }

    /// Create a SignatureInvalid error
    pub fn signature_invalid<S: Into<String>>(message: S) -> Self {
        LicenseError::SignatureInvalid(message.into()).into()
    }

    /// Create an InvalidConfiguration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        LcpError::InvalidConfiguration(message.into())
    }

    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        LcpError::InvalidInput(message.into())
    }

    /// Create an InternalError with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        LcpError::InternalError(message.into())
    }

    /// Check if error came from license validation
    pub fn is_license_error(&self) -> bool {
        matches!(self, LcpError::License(_))
    }

    /// Check if error came from reading or writing a container
    pub fn is_container_error(&self) -> bool {
        matches!(self, LcpError::Container(_))
    }

    /// Check if error came from the decryption transform
    pub fn is_decrypt_error(&self) -> bool {
        matches!(self, LcpError::Decrypt(_))
    }

    /// Stable machine-readable error code
    ///
    /// Used by the bridges so host code can branch on the failure without
    /// matching on message text.
    pub fn kind(&self) -> &'static str {
        match self {
            LcpError::License(e) => match e {
                LicenseError::MalformedLicense(_) => "MalformedLicense",
                LicenseError::SignatureInvalid(_) => "SignatureInvalid",
                LicenseError::Expired { .. } => "Expired",
                LicenseError::NotYetValid { .. } => "NotYetValid",
                LicenseError::Revoked(_) => "Revoked",
                LicenseError::UnsupportedProfile(_) => "UnsupportedProfile",
                LicenseError::RightUnavailable { .. } => "RightUnavailable",
            },
            LcpError::Container(e) => match e {
                ContainerError::NotFound(_) => "NotFound",
                ContainerError::WriteFailed(_) => "WriteFailed",
                ContainerError::InvalidContainer(_) => "InvalidContainer",
                ContainerError::MissingLicense(_) => "MissingLicense",
            },
            LcpError::Decrypt(e) => match e {
                DecryptError::KeyUnavailable(_) => "KeyUnavailable",
                DecryptError::IoFailure(_) => "IoFailure",
                DecryptError::CorruptCiphertext(_) => "CorruptCiphertext",
            },
            LcpError::InvalidHandle(_) => "InvalidHandle",
            LcpError::InvalidConfiguration(_) => "InvalidConfiguration",
            LcpError::InvalidInput(_) => "InvalidInput",
            LcpError::InternalError(_) => "InternalError",
            LcpError::SerdeJsonError(_) => "SerdeJsonError",
            LcpError::IoError(_) => "IoError",
            #[cfg(target_os = "android")]
            LcpError::JniError(_) => "JniError",
        }
    }

    /// Get user-friendly error message suitable for display
    ///
    /// Technical details are omitted where a reader could not act on them.
    pub fn user_message(&self) -> String {
        match self {
            LcpError::License(LicenseError::Expired { end }) => {
                format!("This publication's loan ended on {}.", end.format("%Y-%m-%d"))
            }
            LcpError::License(LicenseError::NotYetValid { start }) => {
                format!("This publication cannot be opened before {}.", start.format("%Y-%m-%d"))
            }
            LcpError::License(LicenseError::Revoked(_)) => {
                "This license has been revoked by the provider.".to_string()
            }
            LcpError::License(LicenseError::SignatureInvalid(_)) => {
                "The license could not be verified. It may have been altered.".to_string()
            }
            LcpError::License(LicenseError::RightUnavailable { right, remaining, .. }) => {
                format!("This license allows {} more {} operations.", remaining, right)
            }
            LcpError::Decrypt(DecryptError::KeyUnavailable(_)) => {
                "A passphrase is required to open this publication.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
