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


//! Cryptography for LCP licenses and resources
//!
//! # Algorithms (basic profile)
//! - **User key**: SHA-256 of the passphrase
//! - **Key check / content key / resources**: AES-256-CBC, IV prepended, PKCS#7
//! - **License and certificate signatures**: RSA PKCS#1 v1.5 with SHA-256

pub mod aes_cbc;
pub mod certificate;
pub mod keys;
pub mod signature;

/// Algorithm identifiers as they appear in license documents
pub mod algorithms {
    /// Content key and resource encryption
    pub const AES256_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";
    /// User key derivation
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    /// License signature
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
}

pub use certificate::{Certificate, CertificateError};
pub use keys::{sha256_hex, ContentKey, UserKey, KEY_SIZE};
