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


//! LCP license documents
//!
//! A license is opened in two stages: [`validator::LicenseValidator`] checks
//! what depends only on the content, then [`validator::evaluate`] applies
//! revocation, the rights window and the user keys held by the service.
//! Print and copy consumption is tracked separately by [`rights::RightsLedger`].

pub mod document;
pub mod keyring;
pub mod model;
pub mod revocation;
pub mod rights;
pub mod validator;

pub use document::{canonical_form, LicenseDocument, Link, Rights, UserInfo, BASIC_PROFILE};
pub use keyring::{Keyring, UserKeyScope};
pub use model::{License, LicenseStatus, LicenseSummary};
pub use revocation::RevocationState;
pub use rights::{Right, RightAllowance, RightsLedger, RightsReport};
pub use validator::{LicenseValidator, VerifiedLicense};
