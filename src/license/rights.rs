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


//! Print and copy rights
//!
//! A license may cap how many pages can be printed and how many characters
//! can be copied. An absent cap means the right is unlimited; a cap of zero
//! means it is not granted at all.
//!
//! Consumption is tracked per service and per license id for the lifetime
//! of the service.

use crate::error::{LcpError, LicenseError, Result};
use crate::license::document::LicenseDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// A countable right granted by a license
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Right {
    /// Pages printed
    Print,
    /// Characters copied
    Copy,
}

impl Right {
    fn limit(self, document: &LicenseDocument) -> Option<u64> {
        let rights = document.rights.as_ref()?;
        match self {
            Right::Print => rights.print,
            Right::Copy => rights.copy,
        }
    }
}

impl std::fmt::Display for Right {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Right::Print => "print",
            Right::Copy => "copy",
        })
    }
}

impl FromStr for Right {
    type Err = LcpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "print" => Ok(Right::Print),
            "copy" => Ok(Right::Copy),
            other => Err(LcpError::invalid_input(format!("unknown right: {}", other))),
        }
    }
}

/// How much of one right is left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RightAllowance {
    /// Cap from the license, `None` when unlimited
    pub limit: Option<u64>,
    pub used: u64,
    /// `None` when unlimited
    pub remaining: Option<u64>,
}

impl RightAllowance {
    fn new(limit: Option<u64>, used: u64) -> Self {
        Self {
            limit,
            used,
            remaining: limit.map(|limit| limit.saturating_sub(used)),
        }
    }
}

/// Rights of one license as seen by a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RightsReport {
    pub license_id: String,
    pub print: RightAllowance,
    pub copy: RightAllowance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// Consumed print and copy amounts, keyed by license id
#[derive(Debug, Default)]
pub struct RightsLedger {
    used: HashMap<(String, Right), u64>,
}

impl RightsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, document: &LicenseDocument) -> RightsReport {
        let window = document.rights.as_ref();
        RightsReport {
            license_id: document.id.clone(),
            print: self.allowance(document, Right::Print),
            copy: self.allowance(document, Right::Copy),
            start: window.and_then(|rights| rights.start),
            end: window.and_then(|rights| rights.end),
        }
    }

    pub fn allowance(&self, document: &LicenseDocument, right: Right) -> RightAllowance {
        RightAllowance::new(right.limit(document), self.used(&document.id, right))
    }

    /// Record `amount` units of `right` against the license
    ///
    /// Nothing is recorded when the request exceeds what is left.
    ///
    /// # Errors
    /// - RightUnavailable if `amount` is more than the remaining allowance
    pub fn consume(
        &mut self,
        document: &LicenseDocument,
        right: Right,
        amount: u64,
    ) -> Result<RightsReport> {
        let allowance = self.allowance(document, right);
        if let Some(remaining) = allowance.remaining {
            if amount > remaining {
                return Err(LicenseError::RightUnavailable {
                    right: right.to_string(),
                    requested: amount,
                    remaining,
                }
                .into());
            }
        }

        let used = self.used.entry((document.id.clone(), right)).or_insert(0);
        *used = used.saturating_add(amount);
        Ok(self.report(document))
    }

    fn used(&self, license_id: &str, right: Right) -> u64 {
        self.used
            .get(&(license_id.to_string(), right))
            .copied()
            .unwrap_or(0)
    }
}
