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


//! JSON bridge shared by the platform bindings
//!
//! Each function takes plain strings and numbers and returns a JSON envelope,
//! so the JNI layer only converts strings and never sees Rust types.
//!
//! # Response Format
//! ```json
//! { "success": true, "data": { ... } }
//! ```
//! Or on error:
//! ```json
//! {
//!   "success": false,
//!   "error": "License expired on ...",
//!   "kind": "Expired",
//!   "message": "This publication's loan ended on ..."
//! }
//! ```
//!
//! `kind` is [`LcpError::kind`], stable across releases. `message` is
//! [`LcpError::user_message`], meant for display to the reader.

use crate::config::ServiceConfig;
use crate::error::{LcpError, Result};
use crate::license::{Right, RightsReport, UserKeyScope};
use crate::service::{self, ServiceHandle};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{error, warn};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Convert a result to a JSON response string
pub fn result_to_json<T: Serialize>(result: Result<T>) -> String {
    match result {
        Ok(data) => success_response(data),
        Err(e) => error_response(&e),
    }
}

/// Create success response JSON
pub fn success_response<T: Serialize>(data: T) -> String {
    serde_json::json!({
        "success": true,
        "data": data
    })
    .to_string()
}

/// Create error response JSON
pub fn error_response(error: &LcpError) -> String {
    warn!(kind = error.kind(), error = %error, "Bridge call failed");
    serde_json::json!({
        "success": false,
        "error": error.to_string(),
        "kind": error.kind(),
        "message": error.user_message()
    })
    .to_string()
}

/// Wrap a call so a panic becomes an error response instead of unwinding
/// across the FFI boundary
pub fn catch_panic<F>(f: F) -> String
where
    F: FnOnce() -> String,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic_err) => {
            let panic_msg = if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Unknown panic occurred".to_string()
            };
            error!(panic = %panic_msg, "Panic caught at bridge boundary");
            error_response(&LcpError::internal(format!("Rust panic: {}", panic_msg)))
        }
    }
}

// ============================================================================
// SERVICE LIFECYCLE
// ============================================================================

/// Create a service from a JSON configuration
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "handle": 4294967297 } }
/// ```
pub fn create_service(config_json: &str) -> String {
    catch_panic(|| {
        result_to_json((|| -> Result<serde_json::Value> {
            let config = ServiceConfig::from_json_str(config_json)?;
            let handle = service::create_service(&config)?;
            Ok(serde_json::json!({ "handle": handle.as_raw() }))
        })())
    })
}

pub fn release_service(handle: u64) -> String {
    catch_panic(|| {
        result_to_json(
            service::release_service(ServiceHandle::from_raw(handle))
                .map(|_| serde_json::json!({ "released": true })),
        )
    })
}

// ============================================================================
// LICENSE OPERATIONS
// ============================================================================

/// Open a license
///
/// # Returns (JSON)
/// ```json
/// {
///   "success": true,
///   "data": {
///     "id": "...",
///     "provider": "...",
///     "status": "valid",
///     "has_content_key": true,
///     ...
///   }
/// }
/// ```
pub fn open_license(handle: u64, license_content: &str) -> String {
    catch_panic(|| {
        result_to_json(
            service::open_license(ServiceHandle::from_raw(handle), license_content)
                .map(|license| license.summary()),
        )
    })
}

pub fn open_container_license(handle: u64, container_path: &str) -> String {
    catch_panic(|| {
        result_to_json(
            service::open_container_license(
                ServiceHandle::from_raw(handle),
                Path::new(container_path),
            )
            .map(|license| license.summary()),
        )
    })
}

pub fn inject_license(handle: u64, container_path: &str, license_content: &str) -> String {
    catch_panic(|| {
        result_to_json(
            service::inject_license(
                ServiceHandle::from_raw(handle),
                Path::new(container_path),
                license_content,
            )
            .map(|_| serde_json::json!({ "container_path": container_path })),
        )
    })
}

/// Decrypt a resource
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "output_path": "...", "file_size": 1024 } }
/// ```
pub fn decrypt_file(
    handle: u64,
    license_content: &str,
    input_path: &str,
    output_path: &str,
) -> String {
    catch_panic(|| {
        result_to_json((|| -> Result<serde_json::Value> {
            let file_size = service::decrypt_file(
                ServiceHandle::from_raw(handle),
                license_content,
                Path::new(input_path),
                Path::new(output_path),
            )?;
            Ok(serde_json::json!({
                "output_path": output_path,
                "file_size": file_size,
            }))
        })())
    })
}

// ============================================================================
// RIGHTS
// ============================================================================

/// Print and copy allowances of a license
///
/// # Returns (JSON)
/// ```json
/// {
///   "success": true,
///   "data": {
///     "license_id": "...",
///     "print": { "limit": 10, "used": 2, "remaining": 8 },
///     "copy": { "limit": null, "used": 0, "remaining": null }
///   }
/// }
/// ```
pub fn rights(handle: u64, license_content: &str) -> String {
    catch_panic(|| {
        result_to_json(service::rights(ServiceHandle::from_raw(handle), license_content))
    })
}

/// Use up `amount` of the `print` or `copy` right
pub fn consume_right(handle: u64, license_content: &str, right: &str, amount: u64) -> String {
    catch_panic(|| {
        result_to_json((|| -> Result<RightsReport> {
            let right: Right = right.parse()?;
            service::consume_right(ServiceHandle::from_raw(handle), license_content, right, amount)
        })())
    })
}

// ============================================================================
// KEYS AND REVOCATION
// ============================================================================

pub fn add_user_key(handle: u64, passphrase: &str) -> String {
    catch_panic(|| {
        result_to_json(
            service::add_user_key(ServiceHandle::from_raw(handle), passphrase)
                .map(|added| serde_json::json!({ "added": added })),
        )
    })
}

/// Register a hex user key for the licenses matching `scope_json`
///
/// `scope_json` holds any of `user_id`, `provider` and `license_id`, e.g.
/// `{"provider": "https://provider.example"}`.
pub fn add_scoped_user_key_hex(handle: u64, hex_key: &str, scope_json: &str) -> String {
    catch_panic(|| {
        result_to_json((|| -> Result<serde_json::Value> {
            let scope: UserKeyScope = serde_json::from_str(scope_json)
                .map_err(|e| LcpError::invalid_input(format!("invalid key scope: {}", e)))?;
            let added =
                service::add_scoped_user_key_hex(ServiceHandle::from_raw(handle), hex_key, scope)?;
            Ok(serde_json::json!({ "added": added }))
        })())
    })
}

pub fn revoke_license(handle: u64, license_id: &str) -> String {
    catch_panic(|| {
        result_to_json(
            service::revoke_license(ServiceHandle::from_raw(handle), license_id)
                .map(|added| serde_json::json!({ "added": added })),
        )
    })
}

pub fn revoke_certificate(handle: u64, serial_hex: &str) -> String {
    catch_panic(|| {
        result_to_json(
            service::revoke_certificate(ServiceHandle::from_raw(handle), serial_hex)
                .map(|added| serde_json::json!({ "added": added })),
        )
    })
}
