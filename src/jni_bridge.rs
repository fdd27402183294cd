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


//! JNI bridge for Android - native side of `org.readium.sdk.lcp.Service`
//!
//! # Architecture
//! Kotlin/Java (`Service`) → JNI → [`crate::bridge`] → [`crate::service`]
//!
//! The Java object holds the `long` handle returned by `nativeCreateService`
//! and passes it back on every call. The handle is opaque to Java.
//!
//! # Design Patterns
//! 1. **JSON Communication**: every function returns the bridge envelope as
//!    a Java string
//! 2. **Error Handling**: failures come back as `{"success": false, ...}`,
//!    never as Java exceptions
//! 3. **No Panics**: panics are caught in the bridge layer

use crate::bridge;
use jni::objects::{JClass, JObject, JString};
use jni::sys::{jlong, jstring};
use jni::JNIEnv;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Convert JString to Rust String
fn jstring_to_string(env: &mut JNIEnv, jstr: &JString) -> crate::Result<String> {
    env.get_string(jstr)
        .map(|s| s.into())
        .map_err(|e| crate::LcpError::JniError(format!("JNI string conversion failed: {}", e)))
}

/// Convert several JStrings, failing on the first that does not convert
fn jstrings_to_strings<const N: usize>(
    env: &mut JNIEnv,
    jstrs: [&JString; N],
) -> crate::Result<[String; N]> {
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, jstr) in out.iter_mut().zip(jstrs) {
        *slot = jstring_to_string(env, jstr)?;
    }
    Ok(out)
}

/// Hand a response back to Java; null only if the JVM cannot allocate it
fn into_jstring(env: &mut JNIEnv, response: String) -> jstring {
    match env.new_string(response) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create Java string");
            std::ptr::null_mut()
        }
    }
}

fn handle_from_jlong(ptr: jlong) -> u64 {
    ptr as u64
}

// ============================================================================
// SERVICE LIFECYCLE
// ============================================================================

/// Create a service
///
/// # Arguments
/// `configJson`: see [`crate::config::ServiceConfig`]
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "handle": 4294967297 } }
/// ```
#[no_mangle]
pub extern "C" fn Java_org_readium_sdk_lcp_Service_nativeCreateService(
    mut env: JNIEnv,
    _class: JClass,
    config_json: JString,
) -> jstring {
    let response = match jstring_to_string(&mut env, &config_json) {
        Ok(config) => bridge::create_service(&config),
        Err(e) => bridge::error_response(&e),
    };
    into_jstring(&mut env, response)
}

#[no_mangle]
pub extern "C" fn Java_org_readium_sdk_lcp_Service_nativeReleaseService(
    mut env: JNIEnv,
    _obj: JObject,
    service_ptr: jlong,
) -> jstring {
    let response = bridge::release_service(handle_from_jlong(service_ptr));
    into_jstring(&mut env, response)
}

// ============================================================================
// LICENSE OPERATIONS
// ============================================================================

/// Open a license
///
/// # Returns (JSON)
/// The license summary: id, provider, dates, rights, links, status and
/// whether a user key unlocked it.
#[no_mangle]
pub extern "C" fn Java_org_readium_sdk_lcp_Service_nativeOpenLicense(
    mut env: JNIEnv,
    _obj: JObject,
    service_ptr: jlong,
    license_content: JString,
) -> jstring {
    let response = match jstring_to_string(&mut env, &license_content) {
        Ok(content) => bridge::open_license(handle_from_jlong(service_ptr), &content),
        Err(e) => bridge::error_response(&e),
    };
    into_jstring(&mut env, response)
}

/// Write or replace `META-INF/license.lcpl` in an EPUB
#[no_mangle]
pub extern "C" fn Java_org_readium_sdk_lcp_Service_nativeInjectLicense(
    mut env: JNIEnv,
    _obj: JObject,
    service_ptr: jlong,
    epub_path: JString,
    license_content: JString,
) -> jstring {
    let response = match jstrings_to_strings(&mut env, [&epub_path, &license_content]) {
        Ok([path, content]) => {
            bridge::inject_license(handle_from_jlong(service_ptr), &path, &content)
        }
        Err(e) => bridge::error_response(&e),
    };
    into_jstring(&mut env, response)
}

/// Decrypt `fileIn` into `fileOut`
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "output_path": "...", "file_size": 1024 } }
/// ```
#[no_mangle]
pub extern "C" fn Java_org_readium_sdk_lcp_Service_nativeDecryptFile(
    mut env: JNIEnv,
    _obj: JObject,
    service_ptr: jlong,
    license_content: JString,
    file_in: JString,
    file_out: JString,
) -> jstring {
    let response =
        match jstrings_to_strings(&mut env, [&license_content, &file_in, &file_out]) {
            Ok([content, input, output]) => {
                bridge::decrypt_file(handle_from_jlong(service_ptr), &content, &input, &output)
            }
            Err(e) => bridge::error_response(&e),
        };
    into_jstring(&mut env, response)
}

// ============================================================================
// RIGHTS
// ============================================================================

/// Print and copy allowances of a license, see [`bridge::rights`]
#[no_mangle]
pub extern "C" fn Java_org_readium_sdk_lcp_Service_nativeGetRights(
    mut env: JNIEnv,
    _obj: JObject,
    service_ptr: jlong,
    license_content: JString,
) -> jstring {
    let response = match jstring_to_string(&mut env, &license_content) {
        Ok(content) => bridge::rights(handle_from_jlong(service_ptr), &content),
        Err(e) => bridge::error_response(&e),
    };
    into_jstring(&mut env, response)
}

/// Use up `amount` of the `"print"` or `"copy"` right
#[no_mangle]
pub extern "C" fn Java_org_readium_sdk_lcp_Service_nativeConsumeRight(
    mut env: JNIEnv,
    _obj: JObject,
    service_ptr: jlong,
    license_content: JString,
    right: JString,
    amount: jlong,
) -> jstring {
    let response = match jstrings_to_strings(&mut env, [&license_content, &right]) {
        Ok([content, right]) => match u64::try_from(amount) {
            Ok(amount) => {
                bridge::consume_right(handle_from_jlong(service_ptr), &content, &right, amount)
            }
            Err(_) => bridge::error_response(&crate::LcpError::invalid_input(format!(
                "amount must not be negative: {}",
                amount
            ))),
        },
        Err(e) => bridge::error_response(&e),
    };
    into_jstring(&mut env, response)
}

// ============================================================================
// KEYS
// ============================================================================

#[no_mangle]
pub extern "C" fn Java_org_readium_sdk_lcp_Service_nativeAddUserKey(
    mut env: JNIEnv,
    _obj: JObject,
    service_ptr: jlong,
    passphrase: JString,
) -> jstring {
    let response = match jstring_to_string(&mut env, &passphrase) {
        Ok(passphrase) => bridge::add_user_key(handle_from_jlong(service_ptr), &passphrase),
        Err(e) => bridge::error_response(&e),
    };
    into_jstring(&mut env, response)
}

/// Register a hex user key limited to a user, provider or license
///
/// `scopeJson` holds any of `user_id`, `provider` and `license_id`.
#[no_mangle]
pub extern "C" fn Java_org_readium_sdk_lcp_Service_nativeAddScopedUserKey(
    mut env: JNIEnv,
    _obj: JObject,
    service_ptr: jlong,
    hex_key: JString,
    scope_json: JString,
) -> jstring {
    let response = match jstrings_to_strings(&mut env, [&hex_key, &scope_json]) {
        Ok([key, scope]) => {
            bridge::add_scoped_user_key_hex(handle_from_jlong(service_ptr), &key, &scope)
        }
        Err(e) => bridge::error_response(&e),
    };
    into_jstring(&mut env, response)
}
