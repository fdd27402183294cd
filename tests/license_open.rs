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


//! Opening licenses through a service handle

mod common;

use chrono::{Duration, Utc};
use common::{crl_with_serials, foreign_pki, pki, validity_from, CONTENT_KEY, PASSPHRASE};
use lcp_core::crypto::UserKey;
use lcp_core::license::UserKeyScope;
use lcp_core::{service, LcpError, LicenseError, LicenseStatus, ServiceConfig, ServiceHandle};

fn create(config: &ServiceConfig) -> ServiceHandle {
    service::create_service(config).unwrap()
}

fn kind(err: LcpError) -> &'static str {
    err.kind()
}

#[test]
fn test_open_valid_license() {
    let handle = create(&pki().config());
    let content = pki().license().id("lic-valid").build();

    let license = service::open_license(handle, &content).unwrap();

    assert_eq!(license.id(), "lic-valid");
    assert_eq!(license.status(), LicenseStatus::Valid);
    assert_eq!(license.provider(), "https://provider.example");
    assert_eq!(license.original_content(), content);
    assert_eq!(license.certificate_serial(), common::PROVIDER_SERIAL_HEX);
    assert_eq!(license.content_key().unwrap().as_bytes(), &CONTENT_KEY);
    assert_eq!(license.rights().unwrap().copy, Some(2048));
    assert_eq!(license.user().unwrap().id.as_deref(), Some("reader-42"));
    assert_eq!(
        license.links().iter().find(|l| l.rel == "publication").unwrap().length,
        Some(123456)
    );

    let summary = serde_json::to_value(license.summary()).unwrap();
    assert_eq!(summary["status"], "valid");
    assert_eq!(summary["has_content_key"], true);

    service::release_service(handle).unwrap();
}

#[test]
fn test_open_with_pem_root() {
    let config = ServiceConfig::new(pki().root_pem()).with_passphrase(PASSPHRASE);
    let handle = create(&config);
    assert!(service::open_license(handle, &pki().license().build()).is_ok());
    service::release_service(handle).unwrap();
}

#[test]
fn test_malformed_inputs() {
    let handle = create(&pki().config());
    let valid = pki().license().build_value();

    let mut missing_id = valid.clone();
    missing_id.as_object_mut().unwrap().remove("id");
    let mut bad_date = valid.clone();
    bad_date["issued"] = serde_json::json!("04/11/2013");
    let mut bad_algorithm = valid.clone();
    bad_algorithm["encryption"]["content_key"]["algorithm"] =
        serde_json::json!("http://www.w3.org/2001/04/xmlenc#aes128-cbc");

    for content in [
        String::new(),
        "   ".to_string(),
        "not json at all".to_string(),
        "[1, 2, 3]".to_string(),
        "{\"id\": \"x\"".to_string(),
        missing_id.to_string(),
        bad_date.to_string(),
        bad_algorithm.to_string(),
    ] {
        match service::open_license(handle, &content) {
            Err(LcpError::License(LicenseError::MalformedLicense(_))) => {}
            other => panic!("expected MalformedLicense for {:?}, got {:?}", content, other),
        }
    }

    service::release_service(handle).unwrap();
}

#[test]
fn test_unsupported_profile() {
    let handle = create(&pki().config());
    let content = pki()
        .license()
        .profile("http://readium.org/lcp/profile-1.0")
        .build();
    assert_eq!(
        kind(service::open_license(handle, &content).unwrap_err()),
        "UnsupportedProfile"
    );
    service::release_service(handle).unwrap();
}

#[test]
fn test_tampered_content_fails_signature() {
    let handle = create(&pki().config());
    let mut value = pki().license().build_value();
    value["rights"]["copy"] = serde_json::json!(999_999);

    assert_eq!(
        kind(service::open_license(handle, &value.to_string()).unwrap_err()),
        "SignatureInvalid"
    );
    service::release_service(handle).unwrap();
}

#[test]
fn test_reformatting_keeps_signature_valid() {
    let handle = create(&pki().config());
    let value = pki().license().build_value();

    // Compact and pretty forms share one canonical form
    assert!(service::open_license(handle, &value.to_string()).is_ok());
    assert!(service::open_license(handle, &serde_json::to_string_pretty(&value).unwrap()).is_ok());
    service::release_service(handle).unwrap();
}

#[test]
fn test_foreign_root_fails_signature() {
    let handle = create(&pki().config());
    let content = foreign_pki().license().build();
    assert_eq!(
        kind(service::open_license(handle, &content).unwrap_err()),
        "SignatureInvalid"
    );
    service::release_service(handle).unwrap();
}

#[test]
fn test_provider_certificate_dates() {
    // Provider certificate expired a day before the license was issued
    let expired_cert = pki().issue_provider(validity_from(
        std::time::Duration::from_secs(30 * 24 * 3600),
        std::time::Duration::from_secs(29 * 24 * 3600),
    ));
    let content = pki().license().certificate(&expired_cert).build();

    let handle = create(&pki().config());
    assert_eq!(
        kind(service::open_license(handle, &content).unwrap_err()),
        "SignatureInvalid"
    );
    service::release_service(handle).unwrap();

    let lenient = create(&pki().config().with_certificate_dates(false));
    assert!(service::open_license(lenient, &content).is_ok());
    service::release_service(lenient).unwrap();
}

#[test]
fn test_license_dated_inside_certificate_window() {
    // Certificate has since expired, but was valid when the license was issued
    let old_cert = pki().issue_provider(validity_from(
        std::time::Duration::from_secs(30 * 24 * 3600),
        std::time::Duration::from_secs(29 * 24 * 3600),
    ));
    let content = pki()
        .license()
        .issued(Utc::now() - Duration::days(15))
        .certificate(&old_cert)
        .build();

    let handle = create(&pki().config());
    assert!(service::open_license(handle, &content).is_ok());
    service::release_service(handle).unwrap();
}

#[test]
fn test_expired_and_not_yet_valid() {
    let handle = create(&pki().config());

    let expired = pki().license().end(Utc::now() - Duration::days(1)).build();
    match service::open_license(handle, &expired) {
        Err(LcpError::License(LicenseError::Expired { .. })) => {}
        other => panic!("expected Expired, got {:?}", other),
    }

    let future = pki().license().start(Utc::now() + Duration::days(1)).build();
    assert_eq!(kind(service::open_license(handle, &future).unwrap_err()), "NotYetValid");

    let window = pki()
        .license()
        .start(Utc::now() - Duration::days(1))
        .end(Utc::now() + Duration::days(1))
        .build();
    assert!(service::open_license(handle, &window).is_ok());

    service::release_service(handle).unwrap();
}

#[test]
fn test_revoked_license_id_from_config() {
    let handle = create(&pki().config().with_revoked_license("lic-revoked"));
    let content = pki().license().id("lic-revoked").build();
    assert_eq!(kind(service::open_license(handle, &content).unwrap_err()), "Revoked");

    let other = pki().license().id("lic-other").build();
    assert!(service::open_license(handle, &other).is_ok());
    service::release_service(handle).unwrap();
}

#[test]
fn test_revoked_certificate_from_config() {
    let handle = create(&pki().config().with_revoked_certificate("00:1A:2B"));
    let content = pki().license().build();
    assert_eq!(kind(service::open_license(handle, &content).unwrap_err()), "Revoked");
    service::release_service(handle).unwrap();
}

#[test]
fn test_revocation_applies_to_cached_license() {
    let handle = create(&pki().config());
    let content = pki().license().id("lic-later-revoked").build();

    assert!(service::open_license(handle, &content).is_ok());
    assert_eq!(service::service(handle).unwrap().cached_license_count().unwrap(), 1);

    assert!(service::revoke_license(handle, "lic-later-revoked").unwrap());
    assert!(!service::revoke_license(handle, "lic-later-revoked").unwrap());
    assert_eq!(kind(service::open_license(handle, &content).unwrap_err()), "Revoked");

    service::release_service(handle).unwrap();
}

#[test]
fn test_revocation_list_revokes_provider() {
    let handle = create(&pki().config());
    let content = pki().license().build();
    assert!(service::open_license(handle, &content).is_ok());

    let crl = crl_with_serials(&pki().root_name, &[&common::PROVIDER_SERIAL[..], &[0x77u8][..]]);
    assert_eq!(service::load_revocation_list(handle, &crl).unwrap(), 2);
    assert_eq!(service::load_revocation_list(handle, &crl).unwrap(), 0);
    let added: u64 =
        lcp_core::bindings::lcp_load_revocation_list(handle.as_raw(), crl.clone()).unwrap();
    assert_eq!(added, 0);
    assert_eq!(kind(service::open_license(handle, &content).unwrap_err()), "Revoked");

    assert_eq!(
        kind(service::load_revocation_list(handle, b"garbage").unwrap_err()),
        "InvalidInput"
    );
    service::release_service(handle).unwrap();
}

#[test]
fn test_revocation_list_in_config() {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    let crl = crl_with_serials(&pki().root_name, &[&common::PROVIDER_SERIAL[..]]);
    let mut config = pki().config();
    config.revocation_list = Some(STANDARD.encode(crl));

    let handle = create(&config);
    assert_eq!(
        kind(service::open_license(handle, &pki().license().build()).unwrap_err()),
        "Revoked"
    );
    service::release_service(handle).unwrap();
}

#[test]
fn test_no_matching_user_key() {
    let handle = create(&ServiceConfig::new(pki().root_base64()));
    let content = pki().license().build();

    let license = service::open_license(handle, &content).unwrap();
    assert_eq!(license.status(), LicenseStatus::Valid);
    assert!(!license.has_content_key());

    // Keys added later apply to the cached license too
    assert!(service::add_user_key(handle, PASSPHRASE).unwrap());
    assert!(!service::add_user_key(handle, PASSPHRASE).unwrap());
    let license = service::open_license(handle, &content).unwrap();
    assert_eq!(license.content_key().unwrap().as_bytes(), &CONTENT_KEY);

    service::release_service(handle).unwrap();
}

#[test]
fn test_add_user_key_hex() {
    let handle = create(&ServiceConfig::new(pki().root_base64()));
    let hex_key = hex::encode(UserKey::from_passphrase(PASSPHRASE).as_bytes());

    assert!(service::add_user_key_hex(handle, &hex_key).unwrap());
    assert_eq!(
        kind(service::add_user_key_hex(handle, "abc").unwrap_err()),
        "InvalidInput"
    );
    let license = service::open_license(handle, &pki().license().build()).unwrap();
    assert!(license.has_content_key());

    service::release_service(handle).unwrap();
}

#[test]
fn test_scoped_user_keys() {
    let handle = create(&ServiceConfig::new(pki().root_base64()));
    let hex_key = hex::encode(UserKey::from_passphrase(PASSPHRASE).as_bytes());
    let other_provider = UserKeyScope {
        provider: Some("https://other.example".to_string()),
        ..Default::default()
    };
    assert!(service::add_scoped_user_key_hex(handle, &hex_key, other_provider).unwrap());

    let content = pki().license().user_id("reader-7").build();
    assert!(!service::open_license(handle, &content).unwrap().has_content_key());

    let wrong_user = UserKeyScope {
        provider: Some("https://provider.example".to_string()),
        user_id: Some("reader-8".to_string()),
        ..Default::default()
    };
    assert!(service::add_scoped_user_key_hex(handle, &hex_key, wrong_user).unwrap());
    assert!(!service::open_license(handle, &content).unwrap().has_content_key());

    let right_user = UserKeyScope {
        user_id: Some("reader-7".to_string()),
        ..Default::default()
    };
    assert!(service::add_scoped_user_key_hex(handle, &hex_key, right_user.clone()).unwrap());
    assert!(!service::add_scoped_user_key_hex(handle, &hex_key, right_user).unwrap());
    assert!(service::open_license(handle, &content).unwrap().has_content_key());

    // Same key, different reader: still locked
    let other_reader = pki().license().user_id("reader-9").build();
    assert!(!service::open_license(handle, &other_reader).unwrap().has_content_key());

    service::release_service(handle).unwrap();
}

#[test]
fn test_encrypted_user_fields() {
    let content = pki()
        .license()
        .email("reader@library.example", true)
        .build();

    let handle = create(&pki().config());
    let license = service::open_license(handle, &content).unwrap();
    let user = license.user().unwrap();
    assert_eq!(user.email.as_deref(), Some("reader@library.example"));
    assert!(user.encrypted.is_empty());
    let summary = serde_json::to_value(license.summary()).unwrap();
    assert_eq!(summary["user"]["email"], "reader@library.example");
    // The signed document keeps the ciphertext
    assert_ne!(
        license.document().user.as_ref().unwrap().email.as_deref(),
        Some("reader@library.example")
    );
    service::release_service(handle).unwrap();

    let locked = create(&ServiceConfig::new(pki().root_base64()));
    let license = service::open_license(locked, &content).unwrap();
    let user = license.user().unwrap();
    assert_eq!(user.encrypted, vec!["email".to_string()]);
    assert_ne!(user.email.as_deref(), Some("reader@library.example"));
    service::release_service(locked).unwrap();
}

#[test]
fn test_plain_user_fields_pass_through() {
    let handle = create(&pki().config());
    let content = pki().license().email("open@library.example", false).build();
    let license = service::open_license(handle, &content).unwrap();
    assert_eq!(license.user().unwrap().email.as_deref(), Some("open@library.example"));
    service::release_service(handle).unwrap();
}

#[test]
fn test_user_keys_from_config_hex() {
    let mut config = ServiceConfig::new(pki().root_base64());
    config.user_keys = vec![hex::encode(UserKey::from_passphrase("other").as_bytes())];
    let handle = create(&config);

    let content = pki().license().passphrase("other").build();
    assert!(service::open_license(handle, &content).unwrap().has_content_key());
    service::release_service(handle).unwrap();
}

#[test]
fn test_failures_are_not_cached() {
    let handle = create(&pki().config());
    let mut value = pki().license().build_value();
    value["provider"] = serde_json::json!("https://evil.example");

    assert!(service::open_license(handle, &value.to_string()).is_err());
    assert_eq!(service::service(handle).unwrap().cached_license_count().unwrap(), 0);
    service::release_service(handle).unwrap();
}

#[test]
fn test_cache_capacity_bounds_entries() {
    let handle = create(&pki().config().with_cache_capacity(2));
    for i in 0..4 {
        let content = pki().license().id(&format!("lic-cache-{}", i)).build();
        service::open_license(handle, &content).unwrap();
    }
    assert_eq!(service::service(handle).unwrap().cached_license_count().unwrap(), 2);
    service::release_service(handle).unwrap();
}
