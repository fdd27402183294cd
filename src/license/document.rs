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


//! License document model and canonical form
//!
//! # Document Layout
//! ```json
//! {
//!   "id": "ef15e740-697f-11e3-949a-0800200c9a66",
//!   "issued": "2013-11-04T01:08:15+01:00",
//!   "updated": "2014-02-21T09:44:17+01:00",
//!   "provider": "https://www.imaginaryebookretailer.com",
//!   "encryption": {
//!     "profile": "http://readium.org/lcp/basic-profile",
//!     "content_key": { "algorithm": "...#aes256-cbc", "encrypted_value": "<base64>" },
//!     "user_key": { "algorithm": "...#sha256", "text_hint": "...", "key_check": "<base64>" }
//!   },
//!   "links": [ { "rel": "publication", "href": "https://..." } ],
//!   "user": { "id": "d9f298a7-7f34-49e7-8aae-4378ecb1d597" },
//!   "rights": { "print": 0, "copy": 2048, "start": "...", "end": "..." },
//!   "signature": { "algorithm": "...#rsa-sha256", "certificate": "<base64 DER>", "value": "<base64>" }
//! }
//! ```
//!
//! # Canonical Form
//! The signature covers the document with the top-level `signature` member
//! removed, object keys sorted recursively and no insignificant whitespace.

use crate::error::{LcpError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only encryption profile this client implements
pub const BASIC_PROFILE: &str = "http://readium.org/lcp/basic-profile";

/// Parsed license document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseDocument {
    pub id: String,
    pub issued: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    pub provider: String,
    pub encryption: Encryption,
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rights: Option<Rights>,
    pub signature: SignatureInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encryption {
    pub profile: String,
    pub content_key: ContentKeyInfo,
    pub user_key: UserKeyInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentKeyInfo {
    pub algorithm: String,
    pub encrypted_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserKeyInfo {
    pub algorithm: String,
    #[serde(default)]
    pub text_hint: String,
    pub key_check: String,
}

/// Link to a related resource (publication, hint page, status document)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templated: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Names of user fields the provider encrypted with the content key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encrypted: Vec<String>,
}

/// Usage rights granted by the license
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub algorithm: String,
    pub certificate: String,
    pub value: String,
}

impl LicenseDocument {
    /// Parse and structurally check a license document
    ///
    /// # Errors
    /// - MalformedLicense if the content is empty, not JSON, misses a
    ///   required member, has an unparseable date, or carries empty or
    ///   non-base64 values where binary data is expected
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(LcpError::malformed("license content is empty"));
        }

        let document: LicenseDocument = serde_json::from_str(content)
            .map_err(|e| LcpError::malformed(format!("invalid license JSON: {}", e)))?;
        document.check_structure()?;
        Ok(document)
    }

    /// Date the signature and provider certificate are checked against
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.updated.unwrap_or(self.issued)
    }

    /// First link with the given relation
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }

    /// Decoded `signature.value`
    pub fn signature_bytes(&self) -> Result<Vec<u8>> {
        decode_field("signature.value", &self.signature.value)
    }

    /// Decoded `encryption.user_key.key_check`
    pub fn key_check_bytes(&self) -> Result<Vec<u8>> {
        decode_field("encryption.user_key.key_check", &self.encryption.user_key.key_check)
    }

    /// Decoded `encryption.content_key.encrypted_value`
    pub fn encrypted_content_key_bytes(&self) -> Result<Vec<u8>> {
        decode_field(
            "encryption.content_key.encrypted_value",
            &self.encryption.content_key.encrypted_value,
        )
    }

    fn check_structure(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LcpError::malformed("license id is empty"));
        }
        if self.provider.trim().is_empty() {
            return Err(LcpError::malformed("license provider is empty"));
        }
        if self.links.is_empty() {
            return Err(LcpError::malformed("license has no links"));
        }
        if let Some(link) = self.links.iter().find(|l| l.rel.is_empty() || l.href.is_empty()) {
            return Err(LcpError::malformed(format!(
                "link is missing rel or href: rel='{}' href='{}'",
                link.rel, link.href
            )));
        }
        if self.signature.certificate.trim().is_empty() {
            return Err(LcpError::malformed("signature certificate is empty"));
        }
        if let Some(rights) = &self.rights {
            if let (Some(start), Some(end)) = (rights.start, rights.end) {
                if end < start {
                    return Err(LcpError::malformed("rights end precedes rights start"));
                }
            }
        }

        self.signature_bytes()?;
        self.key_check_bytes()?;
        self.encrypted_content_key_bytes()?;
        Ok(())
    }
}

/// Canonical form of a license, the exact bytes the provider signed
///
/// # Errors
/// - MalformedLicense if the content is not a JSON object
pub fn canonical_form(content: &str) -> Result<String> {
    let mut value: Value = serde_json::from_str(content)
        .map_err(|e| LcpError::malformed(format!("invalid license JSON: {}", e)))?;

    let object = value
        .as_object_mut()
        .ok_or_else(|| LcpError::malformed("license is not a JSON object"))?;
    object.remove("signature");

    let mut out = String::with_capacity(content.len());
    write_canonical(&value, &mut out)?;
    Ok(out)
}

// Keys are sorted here rather than relying on the map ordering serde_json
// was built with.
fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

fn decode_field(name: &str, encoded: &str) -> Result<Vec<u8>> {
    if encoded.trim().is_empty() {
        return Err(LcpError::malformed(format!("{} is empty", name)));
    }
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| LcpError::malformed(format!("{} is not valid base64: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LcpError, LicenseError};

    fn sample() -> serde_json::Value {
        serde_json::json!({
            "id": "ef15e740-697f-11e3-949a-0800200c9a66",
            "issued": "2013-11-04T01:08:15+01:00",
            "provider": "https://provider.example",
            "encryption": {
                "profile": BASIC_PROFILE,
                "content_key": {
                    "algorithm": "http://www.w3.org/2001/04/xmlenc#aes256-cbc",
                    "encrypted_value": "AAECAwQFBgcICQoLDA0ODw=="
                },
                "user_key": {
                    "algorithm": "http://www.w3.org/2001/04/xmlenc#sha256",
                    "text_hint": "Your library card number",
                    "key_check": "AAECAwQFBgcICQoLDA0ODw=="
                }
            },
            "links": [{ "rel": "publication", "href": "https://provider.example/book.epub" }],
            "rights": { "print": 10, "copy": 2048 },
            "signature": {
                "algorithm": "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
                "certificate": "AAEC",
                "value": "AAEC"
            }
        })
    }

    fn assert_malformed(result: Result<LicenseDocument>) {
        match result {
            Err(LcpError::License(LicenseError::MalformedLicense(_))) => {}
            other => panic!("expected MalformedLicense, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_sample() {
        let doc = LicenseDocument::parse(&sample().to_string()).unwrap();
        assert_eq!(doc.id, "ef15e740-697f-11e3-949a-0800200c9a66");
        assert_eq!(doc.encryption.profile, BASIC_PROFILE);
        assert_eq!(doc.rights.as_ref().unwrap().copy, Some(2048));
        assert_eq!(doc.effective_date(), doc.issued);
        assert!(doc.link("publication").is_some());
        assert!(doc.link("hint").is_none());
    }

    #[test]
    fn test_parse_malformed_inputs() {
        assert_malformed(LicenseDocument::parse(""));
        assert_malformed(LicenseDocument::parse("   \n"));
        assert_malformed(LicenseDocument::parse("{not json"));
        assert_malformed(LicenseDocument::parse("[]"));
        assert_malformed(LicenseDocument::parse("{}"));
    }

    #[test]
    fn test_parse_missing_member() {
        let mut value = sample();
        value.as_object_mut().unwrap().remove("encryption");
        assert_malformed(LicenseDocument::parse(&value.to_string()));
    }

    #[test]
    fn test_parse_bad_date() {
        let mut value = sample();
        value["issued"] = serde_json::json!("yesterday");
        assert_malformed(LicenseDocument::parse(&value.to_string()));
    }

    #[test]
    fn test_parse_empty_id_and_links() {
        let mut value = sample();
        value["id"] = serde_json::json!("");
        assert_malformed(LicenseDocument::parse(&value.to_string()));

        let mut value = sample();
        value["links"] = serde_json::json!([]);
        assert_malformed(LicenseDocument::parse(&value.to_string()));
    }

    #[test]
    fn test_parse_bad_base64() {
        let mut value = sample();
        value["encryption"]["user_key"]["key_check"] = serde_json::json!("***");
        assert_malformed(LicenseDocument::parse(&value.to_string()));
    }

    #[test]
    fn test_parse_inverted_rights_window() {
        let mut value = sample();
        value["rights"] = serde_json::json!({
            "start": "2030-01-01T00:00:00Z",
            "end": "2020-01-01T00:00:00Z"
        });
        assert_malformed(LicenseDocument::parse(&value.to_string()));
    }

    #[test]
    fn test_canonical_form_sorts_and_strips_signature() {
        let content = r#"{ "b": 1, "signature": {"value": "x"}, "a": { "z": [3, {"y": true, "x": null}], "c": "é\"" } }"#;
        let canonical = canonical_form(content).unwrap();
        assert_eq!(canonical, r#"{"a":{"c":"é\"","z":[3,{"x":null,"y":true}]},"b":1}"#);
    }

    #[test]
    fn test_canonical_form_ignores_whitespace_and_order() {
        let a = canonical_form(r#"{"id":"1","issued":"x"}"#).unwrap();
        let b = canonical_form("{\n  \"issued\" : \"x\",\n  \"id\" : \"1\"\n}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_form_rejects_non_object() {
        assert!(canonical_form("[1,2]").is_err());
        assert!(canonical_form("nope").is_err());
    }
}
