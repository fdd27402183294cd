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


//! Shared fixtures for integration tests
//!
//! Builds a throwaway PKI (root and provider certificates), signed licenses
//! and EPUB archives. RSA keys are generated once per test binary.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use lcp_core::crypto::{aes_cbc, algorithms, UserKey};
use lcp_core::license::{canonical_form, BASIC_PROFILE};
use lcp_core::ServiceConfig;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::io::{Cursor, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::asn1::{BitString, UtcTime};
use x509_cert::der::pem::LineEnding;
use x509_cert::der::{Decode, Encode, EncodePem};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const PASSPHRASE: &str = "correct horse battery staple";
pub const PROVIDER_SERIAL: [u8; 2] = [0x1a, 0x2b];
pub const PROVIDER_SERIAL_HEX: &str = "1a2b";
pub const CONTENT_KEY: [u8; 32] = [0x3c; 32];

const KEY_BITS: usize = 1024;
const ONE_YEAR: Duration = Duration::from_secs(365 * 24 * 3600);

/// A root certificate and a provider certificate it issued
pub struct Pki {
    pub root_name: Name,
    pub root_signer: SigningKey<Sha256>,
    pub root_der: Vec<u8>,
    pub provider_key: RsaPrivateKey,
    pub provider_signer: SigningKey<Sha256>,
    pub provider_der: Vec<u8>,
}

impl Pki {
    fn generate(root_cn: &str) -> Self {
        let mut rng = rand::rngs::OsRng;
        let root_key = RsaPrivateKey::new(&mut rng, KEY_BITS).unwrap();
        let provider_key = RsaPrivateKey::new(&mut rng, KEY_BITS).unwrap();

        let root_name = Name::from_str(&format!("CN={},O=LCP Test", root_cn)).unwrap();
        let root_signer = SigningKey::<Sha256>::new(root_key.clone());
        let root_der = CertificateBuilder::new(
            Profile::Root,
            SerialNumber::new(&[0x01]).unwrap(),
            Validity::from_now(ONE_YEAR * 10).unwrap(),
            root_name.clone(),
            SubjectPublicKeyInfoOwned::from_key(RsaPublicKey::from(&root_key)).unwrap(),
            &root_signer,
        )
        .unwrap()
        .build::<rsa::pkcs1v15::Signature>()
        .unwrap()
        .to_der()
        .unwrap();

        let mut pki = Self {
            root_name,
            root_signer,
            root_der,
            provider_signer: SigningKey::<Sha256>::new(provider_key.clone()),
            provider_key,
            provider_der: Vec::new(),
        };
        pki.provider_der = pki.issue_provider(Validity::from_now(ONE_YEAR).unwrap());
        pki
    }

    /// Issue a provider certificate for the provider key with the given validity
    pub fn issue_provider(&self, validity: Validity) -> Vec<u8> {
        CertificateBuilder::new(
            Profile::Leaf {
                issuer: self.root_name.clone(),
                enable_key_agreement: false,
                enable_key_encipherment: false,
            },
            SerialNumber::new(&PROVIDER_SERIAL).unwrap(),
            validity,
            Name::from_str("CN=Test Provider,O=LCP Test").unwrap(),
            SubjectPublicKeyInfoOwned::from_key(RsaPublicKey::from(&self.provider_key)).unwrap(),
            &self.root_signer,
        )
        .unwrap()
        .build::<rsa::pkcs1v15::Signature>()
        .unwrap()
        .to_der()
        .unwrap()
    }

    pub fn root_base64(&self) -> String {
        STANDARD.encode(&self.root_der)
    }

    pub fn root_pem(&self) -> String {
        x509_cert::Certificate::from_der(&self.root_der)
            .unwrap()
            .to_pem(LineEnding::LF)
            .unwrap()
    }

    pub fn provider_base64(&self) -> String {
        STANDARD.encode(&self.provider_der)
    }

    /// Service config trusting this root, with the test passphrase
    pub fn config(&self) -> ServiceConfig {
        ServiceConfig::new(self.root_base64()).with_passphrase(PASSPHRASE)
    }

    pub fn license(&self) -> LicenseBuilder<'_> {
        LicenseBuilder::new(self)
    }
}

/// The PKI most tests trust
pub fn pki() -> &'static Pki {
    static PKI: OnceLock<Pki> = OnceLock::new();
    PKI.get_or_init(|| Pki::generate("Test Root"))
}

/// An unrelated PKI whose licenses must not verify against [`pki`]
pub fn foreign_pki() -> &'static Pki {
    static PKI: OnceLock<Pki> = OnceLock::new();
    PKI.get_or_init(|| Pki::generate("Foreign Root"))
}

/// Validity window starting `start_ago` in the past and lasting `length`
pub fn validity_from(start_ago: Duration, length: Duration) -> Validity {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap();
    let start = now - start_ago;
    Validity {
        not_before: Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(start.as_secs())).unwrap()),
        not_after: Time::UtcTime(
            UtcTime::from_unix_duration(Duration::from_secs((start + length).as_secs())).unwrap(),
        ),
    }
}

/// Builder for signed license documents
pub struct LicenseBuilder<'a> {
    pki: &'a Pki,
    id: String,
    issued: DateTime<Utc>,
    passphrase: String,
    content_key: [u8; 32],
    profile: String,
    certificate: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    print: Option<u64>,
    copy: Option<u64>,
    user_id: String,
    email: Option<String>,
    encrypt_email: bool,
}

impl<'a> LicenseBuilder<'a> {
    fn new(pki: &'a Pki) -> Self {
        Self {
            pki,
            id: uuid::Uuid::new_v4().to_string(),
            issued: Utc::now(),
            passphrase: PASSPHRASE.to_string(),
            content_key: CONTENT_KEY,
            profile: BASIC_PROFILE.to_string(),
            certificate: None,
            start: None,
            end: None,
            print: Some(10),
            copy: Some(2048),
            user_id: "reader-42".to_string(),
            email: None,
            encrypt_email: false,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn issued(mut self, issued: DateTime<Utc>) -> Self {
        self.issued = issued;
        self
    }

    pub fn passphrase(mut self, passphrase: &str) -> Self {
        self.passphrase = passphrase.to_string();
        self
    }

    pub fn profile(mut self, profile: &str) -> Self {
        self.profile = profile.to_string();
        self
    }

    /// Embed this provider certificate (DER) instead of the default one
    pub fn certificate(mut self, der: &[u8]) -> Self {
        self.certificate = Some(STANDARD.encode(der));
        self
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Print cap, `None` for unlimited
    pub fn print(mut self, print: Option<u64>) -> Self {
        self.print = print;
        self
    }

    /// Copy cap, `None` for unlimited
    pub fn copy(mut self, copy: Option<u64>) -> Self {
        self.copy = copy;
        self
    }

    pub fn user_id(mut self, user_id: &str) -> Self {
        self.user_id = user_id.to_string();
        self
    }

    /// Add a user email, encrypted with the content key when `encrypted`
    pub fn email(mut self, email: &str, encrypted: bool) -> Self {
        self.email = Some(email.to_string());
        self.encrypt_email = encrypted;
        self
    }

    /// The signed document as a JSON value
    pub fn build_value(&self) -> serde_json::Value {
        let user_key = UserKey::from_passphrase(&self.passphrase);
        let key_check = aes_cbc::encrypt(user_key.as_bytes(), self.id.as_bytes());
        let encrypted_value = aes_cbc::encrypt(user_key.as_bytes(), &self.content_key);

        let mut rights = serde_json::json!({});
        if let Some(print) = self.print {
            rights["print"] = serde_json::json!(print);
        }
        if let Some(copy) = self.copy {
            rights["copy"] = serde_json::json!(copy);
        }
        if let Some(start) = self.start {
            rights["start"] = serde_json::json!(start.to_rfc3339());
        }
        if let Some(end) = self.end {
            rights["end"] = serde_json::json!(end.to_rfc3339());
        }

        let mut value = serde_json::json!({
            "id": self.id,
            "issued": self.issued.to_rfc3339(),
            "provider": "https://provider.example",
            "encryption": {
                "profile": self.profile,
                "content_key": {
                    "algorithm": algorithms::AES256_CBC,
                    "encrypted_value": STANDARD.encode(encrypted_value)
                },
                "user_key": {
                    "algorithm": algorithms::SHA256,
                    "text_hint": "The passphrase from your library",
                    "key_check": STANDARD.encode(key_check)
                }
            },
            "links": [
                { "rel": "hint", "href": "https://provider.example/hint" },
                {
                    "rel": "publication",
                    "href": "https://provider.example/book.epub",
                    "type": "application/epub+zip",
                    "length": 123456
                }
            ],
            "user": { "id": self.user_id, "encrypted": [] },
            "rights": rights
        });
        if let Some(email) = &self.email {
            if self.encrypt_email {
                let ciphertext = aes_cbc::encrypt(&self.content_key, email.as_bytes());
                value["user"]["email"] = serde_json::json!(STANDARD.encode(ciphertext));
                value["user"]["encrypted"] = serde_json::json!(["email"]);
            } else {
                value["user"]["email"] = serde_json::json!(email);
            }
        }

        sign_value(&mut value, &self.pki.provider_signer, self.certificate.clone()
            .unwrap_or_else(|| self.pki.provider_base64()));
        value
    }

    /// The signed document, pretty-printed as a provider would serve it
    pub fn build(&self) -> String {
        serde_json::to_string_pretty(&self.build_value()).unwrap()
    }
}

/// (Re)sign a license value in place
pub fn sign_value(value: &mut serde_json::Value, signer: &SigningKey<Sha256>, certificate: String) {
    let canonical = canonical_form(&value.to_string()).unwrap();
    let signature = signer.sign(canonical.as_bytes()).to_vec();
    value["signature"] = serde_json::json!({
        "algorithm": algorithms::RSA_SHA256,
        "certificate": certificate,
        "value": STANDARD.encode(signature)
    });
}

/// Write a minimal EPUB, optionally with an embedded license
pub fn write_epub(path: &Path, license: Option<&str>) {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("mimetype", stored).unwrap();
    writer.write_all(b"application/epub+zip").unwrap();
    writer.start_file("META-INF/container.xml", deflated).unwrap();
    writer
        .write_all(b"<container><rootfiles><rootfile full-path=\"OEBPS/content.opf\"/></rootfiles></container>")
        .unwrap();
    if let Some(license) = license {
        writer.start_file("META-INF/license.lcpl", deflated).unwrap();
        writer.write_all(license.as_bytes()).unwrap();
    }
    writer.start_file("OEBPS/content.opf", deflated).unwrap();
    writer.write_all(b"<package/>").unwrap();
    writer.start_file("OEBPS/chapter1.xhtml", stored).unwrap();
    writer.write_all(b"<encrypted chapter bytes>").unwrap();

    let bytes = writer.finish().unwrap().into_inner();
    std::fs::write(path, bytes).unwrap();
}

/// DER CRL listing the given serials; its signature is a placeholder
pub fn crl_with_serials(issuer: &Name, serials: &[&[u8]]) -> Vec<u8> {
    use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
    use lcp_core::crypto::certificate::SHA256_WITH_RSA;

    let now = Time::UtcTime(
        UtcTime::from_unix_duration(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| Duration::from_secs(d.as_secs()))
                .unwrap(),
        )
        .unwrap(),
    );
    let algorithm = AlgorithmIdentifierOwned {
        oid: SHA256_WITH_RSA,
        parameters: None,
    };
    let revoked = serials
        .iter()
        .map(|serial| RevokedCert {
            serial_number: SerialNumber::new(serial).unwrap(),
            revocation_date: now,
            crl_entry_extensions: None,
        })
        .collect();

    CertificateList {
        tbs_cert_list: TbsCertList {
            version: x509_cert::Version::V2,
            signature: algorithm.clone(),
            issuer: issuer.clone(),
            this_update: now,
            next_update: None,
            revoked_certificates: Some(revoked),
            crl_extensions: None,
        },
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(&[0u8; 16]).unwrap(),
    }
    .to_der()
    .unwrap()
}
