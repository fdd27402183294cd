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


//! RSA PKCS#1 v1.5 signature verification with SHA-256
//!
//! Used twice per license: once for the provider certificate (signed by the
//! root) and once for the license document itself (signed by the provider).
//!
//! Parameters are fixed by the profile:
//!   Hash: SHA-256
//!   Padding: PKCS#1 v1.5
//!   Input: raw message bytes (hashed internally, never pre-hashed)

use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;

/// Verify `signature` over `message` with an RSA public key
///
/// Returns a short reason on failure; callers decide which error kind it
/// becomes.
pub fn verify_rsa_sha256(
    public_key: &RsaPublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<(), String> {
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    let signature = Signature::try_from(signature)
        .map_err(|e| format!("malformed RSA signature: {}", e))?;

    verifying_key
        .verify(message, &signature)
        .map_err(|_| "RSA-SHA256 signature mismatch".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1v15::SigningKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        (private_key, public_key)
    }

    #[test]
    fn test_verify_valid_and_tampered() {
        let (private_key, public_key) = keypair();
        let signing_key = SigningKey::<Sha256>::new(private_key);
        let signature = signing_key.sign(b"canonical license").to_vec();

        assert!(verify_rsa_sha256(&public_key, b"canonical license", &signature).is_ok());
        assert!(verify_rsa_sha256(&public_key, b"canonical licensE", &signature).is_err());
    }

    #[test]
    fn test_verify_garbage_signature() {
        let (_, public_key) = keypair();
        assert!(verify_rsa_sha256(&public_key, b"message", &[1, 2, 3]).is_err());
    }
}
