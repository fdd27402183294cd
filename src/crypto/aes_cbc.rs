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


//! AES-256-CBC with prepended IV and PKCS#7 padding
//!
//! This is the only symmetric transform the basic profile uses. It protects
//! the key check, the content key inside the license, and every encrypted
//! resource in the publication.
//!
//! # Layout
//! ```text
//! +----------------+--------------------------------------+
//! | IV (16 bytes)  | ciphertext (n * 16 bytes, PKCS#7)    |
//! +----------------+--------------------------------------+
//! ```
//!
//! The streaming functions work in fixed-size chunks and hold back the final
//! block until end of input, since only that block carries padding.

use crate::error::DecryptError;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use std::io::{Cursor, ErrorKind, Read, Write};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// IV size in bytes (one block)
pub const IV_SIZE: usize = 16;

/// Bytes read from the input per iteration
const CHUNK_SIZE: usize = 64 * 1024;

/// Decrypt an IV-prefixed buffer
///
/// # Errors
/// - CorruptCiphertext if the buffer is truncated or the padding is wrong
pub fn decrypt(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let mut plaintext = Vec::with_capacity(data.len());
    decrypt_stream(key, &mut Cursor::new(data), &mut plaintext)?;
    Ok(plaintext)
}

/// Encrypt a buffer under a fresh random IV
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Vec<u8> {
    encrypt_with_iv(key, &random_iv(), plaintext)
}

/// Encrypt a buffer under the given IV
pub fn encrypt_with_iv(key: &[u8; 32], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let padded = pkcs7_pad(plaintext, BLOCK_SIZE);
    let mut out = Vec::with_capacity(IV_SIZE + padded.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&padded);

    let mut encryptor = Aes256CbcEnc::new(key.into(), iv.into());
    for block in out[IV_SIZE..].chunks_exact_mut(BLOCK_SIZE) {
        encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
    out
}

/// Generate a random IV from the OS RNG
pub fn random_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// Stream-decrypt an IV-prefixed input into `writer`
///
/// Returns the number of plaintext bytes written.
///
/// # Errors
/// - IoFailure if reading or writing fails
/// - CorruptCiphertext if the IV is short, the length is not block aligned,
///   no data block follows the IV, or the padding is invalid
pub fn decrypt_stream<R: Read, W: Write>(
    key: &[u8; 32],
    reader: &mut R,
    writer: &mut W,
) -> Result<u64, DecryptError> {
    let mut iv = [0u8; IV_SIZE];
    let iv_len = read_chunk(reader, &mut iv)?;
    if iv_len < IV_SIZE {
        return Err(DecryptError::CorruptCiphertext(format!(
            "input is {} bytes, shorter than the {}-byte IV",
            iv_len, IV_SIZE
        )));
    }

    let mut decryptor = Aes256CbcDec::new(key.into(), (&iv).into());
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut held: Vec<u8> = Vec::with_capacity(CHUNK_SIZE + BLOCK_SIZE);
    let mut written: u64 = 0;

    loop {
        let n = read_chunk(reader, &mut chunk)?;
        if n == 0 {
            break;
        }
        held.extend_from_slice(&chunk[..n]);

        // Everything but the last whole block is safe to emit
        let whole = held.len() / BLOCK_SIZE * BLOCK_SIZE;
        if whole > BLOCK_SIZE {
            let ready = whole - BLOCK_SIZE;
            for block in held[..ready].chunks_exact_mut(BLOCK_SIZE) {
                decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            write_all(writer, &held[..ready])?;
            written += ready as u64;
            held.drain(..ready);
        }
    }

    if held.is_empty() {
        return Err(DecryptError::CorruptCiphertext(
            "no ciphertext follows the IV".to_string(),
        ));
    }
    if held.len() != BLOCK_SIZE {
        return Err(DecryptError::CorruptCiphertext(format!(
            "ciphertext length is not a multiple of {} bytes",
            BLOCK_SIZE
        )));
    }

    decryptor.decrypt_block_mut(GenericArray::from_mut_slice(&mut held));
    let tail = pkcs7_unpad(&held, BLOCK_SIZE)?;
    write_all(writer, tail)?;
    written += tail.len() as u64;

    writer
        .flush()
        .map_err(|e| DecryptError::IoFailure(format!("Failed to flush output: {}", e)))?;

    Ok(written)
}

/// Stream-encrypt `reader` into `writer`, IV first
///
/// Returns the number of bytes written, IV included.
///
/// # Errors
/// - IoFailure if reading or writing fails
pub fn encrypt_stream<R: Read, W: Write>(
    key: &[u8; 32],
    iv: &[u8; IV_SIZE],
    reader: &mut R,
    writer: &mut W,
) -> Result<u64, DecryptError> {
    let mut encryptor = Aes256CbcEnc::new(key.into(), iv.into());
    write_all(writer, iv)?;
    let mut written = IV_SIZE as u64;

    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::with_capacity(CHUNK_SIZE + BLOCK_SIZE);

    loop {
        let n = read_chunk(reader, &mut chunk)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&chunk[..n]);

        let whole = pending.len() / BLOCK_SIZE * BLOCK_SIZE;
        if whole > 0 {
            for block in pending[..whole].chunks_exact_mut(BLOCK_SIZE) {
                encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            write_all(writer, &pending[..whole])?;
            written += whole as u64;
            pending.drain(..whole);
        }
    }

    let mut last = pkcs7_pad(&pending, BLOCK_SIZE);
    for block in last.chunks_exact_mut(BLOCK_SIZE) {
        encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
    write_all(writer, &last)?;
    written += last.len() as u64;

    writer
        .flush()
        .map_err(|e| DecryptError::IoFailure(format!("Failed to flush output: {}", e)))?;

    Ok(written)
}

/// Apply PKCS#7 padding
///
/// Appends 1-16 bytes, each with the value of the padding length.
pub fn pkcs7_pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad = block_size - (data.len() % block_size);
    let mut out = Vec::with_capacity(data.len() + pad);
    out.extend_from_slice(data);
    out.resize(data.len() + pad, pad as u8);
    out
}

/// Remove PKCS#7 padding from a decrypted block sequence
///
/// # Errors
/// - CorruptCiphertext if the padding length or bytes are malformed
pub fn pkcs7_unpad(data: &[u8], block_size: usize) -> Result<&[u8], DecryptError> {
    if data.is_empty() || data.len() % block_size != 0 {
        return Err(DecryptError::CorruptCiphertext(
            "padded data is not block aligned".to_string(),
        ));
    }

    let pad = data[data.len() - 1] as usize;
    if pad == 0 || pad > block_size {
        return Err(DecryptError::CorruptCiphertext(format!(
            "invalid padding length {}",
            pad
        )));
    }

    if data[data.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err(DecryptError::CorruptCiphertext(
            "inconsistent padding bytes".to_string(),
        ));
    }

    Ok(&data[..data.len() - pad])
}

/// Fill `buf` from `reader`, stopping early only at end of input
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, DecryptError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(DecryptError::IoFailure(format!("Failed to read input: {}", e)));
            }
        }
    }
    Ok(filled)
}

fn write_all<W: Write>(writer: &mut W, data: &[u8]) -> Result<(), DecryptError> {
    writer
        .write_all(data)
        .map_err(|e| DecryptError::IoFailure(format!("Failed to write output: {}", e)))
}
