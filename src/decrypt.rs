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


//! Resource decryption and encryption on disk
//!
//! Both directions stream through a [`StagedFile`], so the output path either
//! receives the complete result or is left as it was.

use crate::crypto::{aes_cbc, ContentKey};
use crate::error::{DecryptError, Result};
use crate::file::StagedFile;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Decrypt `input_path` into `output_path` with a content key
///
/// Returns the number of plaintext bytes written.
///
/// # Errors
/// - IoFailure if the input cannot be read or the output cannot be written
/// - CorruptCiphertext if the input is not a valid IV-prefixed ciphertext
pub fn decrypt_file(key: &ContentKey, input_path: &Path, output_path: &Path) -> Result<u64> {
    let input = open_input(input_path)?;
    let mut staged = create_output(output_path)?;

    let written = {
        let mut reader = BufReader::new(input);
        let mut writer = BufWriter::new(&mut staged);
        let written = aes_cbc::decrypt_stream(key.as_bytes(), &mut reader, &mut writer)?;
        writer.flush().map_err(|e| io_failure(output_path, e))?;
        written
    };

    staged.commit().map_err(|e| io_failure(output_path, e))?;

    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        bytes = written,
        "Decrypted resource"
    );
    Ok(written)
}

/// Encrypt `input_path` into `output_path` under a fresh random IV
///
/// Returns the number of bytes written, IV included.
pub fn encrypt_file(key: &ContentKey, input_path: &Path, output_path: &Path) -> Result<u64> {
    let input = open_input(input_path)?;
    let mut staged = create_output(output_path)?;
    let iv = aes_cbc::random_iv();

    let written = {
        let mut reader = BufReader::new(input);
        let mut writer = BufWriter::new(&mut staged);
        let written = aes_cbc::encrypt_stream(key.as_bytes(), &iv, &mut reader, &mut writer)?;
        writer.flush().map_err(|e| io_failure(output_path, e))?;
        written
    };

    staged.commit().map_err(|e| io_failure(output_path, e))?;

    debug!(output = %output_path.display(), bytes = written, "Encrypted resource");
    Ok(written)
}

/// Encrypt an in-memory resource under a fresh random IV
pub fn encrypt_resource(key: &ContentKey, plaintext: &[u8]) -> Vec<u8> {
    aes_cbc::encrypt(key.as_bytes(), plaintext)
}

/// Decrypt an in-memory IV-prefixed resource
pub fn decrypt_resource(key: &ContentKey, data: &[u8]) -> Result<Vec<u8>> {
    Ok(aes_cbc::decrypt(key.as_bytes(), data)?)
}

fn open_input(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| io_failure(path, e))
}

fn create_output(path: &Path) -> Result<StagedFile> {
    StagedFile::create(path).map_err(|e| io_failure(path, e))
}

fn io_failure(path: &Path, err: std::io::Error) -> crate::error::LcpError {
    DecryptError::IoFailure(format!("{}: {}", path.display(), err)).into()
}
