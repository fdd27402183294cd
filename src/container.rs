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


//! EPUB container access
//!
//! An LCP-protected EPUB carries its license at `META-INF/license.lcpl`.
//!
//! # Injection
//! The ZIP central directory cannot be patched in place, so injection
//! rebuilds the archive:
//! 1. Open the existing archive and check the new license parses
//! 2. Copy every entry except the old license into a staging file, raw
//!    (no recompression), in the original order so `mimetype` stays first
//! 3. Write the license entry (deflated) where the old one was, or last
//! 4. Sync and rename the staging file over the container
//!
//! Any failure before step 4 leaves the container byte-for-byte unchanged.

use crate::error::{ContainerError, LcpError, Result};
use crate::file::StagedFile;
use crate::license::LicenseDocument;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Location of the embedded license inside the container
pub const LICENSE_PATH: &str = "META-INF/license.lcpl";

/// Write or replace the embedded license of a container
///
/// # Errors
/// - MalformedLicense if `license_content` is not a license document
/// - NotFound, InvalidContainer or WriteFailed for container problems
pub fn inject_license(container_path: &Path, license_content: &str) -> Result<()> {
    LicenseDocument::parse(license_content)?;

    let mut archive = open_archive(container_path)?;
    let mut staged = StagedFile::create(container_path).map_err(|e| write_failed(container_path, e))?;
    let staging_file = staged.take_file().map_err(|e| write_failed(container_path, e))?;

    let mut writer = ZipWriter::new(staging_file);
    let mut replaced = false;

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(|e| invalid(container_path, e))?;
        if entry.name() == LICENSE_PATH {
            drop(entry);
            write_license_entry(&mut writer, license_content)
                .map_err(|e| write_failed(container_path, e))?;
            replaced = true;
            continue;
        }
        writer
            .raw_copy_file(entry)
            .map_err(|e| write_failed(container_path, e))?;
    }

    if !replaced {
        write_license_entry(&mut writer, license_content)
            .map_err(|e| write_failed(container_path, e))?;
    }

    let file = writer.finish().map_err(|e| write_failed(container_path, e))?;
    drop(file);
    staged.commit().map_err(|e| write_failed(container_path, e))?;

    info!(
        container = %container_path.display(),
        replaced,
        "Injected license into container"
    );
    Ok(())
}

/// Read the embedded license of a container
///
/// # Errors
/// - NotFound, InvalidContainer
/// - MissingLicense if the container has no `META-INF/license.lcpl`
pub fn read_license(container_path: &Path) -> Result<String> {
    let mut archive = open_archive(container_path)?;
    let mut entry = match archive.by_name(LICENSE_PATH) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return Err(ContainerError::MissingLicense(container_path.display().to_string()).into())
        }
        Err(e) => return Err(invalid(container_path, e)),
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| invalid(container_path, e))?;

    debug!(container = %container_path.display(), bytes = content.len(), "Read embedded license");
    Ok(content)
}

/// Whether the container carries an embedded license
pub fn has_license(container_path: &Path) -> Result<bool> {
    let archive = open_archive(container_path)?;
    let found = archive.file_names().any(|name| name == LICENSE_PATH);
    Ok(found)
}

fn open_archive(container_path: &Path) -> Result<ZipArchive<File>> {
    if !container_path.exists() {
        return Err(ContainerError::NotFound(container_path.display().to_string()).into());
    }
    if !container_path.is_file() {
        return Err(ContainerError::InvalidContainer(format!(
            "{} is not a file",
            container_path.display()
        ))
        .into());
    }

    let file = File::open(container_path).map_err(|e| invalid(container_path, e))?;
    ZipArchive::new(file).map_err(|e| invalid(container_path, e))
}

fn write_license_entry<W: Write + std::io::Seek>(
    writer: &mut ZipWriter<W>,
    license_content: &str,
) -> std::result::Result<(), ZipError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(LICENSE_PATH, options)?;
    writer.write_all(license_content.as_bytes())?;
    Ok(())
}

fn invalid(path: &Path, err: impl std::fmt::Display) -> LcpError {
    ContainerError::InvalidContainer(format!("{}: {}", path.display(), err)).into()
}

fn write_failed(path: &Path, err: impl std::fmt::Display) -> LcpError {
    ContainerError::WriteFailed(format!("{}: {}", path.display(), err)).into()
}
