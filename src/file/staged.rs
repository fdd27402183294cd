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


//! Staged writes that either fully replace a file or leave it untouched
//!
//! A [`StagedFile`] writes into a hidden sibling of the target
//! (`.{name}.{uuid}.tmp`). [`StagedFile::commit`] syncs it and renames it over
//! the target. Dropping it without committing removes the staging file, so
//! every early return and panic path cleans up.
//!
//! The staging file lives in the target's directory so the final rename never
//! crosses a filesystem.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file being written next to its final location
#[derive(Debug)]
pub struct StagedFile {
    file: Option<File>,
    staging_path: PathBuf,
    target_path: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Create an empty staging file for `target`
    ///
    /// The target itself is not touched until [`commit`](Self::commit).
    pub fn create(target: &Path) -> io::Result<Self> {
        let staging_path = staging_path_for(target);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging_path)?;

        debug!(staging = %staging_path.display(), target = %target.display(), "Created staging file");

        Ok(Self {
            file: Some(file),
            staging_path,
            target_path: target.to_path_buf(),
            committed: false,
        })
    }

    /// Writable handle on the staging file
    pub fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "staging file already closed"))
    }

    /// Take ownership of the handle, e.g. to hand it to a writer that
    /// consumes it. The path stays owned by the guard.
    pub fn take_file(&mut self) -> io::Result<File> {
        self.file
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "staging file already closed"))
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Sync the staging file and rename it over the target
    pub fn commit(mut self) -> io::Result<()> {
        match self.file.take() {
            Some(file) => {
                file.sync_all()?;
            }
            None => {
                // Handle was taken by a writer; reopen to sync what it flushed
                let file = OpenOptions::new().write(true).open(&self.staging_path)?;
                file.sync_all()?;
            }
        }

        fs::rename(&self.staging_path, &self.target_path)?;
        self.committed = true;

        debug!(target = %self.target_path.display(), "Committed staged file");
        Ok(())
    }
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // Close before unlinking; Windows refuses to remove open files
        drop(self.file.take());
        if let Err(e) = fs::remove_file(&self.staging_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(
                    staging = %self.staging_path.display(),
                    error = %e,
                    "Failed to remove abandoned staging file"
                );
            }
        }
    }
}

fn staging_path_for(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let staging_name = format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple());
    match target.parent() {
        Some(parent) => parent.join(staging_name),
        None => PathBuf::from(staging_name),
    }
}
