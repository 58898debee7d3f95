//! Scoped scratch files.
//!
//! A [`TempArtifact`] owns one file in the scratch directory for the length
//! of a single conversion call. Dropping the artifact deletes the file, so
//! early returns and `?` propagation clean up without extra code; the
//! success path calls [`TempArtifact::remove`] to surface deletion errors.

use std::fs::File;
use std::io::Error as IoError;
use std::path::Path;

use tempfile::{Builder, TempPath};

use crate::error::ClipgifError;

const ARTIFACT_PREFIX: &str = "clipgif-";

/// A uniquely named scratch file, deleted when dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: TempPath,
}

impl TempArtifact {
    /// Create a new empty artifact in `directory` with the given extension.
    ///
    /// Names are random and created with `O_EXCL`, so concurrent calls never
    /// share a path.
    pub(crate) fn create(directory: &Path, extension: &str) -> Result<(File, Self), ClipgifError> {
        let suffix = if extension.is_empty() {
            String::new()
        } else {
            format!(".{extension}")
        };
        let named = Builder::new()
            .prefix(ARTIFACT_PREFIX)
            .suffix(&suffix)
            .tempfile_in(directory)?;
        let (file, path) = named.into_parts();
        log::debug!("Created scratch file {}", path.display());
        Ok((file, Self { path }))
    }

    /// Location of the file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the file in bytes.
    pub fn len(&self) -> Result<u64, ClipgifError> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Returns `true` if the file is empty.
    pub fn is_empty(&self) -> Result<bool, ClipgifError> {
        Ok(self.len()? == 0)
    }

    /// Delete the file now, reporting any failure.
    pub fn remove(self) -> Result<(), ClipgifError> {
        let display = self.path.display().to_string();
        self.path.close().map_err(|error: IoError| {
            log::warn!("Failed to delete scratch file {display}: {error}");
            ClipgifError::IoError(error)
        })?;
        log::debug!("Deleted scratch file {display}");
        Ok(())
    }
}
