//! Upload receiver.
//!
//! Persists an uploaded byte stream to a [`TempArtifact`]. Data is always
//! copied through a bounded buffer, so peak memory stays constant no matter
//! how large the upload is.
//!
//! Two styles are supported:
//!
//! - pull: [`UploadReceiver::receive`] drains any [`Read`] implementation;
//! - push: [`UploadReceiver::begin`] returns an [`UploadWriter`] that
//!   accepts chunks as they arrive (e.g. from a multipart body).
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//!
//! use clipgif::{ConverterOptions, UploadReceiver};
//!
//! let receiver = UploadReceiver::new(&ConverterOptions::default());
//! let artifact = receiver.receive(File::open("clip.avi")?, "clip.avi")?;
//! println!("staged at {}", artifact.path().display());
//! # Ok::<(), clipgif::ClipgifError>(())
//! ```

use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::artifact::TempArtifact;
use crate::configuration::ConverterOptions;
use crate::error::ClipgifError;

/// Writes uploads into the scratch directory.
#[derive(Debug, Clone)]
pub struct UploadReceiver {
    directory: PathBuf,
    chunk_size: usize,
    allowed_extensions: Vec<String>,
    max_bytes: Option<u64>,
}

impl UploadReceiver {
    /// Build a receiver from converter options.
    pub fn new(options: &ConverterOptions) -> Self {
        Self {
            directory: options.temp_directory.clone(),
            chunk_size: options.chunk_size,
            allowed_extensions: options.allowed_extensions.clone(),
            max_bytes: options.max_upload_bytes,
        }
    }

    /// Validate the declared file name against the extension allow-list.
    ///
    /// Returns the lowercase extension on success.
    ///
    /// # Errors
    ///
    /// Returns [`ClipgifError::UnsupportedExtension`] if the extension is
    /// missing or not allowed.
    pub fn check_extension(&self, original_name: &str) -> Result<String, ClipgifError> {
        let extension = Path::new(original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        if !extension.is_empty() && self.allowed_extensions.iter().any(|ext| *ext == extension) {
            Ok(extension)
        } else {
            Err(ClipgifError::UnsupportedExtension {
                extension,
                allowed: self.allowed_extensions.join(", "),
            })
        }
    }

    /// Start a push-style upload for a file declared as `original_name`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a disallowed extension, or
    /// [`ClipgifError::IoError`] if the scratch file cannot be created.
    pub fn begin(&self, original_name: &str) -> Result<UploadWriter, ClipgifError> {
        let extension = self.check_extension(original_name)?;
        let (file, artifact) = TempArtifact::create(&self.directory, &extension)?;
        Ok(UploadWriter {
            file,
            artifact,
            written: 0,
            max_bytes: self.max_bytes,
        })
    }

    /// Copy everything from `reader` into a new artifact.
    ///
    /// # Errors
    ///
    /// Returns validation errors for a disallowed extension or an oversized
    /// upload, and [`ClipgifError::IoError`] for read/write failures. The
    /// partial file is deleted on every error.
    pub fn receive<R: Read>(
        &self,
        mut reader: R,
        original_name: &str,
    ) -> Result<TempArtifact, ClipgifError> {
        let mut writer = self.begin(original_name)?;
        let mut buffer = vec![0_u8; self.chunk_size];

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(error) if error.kind() == IoErrorKind::Interrupted => continue,
                Err(error) => return Err(error.into()),
            };
            writer.write_chunk(&buffer[..read])?;
        }

        writer.finish()
    }
}

/// An in-progress upload. Dropping it without [`finish`](UploadWriter::finish)
/// deletes the partial file.
#[derive(Debug)]
pub struct UploadWriter {
    file: File,
    artifact: TempArtifact,
    written: u64,
    max_bytes: Option<u64>,
}

impl UploadWriter {
    /// Append one chunk.
    ///
    /// # Errors
    ///
    /// Returns [`ClipgifError::UploadTooLarge`] once the size limit is
    /// exceeded, or [`ClipgifError::IoError`] if the write fails.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), ClipgifError> {
        let total = self.written + chunk.len() as u64;
        if let Some(limit) = self.max_bytes {
            if total > limit {
                return Err(ClipgifError::UploadTooLarge { limit });
            }
        }
        self.file.write_all(chunk)?;
        self.written = total;
        Ok(())
    }

    /// Bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush to disk and hand over the artifact.
    pub fn finish(mut self) -> Result<TempArtifact, ClipgifError> {
        self.file.flush()?;
        self.file.sync_all()?;
        log::debug!(
            "Received upload of {} bytes into {}",
            self.written,
            self.artifact.path().display()
        );
        Ok(self.artifact)
    }
}
