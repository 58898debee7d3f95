//! Converter configuration.
//!
//! [`ConverterOptions`] carries the deployment-level settings of a
//! [`Converter`](crate::Converter): where scratch files live, how uploads
//! are copied, which container extensions are accepted, and the
//! [`ConversionLimits`] every request is checked against.
//!
//! # Example
//!
//! ```
//! use clipgif::{ConversionLimits, ConverterOptions};
//!
//! let options = ConverterOptions::new()
//!     .with_allowed_extensions(["avi", "mp4"])
//!     .with_max_upload_bytes(Some(512 * 1024 * 1024))
//!     .with_limits(ConversionLimits::default().with_max_frames(1200));
//! assert!(options.accepts_extension("AVI"));
//! assert!(!options.accepts_extension("mkv"));
//! ```

use std::path::{Path, PathBuf};

/// Size of the buffer used to copy uploads to disk (4 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Container extensions accepted by default.
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["avi", "mp4", "mov"];

/// Upper bounds applied to every conversion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionLimits {
    /// Highest accepted output frame rate. GIF delays have 1/100 s
    /// resolution, so rates above 50 cannot be represented faithfully.
    pub max_frames_per_second: u32,
    /// Widest accepted output width in pixels.
    pub max_width: u32,
    /// Most frames a single conversion may produce.
    pub max_frames: u64,
}

impl Default for ConversionLimits {
    fn default() -> Self {
        Self {
            max_frames_per_second: 50,
            max_width: 4096,
            max_frames: 3000,
        }
    }
}

impl ConversionLimits {
    /// Set the highest accepted frame rate (clamped to 1..=100).
    #[must_use]
    pub fn with_max_frames_per_second(mut self, fps: u32) -> Self {
        self.max_frames_per_second = fps.clamp(1, 100);
        self
    }

    /// Set the widest accepted output width (clamped to the GIF maximum).
    #[must_use]
    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = width.clamp(1, u16::MAX as u32);
        self
    }

    /// Set the maximum number of output frames (minimum 1).
    #[must_use]
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = frames.max(1);
        self
    }
}

/// Settings shared by every conversion a [`Converter`](crate::Converter) runs.
#[derive(Debug, Clone)]
pub struct ConverterOptions {
    pub(crate) temp_directory: PathBuf,
    pub(crate) chunk_size: usize,
    pub(crate) allowed_extensions: Vec<String>,
    pub(crate) max_upload_bytes: Option<u64>,
    pub(crate) limits: ConversionLimits,
    pub(crate) quantizer_speed: i32,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterOptions {
    /// Defaults: system temp directory, 4 MiB chunks, `avi`/`mp4`/`mov`,
    /// no upload size limit, default limits, quantizer speed 10.
    pub fn new() -> Self {
        Self {
            temp_directory: std::env::temp_dir(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            max_upload_bytes: None,
            limits: ConversionLimits::default(),
            quantizer_speed: 10,
        }
    }

    /// Directory where uploads and encoder output are staged.
    #[must_use]
    pub fn with_temp_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.temp_directory = directory.into();
        self
    }

    /// Buffer size for copying uploads. Clamped to a minimum of 4 KiB.
    #[must_use]
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(4096);
        self
    }

    /// Replace the extension allow-list. Leading dots are ignored.
    #[must_use]
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    /// Reject uploads larger than `limit` bytes. `None` disables the check.
    #[must_use]
    pub fn with_max_upload_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Replace the request limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ConversionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// NeuQuant sampling speed for palette generation (1 = best, 30 = fastest).
    #[must_use]
    pub fn with_quantizer_speed(mut self, speed: i32) -> Self {
        self.quantizer_speed = speed.clamp(1, 30);
        self
    }

    /// The scratch directory.
    pub fn temp_directory(&self) -> &Path {
        &self.temp_directory
    }

    /// The request limits.
    pub fn limits(&self) -> &ConversionLimits {
        &self.limits
    }

    /// The extension allow-list, lowercase without dots.
    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    /// The configured upload size limit, if any.
    pub fn max_upload_bytes(&self) -> Option<u64> {
        self.max_upload_bytes
    }

    /// Returns `true` if `extension` (case-insensitive, dot optional) is allowed.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let wanted = extension.trim_start_matches('.');
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(wanted))
    }
}
