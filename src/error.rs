//! Error types for the `clipgif` crate.
//!
//! [`ClipgifError`] is the single error type returned by every fallible
//! operation. Each variant belongs to one [`ErrorKind`], the coarse taxonomy
//! callers use to decide how to report a failure (and whether the user can
//! fix it by changing their input).

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
    path::PathBuf,
    time::Duration,
};

use ffmpeg_next::Error as FfmpegError;
use gif::EncodingError;
use thiserror::Error;

/// Coarse classification of a [`ClipgifError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong or missing shared secret.
    Auth,
    /// Malformed request or upload. The message names the violated constraint.
    Validation,
    /// The source could not be opened or decoded.
    Decode,
    /// GIF generation failed.
    Encode,
    /// Disk or temp-space failure. Not fixable by the user.
    Io,
    /// A caller-imposed wall-clock limit expired.
    Timeout,
    /// The deployment is misconfigured.
    Configuration,
}

impl ErrorKind {
    /// Whether the user can reasonably retry (with the same or different input).
    pub fn is_user_retriable(self) -> bool {
        !matches!(self, ErrorKind::Io | ErrorKind::Configuration)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ErrorKind::Auth => "authentication",
            ErrorKind::Validation => "validation",
            ErrorKind::Decode => "decode",
            ErrorKind::Encode => "encode",
            ErrorKind::Io => "i/o",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// The unified error type for all `clipgif` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClipgifError {
    /// The submitted secret did not match.
    #[error("Access denied: incorrect password")]
    AccessDenied,

    /// No secret was configured; the gate refuses every request.
    #[error("No access secret configured (set CLIPGIF_SECRET or pass --secret)")]
    SecretNotConfigured,

    /// The normalized time window is empty.
    #[error("Invalid range: start ({start:.3}s) must be less than end ({end:.3}s)")]
    InvalidRange {
        /// Normalized start, in seconds.
        start: f64,
        /// Normalized end, in seconds.
        end: f64,
    },

    /// A request parameter is outside its allowed domain.
    #[error("Invalid {name}: {reason}")]
    InvalidParameter {
        /// Parameter name as the user sees it.
        name: &'static str,
        /// The violated constraint.
        reason: String,
    },

    /// The uploaded file's extension is not on the allow-list.
    #[error("Unsupported file type {extension:?} (accepted: {allowed})")]
    UnsupportedExtension {
        /// The extension that was found (possibly empty).
        extension: String,
        /// Comma-separated allow-list.
        allowed: String,
    },

    /// The upload exceeded the configured size limit.
    #[error("Upload exceeds the {limit} byte limit")]
    UploadTooLarge {
        /// Maximum accepted size in bytes.
        limit: u64,
    },

    /// A conversion was requested without a video file.
    #[error("No video file was uploaded")]
    MissingUpload,

    /// The multipart body could not be parsed.
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    /// The source file could not be opened.
    #[error("Failed to open video at {path}: {reason}")]
    FileOpen {
        /// Path that was opened.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The file has no video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// An error reported by the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// GIF encoding failed.
    #[error("GIF encoding error: {0}")]
    GifEncodeError(String),

    /// An I/O error while reading or writing scratch files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// A background conversion task died before producing a result.
    #[error("Conversion task interrupted: {0}")]
    Interrupted(String),

    /// The caller's wall-clock limit expired.
    #[error("Conversion timed out after {0:?}")]
    Timeout(Duration),
}

impl ClipgifError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClipgifError::AccessDenied => ErrorKind::Auth,
            ClipgifError::SecretNotConfigured => ErrorKind::Configuration,
            ClipgifError::InvalidRange { .. }
            | ClipgifError::InvalidParameter { .. }
            | ClipgifError::UnsupportedExtension { .. }
            | ClipgifError::UploadTooLarge { .. }
            | ClipgifError::MissingUpload
            | ClipgifError::MalformedUpload(_) => ErrorKind::Validation,
            ClipgifError::FileOpen { .. }
            | ClipgifError::NoVideoStream
            | ClipgifError::VideoDecodeError(_)
            | ClipgifError::FfmpegError(_) => ErrorKind::Decode,
            ClipgifError::GifEncodeError(_) => ErrorKind::Encode,
            ClipgifError::IoError(_) | ClipgifError::Interrupted(_) => ErrorKind::Io,
            ClipgifError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ClipgifError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

impl From<FfmpegError> for ClipgifError {
    fn from(error: FfmpegError) -> Self {
        ClipgifError::FfmpegError(error.to_string())
    }
}

impl From<EncodingError> for ClipgifError {
    fn from(error: EncodingError) -> Self {
        match error {
            EncodingError::Io(io) => ClipgifError::IoError(io),
            other => ClipgifError::GifEncodeError(other.to_string()),
        }
    }
}
