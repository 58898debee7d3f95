//! Codec backend abstraction.
//!
//! The pipeline never talks to a decoder directly. It asks a
//! [`MediaBackend`] to open a path and receives a [`MediaSource`]: a handle
//! that reports [`SourceInfo`] and samples frames at arbitrary timestamps.
//! [`FfmpegBackend`](crate::FfmpegBackend) is the shipped implementation;
//! any other backend honoring the same contract can be substituted.

use std::path::Path;
use std::time::Duration;

use image::RgbaImage;

use crate::error::ClipgifError;
use crate::metadata::{FrameSize, SourceInfo};

/// Opens sources. Shared across concurrent conversions.
pub trait MediaBackend: Send + Sync {
    /// The handle type produced by [`open`](MediaBackend::open).
    type Source: MediaSource;

    /// Open `path` and read its stream metadata.
    ///
    /// Implementations must not decode frames here; a request whose range is
    /// invalid for the source is rejected after `open` but before any
    /// [`MediaSource::frame_at`] call.
    ///
    /// # Errors
    ///
    /// Returns a decode-kind error if the container or codec is unreadable.
    fn open(&self, path: &Path) -> Result<Self::Source, ClipgifError>;
}

/// An opened, exclusively owned video source.
pub trait MediaSource {
    /// Metadata read at open time.
    fn info(&self) -> &SourceInfo;

    /// The frame displayed at `timestamp`, scaled to `size`.
    ///
    /// "Displayed at" means the latest frame whose presentation time is not
    /// after `timestamp`. Callers sample with non-decreasing timestamps;
    /// implementations may rely on that for sequential decoding but must
    /// still answer a backwards request correctly.
    ///
    /// # Errors
    ///
    /// Returns a decode-kind error if the frame cannot be produced.
    fn frame_at(&mut self, timestamp: Duration, size: FrameSize)
    -> Result<RgbaImage, ClipgifError>;

    /// Release decoder state and file handles.
    ///
    /// # Errors
    ///
    /// Implementations report release failures; callers log them.
    fn close(self) -> Result<(), ClipgifError>
    where
        Self: Sized;
}
