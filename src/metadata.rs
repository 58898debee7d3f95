//! Source media metadata.
//!
//! [`SourceInfo`] is read once when a source is opened and describes the
//! stream the pipeline samples from. [`FrameSize`] is used both for source
//! dimensions and for the resolved output dimensions of a conversion.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

/// Width and height of a frame in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameSize {
    /// Create a new frame size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in a frame of this size.
    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl Display for FrameSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Metadata for an opened video source.
///
/// # Example
///
/// ```no_run
/// use clipgif::{Converter, ConverterOptions, FfmpegBackend};
///
/// let converter = Converter::new(FfmpegBackend::new(), ConverterOptions::default());
/// let info = converter.probe("input.avi")?;
/// println!("{} at {:.2} fps, {:?}", info.frame_size, info.frames_per_second, info.duration);
/// # Ok::<(), clipgif::ClipgifError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct SourceInfo {
    /// Total playable duration.
    pub duration: Duration,
    /// Native frame dimensions.
    pub frame_size: FrameSize,
    /// Average frame rate (may be approximate for variable-frame-rate input).
    pub frames_per_second: f64,
    /// Codec name (e.g. `"mpeg4"`, `"h264"`).
    pub codec: String,
    /// Container format name (e.g. `"avi"`, `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
}
