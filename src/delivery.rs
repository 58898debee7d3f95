//! Finished GIFs.
//!
//! A [`RenderedGif`] is the in-memory result of one conversion, together
//! with the file name it should be delivered under. Every scratch file used
//! to produce it has already been deleted by the time the caller sees it.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::error::ClipgifError;
use crate::metadata::FrameSize;

/// File name used when the original name yields nothing usable.
pub const FALLBACK_FILE_NAME: &str = "output.gif";

/// MIME type of every delivered artifact.
pub const GIF_CONTENT_TYPE: &str = "image/gif";

/// An encoded animated GIF ready for delivery.
#[derive(Debug, Clone)]
pub struct RenderedGif {
    bytes: Vec<u8>,
    file_name: String,
    frame_count: u64,
    size: FrameSize,
    duration: Duration,
}

impl RenderedGif {
    pub(crate) fn new(
        bytes: Vec<u8>,
        original_name: &str,
        frame_count: u64,
        size: FrameSize,
        duration: Duration,
    ) -> Self {
        Self {
            bytes,
            file_name: derive_file_name(original_name),
            frame_count,
            size,
            duration,
        }
    }

    /// The encoded GIF.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the result, returning the encoded GIF.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Suggested download name, always ending in `.gif`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Number of frames in the animation.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Canvas size.
    pub fn size(&self) -> FrameSize {
        self.size
    }

    /// Playback duration of one loop.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Always `image/gif`.
    pub fn content_type(&self) -> &'static str {
        GIF_CONTENT_TYPE
    }

    /// A `Content-Disposition` value offering the GIF as a download.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }

    /// Write the GIF to any sink.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<(), ClipgifError> {
        writer.write_all(&self.bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the GIF to `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ClipgifError> {
        let file = File::create(path.as_ref())?;
        self.write_to(file)?;
        log::debug!("Saved {} bytes to {}", self.bytes.len(), path.as_ref().display());
        Ok(())
    }
}

/// Derive the download name from the name the user uploaded.
///
/// Directory components and the extension are dropped and `.gif` appended;
/// characters that would break a quoted header value are removed.
///
/// ```
/// use clipgif::derive_file_name;
///
/// assert_eq!(derive_file_name("holiday.avi"), "holiday.gif");
/// assert_eq!(derive_file_name("C:\\clips\\cat.mp4"), "cat.gif");
/// assert_eq!(derive_file_name(""), "output.gif");
/// ```
pub fn derive_file_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let stem = match base.rfind('.') {
        Some(0) | None => base,
        Some(dot) => &base[..dot],
    };
    let cleaned: String = stem
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        format!("{cleaned}.gif")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_replaces_extension() {
        assert_eq!(derive_file_name("clip.AVI"), "clip.gif");
        assert_eq!(derive_file_name("my.holiday.mov"), "my.holiday.gif");
        assert_eq!(derive_file_name("noextension"), "noextension.gif");
    }

    #[test]
    fn file_name_strips_directories_and_quotes() {
        assert_eq!(derive_file_name("../../etc/passwd.mp4"), "passwd.gif");
        assert_eq!(derive_file_name("say \"hi\".mp4"), "say hi.gif");
    }

    #[test]
    fn file_name_falls_back_when_nothing_is_left() {
        assert_eq!(derive_file_name(""), FALLBACK_FILE_NAME);
        assert_eq!(derive_file_name("dir/"), FALLBACK_FILE_NAME);
        assert_eq!(derive_file_name(".."), FALLBACK_FILE_NAME);
    }

    #[test]
    fn headers_describe_a_gif_download() {
        let gif = RenderedGif::new(
            vec![1, 2, 3],
            "clip.mp4",
            1,
            FrameSize::new(2, 2),
            Duration::from_millis(100),
        );
        assert_eq!(gif.content_type(), "image/gif");
        assert_eq!(gif.content_disposition(), "attachment; filename=\"clip.gif\"");
        assert_eq!(gif.bytes().len(), 3);
    }
}
