//! Shared helpers for integration tests.
//!
//! [`SyntheticBackend`] stands in for a real codec: it "decodes" a clip of
//! the configured duration, size and frame rate whose frames are solid
//! colours encoding their own index, so tests can check exactly which
//! source frame was sampled.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clipgif::{
    ClipgifError, ConverterOptions, FrameSize, MediaBackend, MediaSource, SourceInfo,
};
use image::{Rgba, RgbaImage};

/// What the backend has been asked to do so far.
#[derive(Debug, Default)]
pub struct Activity {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub frames: AtomicUsize,
    pub timestamps: Mutex<Vec<Duration>>,
}

impl Activity {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn timestamps(&self) -> Vec<Duration> {
        self.timestamps.lock().unwrap().clone()
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    info: SourceInfo,
    activity: Arc<Activity>,
    fail_at_frame: Option<usize>,
    frame_delay: Option<Duration>,
}

impl SyntheticBackend {
    pub fn new(seconds: f64, width: u32, height: u32, fps: f64) -> Self {
        Self {
            info: SourceInfo {
                duration: Duration::from_secs_f64(seconds),
                frame_size: FrameSize::new(width, height),
                frames_per_second: fps,
                codec: "synthetic".to_string(),
                format: "synthetic".to_string(),
            },
            activity: Arc::new(Activity::default()),
            fail_at_frame: None,
            frame_delay: None,
        }
    }

    /// The 20 second 640x480 30 fps clip used by most tests.
    pub fn standard() -> Self {
        Self::new(20.0, 640, 480, 30.0)
    }

    /// Fail the `index`-th `frame_at` call (zero-based) with a decode error.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at_frame = Some(index);
        self
    }

    /// Sleep this long in every `frame_at` call.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    pub fn activity(&self) -> Arc<Activity> {
        Arc::clone(&self.activity)
    }
}

impl MediaBackend for SyntheticBackend {
    type Source = SyntheticSource;

    fn open(&self, path: &Path) -> Result<SyntheticSource, ClipgifError> {
        if !path.exists() {
            return Err(ClipgifError::FileOpen {
                path: path.to_path_buf(),
                reason: "no such file".to_string(),
            });
        }
        self.activity.opens.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticSource {
            info: self.info.clone(),
            activity: Arc::clone(&self.activity),
            fail_at_frame: self.fail_at_frame,
            frame_delay: self.frame_delay,
            served: 0,
        })
    }
}

pub struct SyntheticSource {
    info: SourceInfo,
    activity: Arc<Activity>,
    fail_at_frame: Option<usize>,
    frame_delay: Option<Duration>,
    served: usize,
}

impl MediaSource for SyntheticSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn frame_at(&mut self, timestamp: Duration, size: FrameSize) -> Result<RgbaImage, ClipgifError> {
        if let Some(delay) = self.frame_delay {
            std::thread::sleep(delay);
        }
        if self.fail_at_frame == Some(self.served) {
            return Err(ClipgifError::VideoDecodeError("injected failure".to_string()));
        }
        self.served += 1;
        self.activity.frames.fetch_add(1, Ordering::SeqCst);
        self.activity.timestamps.lock().unwrap().push(timestamp);

        let index = source_frame_index(timestamp, self.info.frames_per_second);
        Ok(RgbaImage::from_pixel(size.width, size.height, frame_colour(index)))
    }

    fn close(self) -> Result<(), ClipgifError> {
        self.activity.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Index of the source frame displayed at `timestamp`.
pub fn source_frame_index(timestamp: Duration, fps: f64) -> u64 {
    (timestamp.as_secs_f64() * fps + 1e-9).floor() as u64
}

/// Colour of synthetic source frame `index`.
pub fn frame_colour(index: u64) -> Rgba<u8> {
    Rgba([(index % 256) as u8, (index / 256 % 256) as u8, 128, 255])
}

/// Options rooted in a fresh scratch directory.
pub fn scratch_options() -> (tempfile::TempDir, ConverterOptions) {
    let directory = tempfile::tempdir().expect("Failed to create scratch directory");
    let options = ConverterOptions::new().with_temp_directory(directory.path());
    (directory, options)
}

/// Create a placeholder input file inside `directory`.
pub fn placeholder_input(directory: &Path, name: &str) -> std::path::PathBuf {
    let path = directory.join(name);
    std::fs::write(&path, b"synthetic").expect("Failed to write placeholder input");
    path
}

/// Names of every file left in `directory`.
pub fn leftover_files(directory: &Path) -> Vec<String> {
    std::fs::read_dir(directory)
        .expect("Failed to list scratch directory")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

/// Count frames and total delay of an encoded GIF.
pub fn decode_summary(bytes: &[u8]) -> (u16, u16, usize, u32) {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(bytes).expect("Failed to read GIF header");
    let (width, height) = (decoder.width(), decoder.height());
    let mut frames = 0;
    let mut delay = 0_u32;
    while let Some(frame) = decoder.read_next_frame().expect("Failed to decode GIF frame") {
        frames += 1;
        delay += u32::from(frame.delay);
    }
    (width, height, frames, delay)
}

/// Loop count stored in the NETSCAPE2.0 extension, if present.
pub fn netscape_loop_count(bytes: &[u8]) -> Option<u16> {
    let marker = b"NETSCAPE2.0";
    let start = bytes.windows(marker.len()).position(|window| window == marker)?;
    let block = bytes.get(start + marker.len()..start + marker.len() + 4)?;
    // Sub-block: size 3, id 1, little-endian count.
    (block[0] == 3 && block[1] == 1).then(|| u16::from_le_bytes([block[2], block[3]]))
}

/// Decode a GIF and composite every frame onto the canvas, the way a viewer
/// shows it with "keep" disposal.
pub fn composited_frames(bytes: &[u8]) -> Vec<RgbaImage> {
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(bytes).expect("Failed to read GIF header");
    let mut canvas = RgbaImage::new(u32::from(decoder.width()), u32::from(decoder.height()));
    let mut shown = Vec::new();
    while let Some(frame) = decoder.read_next_frame().expect("Failed to decode GIF frame") {
        let width = usize::from(frame.width);
        for (offset, pixel) in frame.buffer.chunks_exact(4).enumerate() {
            if pixel[3] == 0 {
                continue;
            }
            let x = u32::from(frame.left) + (offset % width) as u32;
            let y = u32::from(frame.top) + (offset / width) as u32;
            canvas.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], pixel[3]]));
        }
        shown.push(canvas.clone());
    }
    shown
}
