//! Animated GIF encoding.
//!
//! [`GifWriter`] streams RGBA frames into a `gif::Encoder`. Each frame is
//! quantized to its own 256-colour palette with the encoder's NeuQuant
//! quantizer.
//!
//! With [`GifOptions::optimize`] set, frames after the first are written as
//! deltas: the frame is cropped to the rectangle that changed since the
//! previous source frame, pixels inside it that did not change are made
//! transparent, and every frame uses the "keep" disposal so the previous
//! picture shows through. Displayed content is unaffected; only the
//! compressed size shrinks.

use std::io::Write;

use gif::{DisposalMethod, Encoder, Frame, Repeat};
use image::RgbaImage;

use crate::error::ClipgifError;
use crate::metadata::FrameSize;

/// Encoder settings for one GIF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifOptions {
    /// Loop count; `0` loops forever.
    pub loop_count: u16,
    /// Write inter-frame deltas instead of full frames.
    pub optimize: bool,
    /// NeuQuant sampling speed, 1 (best) to 30 (fastest).
    pub quantizer_speed: i32,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            loop_count: 0,
            optimize: true,
            quantizer_speed: 10,
        }
    }
}

impl GifOptions {
    /// Create default options (loop forever, optimized, speed 10).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the loop count (`0` loops forever).
    #[must_use]
    pub fn with_loop_count(mut self, loop_count: u16) -> Self {
        self.loop_count = loop_count;
        self
    }

    /// Enable or disable delta encoding.
    #[must_use]
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Set the quantizer speed (clamped to 1..=30).
    #[must_use]
    pub fn with_quantizer_speed(mut self, speed: i32) -> Self {
        self.quantizer_speed = speed.clamp(1, 30);
        self
    }

    fn repeat(&self) -> Repeat {
        match self.loop_count {
            0 => Repeat::Infinite,
            count => Repeat::Finite(count),
        }
    }
}

/// A rectangle inside the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

/// Streaming GIF writer over any [`Write`] sink.
pub struct GifWriter<W: Write> {
    encoder: Encoder<W>,
    size: FrameSize,
    options: GifOptions,
    previous: Option<RgbaImage>,
    frames_written: u64,
}

impl<W: Write> GifWriter<W> {
    /// Write the GIF header and loop extension for a canvas of `size`.
    ///
    /// # Errors
    ///
    /// Returns [`ClipgifError::GifEncodeError`] if the canvas does not fit
    /// GIF's 16-bit dimensions, or an I/O error from the sink.
    pub fn new(sink: W, size: FrameSize, mut options: GifOptions) -> Result<Self, ClipgifError> {
        options.quantizer_speed = options.quantizer_speed.clamp(1, 30);
        let width = canvas_dimension(size.width)?;
        let height = canvas_dimension(size.height)?;

        let mut encoder = Encoder::new(sink, width, height, &[])?;
        encoder.set_repeat(options.repeat())?;

        log::debug!(
            "Started GIF {} (loop={}, optimize={}, speed={})",
            size,
            options.loop_count,
            options.optimize,
            options.quantizer_speed,
        );

        Ok(Self {
            encoder,
            size,
            options,
            previous: None,
            frames_written: 0,
        })
    }

    /// Append one frame shown for `delay` hundredths of a second.
    ///
    /// # Errors
    ///
    /// Returns [`ClipgifError::GifEncodeError`] if the image does not match
    /// the canvas size or the encoder rejects the frame.
    pub fn write_frame(&mut self, image: RgbaImage, delay: u16) -> Result<(), ClipgifError> {
        if image.width() != self.size.width || image.height() != self.size.height {
            return Err(ClipgifError::GifEncodeError(format!(
                "frame is {}x{}, canvas is {}",
                image.width(),
                image.height(),
                self.size
            )));
        }

        let mut frame = match (&self.previous, self.options.optimize) {
            (Some(previous), true) => delta_frame(previous, &image, self.options.quantizer_speed),
            _ => full_frame(&image, self.options.quantizer_speed),
        };
        frame.delay = delay;
        frame.dispose = DisposalMethod::Keep;

        self.encoder.write_frame(&frame)?;
        self.frames_written += 1;
        if self.options.optimize {
            self.previous = Some(image);
        }
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Write the trailer and return the sink.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the trailer cannot be written.
    pub fn finish(self) -> Result<W, ClipgifError> {
        log::debug!("Finished GIF with {} frames", self.frames_written);
        Ok(self.encoder.into_inner()?)
    }
}

fn canvas_dimension(value: u32) -> Result<u16, ClipgifError> {
    u16::try_from(value)
        .ok()
        .filter(|&value| value > 0)
        .ok_or_else(|| ClipgifError::GifEncodeError(format!("invalid GIF dimension {value}")))
}

fn full_frame(image: &RgbaImage, speed: i32) -> Frame<'static> {
    let mut pixels = image.as_raw().clone();
    Frame::from_rgba_speed(image.width() as u16, image.height() as u16, &mut pixels, speed)
}

/// Encode only what changed between `previous` and `current`.
fn delta_frame(previous: &RgbaImage, current: &RgbaImage, speed: i32) -> Frame<'static> {
    let Some(region) = changed_region(previous, current) else {
        // Nothing changed: a single transparent pixel keeps the frame (and its delay).
        let mut pixel = [0_u8; 4];
        return Frame::from_rgba_speed(1, 1, &mut pixel, speed);
    };

    let mut pixels = Vec::with_capacity(region.width as usize * region.height as usize * 4);
    for y in region.top..region.top + region.height {
        for x in region.left..region.left + region.width {
            let now = current.get_pixel(x, y);
            if previous.get_pixel(x, y) == now {
                pixels.extend_from_slice(&[0, 0, 0, 0]);
            } else {
                pixels.extend_from_slice(&[now[0], now[1], now[2], 0xFF]);
            }
        }
    }

    let mut frame =
        Frame::from_rgba_speed(region.width as u16, region.height as u16, &mut pixels, speed);
    frame.left = region.left as u16;
    frame.top = region.top as u16;
    frame
}

/// Bounding box of the pixels that differ, or `None` if the images are equal.
fn changed_region(previous: &RgbaImage, current: &RgbaImage) -> Option<Region> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in current.enumerate_pixels() {
        if previous.get_pixel(x, y) != pixel {
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                }
            });
        }
    }

    bounds.map(|(min_x, min_y, max_x, max_y)| Region {
        left: min_x,
        top: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}
