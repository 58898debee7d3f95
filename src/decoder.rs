//! FFmpeg-backed [`MediaBackend`].
//!
//! [`FfmpegSource`] keeps one demuxer, one decoder and a small window of
//! decoded pictures: the one currently "on screen" and the next one. The
//! pipeline samples with non-decreasing timestamps, so most requests are
//! answered by decoding forward; a backwards request (or a first request
//! well into the file) triggers a seek to the nearest preceding keyframe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbaImage;

use crate::conversion::{
    NO_TIMESTAMP, packed_rgba, pts_to_seconds, rational_to_rate, seconds_to_seek_timestamp,
};
use crate::error::ClipgifError;
use crate::metadata::{FrameSize, SourceInfo};
use crate::source::{MediaBackend, MediaSource};

/// A first request earlier than this is served by decoding from the start.
const SEEK_THRESHOLD_SECONDS: f64 = 1.0;

/// Consecutive unreadable packets tolerated before giving up on a file.
const MAX_CONSECUTIVE_FAILURES: u32 = 64;

/// Opens sources with the FFmpeg libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for FfmpegBackend {
    type Source = FfmpegSource;

    fn open(&self, path: &Path) -> Result<FfmpegSource, ClipgifError> {
        FfmpegSource::open(path)
    }
}

struct DecodedPicture {
    seconds: f64,
    frame: VideoFrame,
}

#[derive(Clone, Copy, PartialEq)]
struct ScalerKey {
    format: Pixel,
    width: u32,
    height: u32,
    output: FrameSize,
}

/// An opened video stream decoded with FFmpeg.
pub struct FfmpegSource {
    input_context: Input,
    decoder: VideoDecoder,
    video_stream_index: usize,
    time_base: Rational,
    start_offset: f64,
    info: SourceInfo,
    path: PathBuf,
    current: Option<DecodedPicture>,
    upcoming: Option<DecodedPicture>,
    scratch: VideoFrame,
    scaled: VideoFrame,
    scaler: Option<(ScalerKey, ScalingContext)>,
    started: bool,
    eof_sent: bool,
    exhausted: bool,
}

impl FfmpegSource {
    /// Open `path`, pick the best video stream and read its metadata.
    ///
    /// # Errors
    ///
    /// - [`ClipgifError::FileOpen`] if the container cannot be read or the
    ///   decoder cannot be created.
    /// - [`ClipgifError::NoVideoStream`] if there is no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ClipgifError> {
        let path = path.as_ref().to_path_buf();
        let open_error = |reason: String| ClipgifError::FileOpen {
            path: path.clone(),
            reason,
        };

        log::debug!("Opening video source: {}", path.display());

        ffmpeg_next::init().map_err(|error| open_error(format!("FFmpeg initialisation failed: {error}")))?;
        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| open_error(error.to_string()))?;

        let (video_stream_index, time_base, start_offset, stream_rate, stream_duration, decoder) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or(ClipgifError::NoVideoStream)?;
            let time_base = stream.time_base();
            let start_offset = match stream.start_time() {
                NO_TIMESTAMP => 0.0,
                start => pts_to_seconds(start, time_base),
            };
            let stream_rate =
                rational_to_rate(stream.avg_frame_rate()).or_else(|| rational_to_rate(stream.rate()));
            let stream_duration = match stream.duration() {
                duration if duration > 0 => pts_to_seconds(duration, time_base),
                _ => 0.0,
            };
            let decoder_context = CodecContext::from_parameters(stream.parameters())
                .map_err(|error| open_error(format!("unreadable codec parameters: {error}")))?;
            let decoder = decoder_context
                .decoder()
                .video()
                .map_err(|error| open_error(format!("no decoder for video stream: {error}")))?;
            (stream.index(), time_base, start_offset, stream_rate, stream_duration, decoder)
        };

        // Container duration is in AV_TIME_BASE units; fall back to the stream's.
        let duration = match input_context.duration() {
            micros if micros > 0 => Duration::from_micros(micros as u64),
            _ => Duration::from_secs_f64(stream_duration),
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let info = SourceInfo {
            duration,
            frame_size: FrameSize::new(decoder.width(), decoder.height()),
            frames_per_second: stream_rate.unwrap_or(0.0),
            codec,
            format: input_context.format().name().to_string(),
        };

        log::info!(
            "Opened {} ({}, {}, {:.2} fps, {:.2}s)",
            path.display(),
            info.format,
            info.frame_size,
            info.frames_per_second,
            info.duration.as_secs_f64(),
        );

        Ok(Self {
            input_context,
            decoder,
            video_stream_index,
            time_base,
            start_offset,
            info,
            path,
            current: None,
            upcoming: None,
            scratch: VideoFrame::empty(),
            scaled: VideoFrame::empty(),
            scaler: None,
            started: false,
            eof_sent: false,
            exhausted: false,
        })
    }

    /// Seek to the keyframe at or before `seconds` and reset decoder state.
    fn seek_to(&mut self, seconds: f64) -> Result<(), ClipgifError> {
        let target = seconds_to_seek_timestamp(seconds + self.start_offset);
        log::debug!("Seeking {} to {seconds:.3}s", self.path.display());
        self.input_context.seek(target, ..target)?;
        self.decoder.flush();
        self.current = None;
        self.upcoming = None;
        self.eof_sent = false;
        self.exhausted = false;
        Ok(())
    }

    /// Pull the next picture out of the decoder, feeding packets as needed.
    fn decode_next(&mut self) -> Result<Option<DecodedPicture>, ClipgifError> {
        let mut failures = 0_u32;

        loop {
            match self.decoder.receive_frame(&mut self.scratch) {
                Ok(()) => {
                    let previous = self
                        .upcoming
                        .as_ref()
                        .or(self.current.as_ref())
                        .map(|picture| picture.seconds);
                    let seconds = match self.scratch.timestamp().or_else(|| self.scratch.pts()) {
                        Some(pts) => pts_to_seconds(pts, self.time_base) - self.start_offset,
                        None => previous.map_or(0.0, |last| last + self.frame_interval()),
                    };
                    let frame = std::mem::replace(&mut self.scratch, VideoFrame::empty());
                    return Ok(Some(DecodedPicture { seconds, frame }));
                }
                Err(FfmpegError::Eof) => return Ok(None),
                Err(_) if self.eof_sent => return Ok(None),
                // Decoder wants more input.
                Err(_) => {}
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() != self.video_stream_index {
                        continue;
                    }
                    match self.decoder.send_packet(&packet) {
                        Ok(()) => failures = 0,
                        Err(error) => {
                            failures += 1;
                            log::debug!("Skipping undecodable packet: {error}");
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) => {
                    failures += 1;
                    log::debug!("Skipping unreadable packet: {error}");
                }
            }

            if failures > MAX_CONSECUTIVE_FAILURES {
                return Err(ClipgifError::VideoDecodeError(format!(
                    "{} consecutive unreadable packets in {}",
                    failures,
                    self.path.display()
                )));
            }
        }
    }

    fn frame_interval(&self) -> f64 {
        if self.info.frames_per_second > 0.0 {
            1.0 / self.info.frames_per_second
        } else {
            0.0
        }
    }

    /// Convert the current picture to an RGBA image of `size`.
    fn render_current(&mut self, size: FrameSize) -> Result<RgbaImage, ClipgifError> {
        let Self {
            current,
            scaler,
            scaled,
            ..
        } = self;
        let picture = current.as_ref().ok_or_else(|| {
            ClipgifError::VideoDecodeError("no decodable frame in the requested range".to_string())
        })?;

        let key = ScalerKey {
            format: picture.frame.format(),
            width: picture.frame.width(),
            height: picture.frame.height(),
            output: size,
        };
        let context = match scaler.take() {
            Some((existing, context)) if existing == key => context,
            previous => {
                // swscale refuses to write into a frame allocated at another size.
                if previous.is_some_and(|(existing, _)| existing.output != key.output) {
                    *scaled = VideoFrame::empty();
                }
                ScalingContext::get(
                    key.format,
                    key.width,
                    key.height,
                    Pixel::RGBA,
                    size.width,
                    size.height,
                    ScalingFlags::BILINEAR,
                )?
            }
        };
        let (_, context) = scaler.insert((key, context));

        context.run(&picture.frame, scaled)?;
        let buffer = packed_rgba(scaled, size);
        RgbaImage::from_raw(size.width, size.height, buffer).ok_or_else(|| {
            ClipgifError::VideoDecodeError(
                "scaled frame buffer does not match the output size".to_string(),
            )
        })
    }
}

impl MediaSource for FfmpegSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn frame_at(&mut self, timestamp: Duration, size: FrameSize) -> Result<RgbaImage, ClipgifError> {
        let target = timestamp.as_secs_f64();

        let behind = self
            .current
            .as_ref()
            .is_some_and(|picture| target < picture.seconds);
        if behind || (!self.started && target > SEEK_THRESHOLD_SECONDS) {
            self.seek_to(target)?;
        }
        self.started = true;

        loop {
            if self.upcoming.is_none() && !self.exhausted {
                self.upcoming = self.decode_next()?;
                self.exhausted = self.upcoming.is_none();
            }
            let take = match (&self.upcoming, &self.current) {
                (Some(next), _) if next.seconds <= target => true,
                (Some(_), None) => true,
                _ => false,
            };
            if !take {
                break;
            }
            self.current = self.upcoming.take();
        }

        self.render_current(size)
    }

    fn close(self) -> Result<(), ClipgifError> {
        log::debug!("Closing video source: {}", self.path.display());
        drop(self);
        Ok(())
    }
}
