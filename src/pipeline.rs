//! The conversion pipeline.
//!
//! [`Converter`] turns one source video into one [`RenderedGif`]:
//!
//! 1. the request is validated without touching the source;
//! 2. the source is opened through the [`MediaBackend`];
//! 3. a [`ConversionPlan`] fixes the time window, output size and sample
//!    timestamps;
//! 4. frames are sampled in order and streamed into a [`GifWriter`] backed
//!    by a scratch file;
//! 5. the scratch file is read back and deleted, and the source is closed.
//!
//! Any failure aborts the call with a single [`ClipgifError`]; everything
//! acquired up to that point is released and no partial GIF is returned.

use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use crate::artifact::TempArtifact;
use crate::configuration::ConverterOptions;
use crate::decoder::FfmpegBackend;
use crate::delivery::RenderedGif;
use crate::error::ClipgifError;
use crate::gate::Session;
use crate::gif::{GifOptions, GifWriter};
use crate::metadata::SourceInfo;
use crate::plan::ConversionPlan;
use crate::request::ConversionRequest;
use crate::source::{MediaBackend, MediaSource};
use crate::upload::UploadReceiver;

/// Converts videos to animated GIFs.
///
/// A converter holds no per-call state and can be shared between threads;
/// every call owns its own source handle and scratch files.
///
/// # Example
///
/// ```no_run
/// use clipgif::{ConversionRequest, Converter};
///
/// let converter = Converter::with_defaults();
/// let request = ConversionRequest::new()
///     .with_range(2.0, 7.0)
///     .with_frames_per_second(10)
///     .with_target_width(320);
/// let gif = converter.convert("clip.mp4", &request)?;
/// gif.save(gif.file_name())?;
/// # Ok::<(), clipgif::ClipgifError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Converter<B: MediaBackend = FfmpegBackend> {
    backend: B,
    options: ConverterOptions,
}

impl Converter<FfmpegBackend> {
    /// An FFmpeg-backed converter with default options.
    pub fn with_defaults() -> Self {
        Self::new(FfmpegBackend::new(), ConverterOptions::default())
    }
}

impl<B: MediaBackend> Converter<B> {
    /// Create a converter over `backend`.
    pub fn new(backend: B, options: ConverterOptions) -> Self {
        Self { backend, options }
    }

    /// The options every conversion runs with.
    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    /// The media backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// An upload receiver writing into this converter's scratch directory.
    pub fn upload_receiver(&self) -> UploadReceiver {
        UploadReceiver::new(&self.options)
    }

    /// Open `path`, read its metadata and close it again.
    ///
    /// # Errors
    ///
    /// Returns a decode-kind error if the file cannot be opened.
    pub fn probe<P: AsRef<Path>>(&self, path: P) -> Result<SourceInfo, ClipgifError> {
        let source = self.backend.open(path.as_ref())?;
        let info = source.info().clone();
        close_source(source);
        Ok(info)
    }

    /// Convert the video at `path`.
    ///
    /// The download name is derived from the file name of `path`.
    ///
    /// # Errors
    ///
    /// - Validation errors for a malformed request or an empty window.
    /// - Decode errors if the source cannot be opened or decoded.
    /// - Encode and I/O errors from GIF generation.
    pub fn convert<P: AsRef<Path>>(
        &self,
        path: P,
        request: &ConversionRequest,
    ) -> Result<RenderedGif, ClipgifError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.render(path, &name, request)
    }

    /// Convert an upload that has already been received.
    ///
    /// The artifact is deleted whatever the outcome.
    ///
    /// # Errors
    ///
    /// Same as [`convert`](Converter::convert).
    pub fn convert_artifact(
        &self,
        _session: &Session,
        input: TempArtifact,
        original_name: &str,
        request: &ConversionRequest,
    ) -> Result<RenderedGif, ClipgifError> {
        let rendered = self.render(input.path(), original_name, request)?;
        input.remove()?;
        Ok(rendered)
    }

    /// Receive an upload from `reader` and convert it.
    ///
    /// The request is validated before a single byte is read, so a
    /// malformed request never costs disk space.
    ///
    /// # Errors
    ///
    /// Validation errors for the request, file name or upload size, plus
    /// everything [`convert`](Converter::convert) can return.
    pub fn convert_upload<R: Read>(
        &self,
        session: &Session,
        reader: R,
        original_name: &str,
        request: &ConversionRequest,
    ) -> Result<RenderedGif, ClipgifError> {
        request.validate(&self.options.limits)?;
        let input = self.upload_receiver().receive(reader, original_name)?;
        self.convert_artifact(session, input, original_name, request)
    }

    fn render(
        &self,
        source_path: &Path,
        original_name: &str,
        request: &ConversionRequest,
    ) -> Result<RenderedGif, ClipgifError> {
        request.validate(&self.options.limits)?;

        let started = Instant::now();
        let mut source = self.backend.open(source_path)?;
        let outcome = self.encode(&mut source, request);
        close_source(source);
        let (bytes, plan) = outcome?;

        log::info!(
            "Converted {} to {} frames at {} ({} bytes) in {:.2}s",
            if original_name.is_empty() { "<unnamed>" } else { original_name },
            plan.frame_count,
            plan.output_size,
            bytes.len(),
            started.elapsed().as_secs_f64(),
        );

        Ok(RenderedGif::new(
            bytes,
            original_name,
            plan.frame_count,
            plan.output_size,
            plan.output_duration(),
        ))
    }

    fn encode(
        &self,
        source: &mut B::Source,
        request: &ConversionRequest,
    ) -> Result<(Vec<u8>, ConversionPlan), ClipgifError> {
        let plan = ConversionPlan::resolve(request, source.info(), &self.options.limits)?;
        log::debug!(
            "Plan: {:.3}s..{:.3}s at {} fps, speed {}, {} frames of {}",
            plan.window.start,
            plan.window.end,
            plan.frames_per_second,
            plan.speed,
            plan.frame_count,
            plan.output_size,
        );

        let gif_options = GifOptions::new()
            .with_loop_count(request.loop_count)
            .with_optimize(request.optimize)
            .with_quantizer_speed(self.options.quantizer_speed);

        let (file, output) = TempArtifact::create(&self.options.temp_directory, "gif")?;
        let mut writer = GifWriter::new(BufWriter::new(file), plan.output_size, gif_options)?;
        for (index, timestamp) in plan.timestamps().enumerate() {
            let image = source.frame_at(timestamp, plan.output_size)?;
            writer.write_frame(image, plan.frame_delay(index as u64))?;
        }
        let mut sink = writer.finish()?;
        sink.flush()?;
        drop(sink);

        let bytes = std::fs::read(output.path())?;
        output.remove()?;
        Ok((bytes, plan))
    }
}

fn close_source<S: MediaSource>(source: S) {
    if let Err(error) = source.close() {
        log::warn!("Failed to close video source: {error}");
    }
}
