//! # clipgif
//!
//! Turn short video clips into animated GIFs.
//!
//! `clipgif` trims a video to a time window, resizes it, changes its
//! playback speed, resamples it to a target frame rate and encodes the
//! result as a looping GIF. Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate and encoding
//! by the [`gif`](https://crates.io/crates/gif) crate.
//!
//! ## Quick Start
//!
//! ### Convert a File
//!
//! ```no_run
//! use clipgif::{ConversionRequest, Converter};
//!
//! let converter = Converter::with_defaults();
//! let request = ConversionRequest::new()
//!     .with_range(2.0, 7.0)
//!     .with_frames_per_second(10)
//!     .with_target_width(320);
//! let gif = converter.convert("input.mp4", &request).unwrap();
//! gif.save("input.gif").unwrap();
//! ```
//!
//! ### Convert an Upload
//!
//! Uploads go through the [`AccessGate`]: only a [`Session`] minted by a
//! successful [`AccessGate::authenticate`] unlocks the upload entry points.
//!
//! ```no_run
//! use std::fs::File;
//!
//! use clipgif::{AccessGate, ConversionRequest, Converter};
//!
//! let gate = AccessGate::new("hunter2").unwrap();
//! let session = gate.authenticate("hunter2").unwrap();
//!
//! let converter = Converter::with_defaults();
//! let upload = File::open("holiday.avi").unwrap();
//! let gif = converter
//!     .convert_upload(&session, upload, "holiday.avi", &ConversionRequest::new())
//!     .unwrap();
//! assert_eq!(gif.file_name(), "holiday.gif");
//! ```
//!
//! ## Features
//!
//! - **Trimming**: any window inside the clip, "to the end" by default
//! - **Resizing**: to a target width with the aspect ratio preserved
//! - **Speed change**: faster or slower playback without changing fps
//! - **Frame-rate resampling**: deterministic, monotonic sampling
//! - **Looping**: forever or a fixed number of times
//! - **Size optimization**: inter-frame delta encoding
//! - **Scratch-file hygiene**: every temporary file is deleted, on success
//!   and on failure
//! - **Pluggable decoding**: [`MediaBackend`] / [`MediaSource`] traits with
//!   an FFmpeg implementation
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`task`] helpers that run uploads and conversions on Tokio blocking threads |
//! | `server` | [`server`] module with an `axum` upload form (enabled by default) |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod artifact;
pub mod configuration;
mod conversion;
pub mod decoder;
pub mod delivery;
pub mod error;
pub mod ffmpeg;
pub mod gate;
pub mod gif;
pub mod metadata;
pub mod pipeline;
pub mod plan;
pub mod request;
#[cfg(feature = "server")]
pub mod server;
pub mod source;
#[cfg(feature = "async")]
pub mod task;
pub mod upload;

pub use artifact::TempArtifact;
pub use configuration::{ConversionLimits, ConverterOptions, DEFAULT_CHUNK_SIZE};
pub use crate::gif::{GifOptions, GifWriter};
pub use decoder::{FfmpegBackend, FfmpegSource};
pub use delivery::{RenderedGif, derive_file_name};
pub use error::{ClipgifError, ErrorKind};
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use gate::{AccessGate, Session};
pub use metadata::{FrameSize, SourceInfo};
pub use pipeline::Converter;
pub use plan::{ConversionPlan, TimeWindow};
pub use request::{ConversionRequest, parse_timecode};
#[cfg(feature = "server")]
pub use server::ServerOptions;
pub use source::{MediaBackend, MediaSource};
pub use upload::{UploadReceiver, UploadWriter};
