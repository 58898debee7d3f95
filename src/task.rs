//! Async wrappers over the blocking pipeline.
//!
//! Decoding and encoding are CPU-bound, so both helpers here move the work
//! onto `tokio::task::spawn_blocking` threads:
//!
//! - [`AsyncUpload`] forwards chunks from an async body through a bounded
//!   channel to a blocking [`UploadWriter`](crate::UploadWriter);
//! - [`convert_artifact_async`] runs a conversion with an optional
//!   wall-clock limit.
//!
//! Cancellation happens only at the call boundary. A conversion that times
//! out keeps running on its blocking thread; its scratch files are deleted
//! when it completes and its result is dropped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use clipgif::task::{AsyncUpload, convert_artifact_async};
//! use clipgif::{AccessGate, ClipgifError, ConversionRequest, Converter};
//!
//! # async fn example() -> Result<(), ClipgifError> {
//! let gate = AccessGate::new("hunter2")?;
//! let session = gate.authenticate("hunter2")?;
//! let converter = Arc::new(Converter::with_defaults());
//!
//! let mut upload = AsyncUpload::begin(&converter.upload_receiver(), "clip.mp4")?;
//! upload.send(std::fs::read("clip.mp4")?).await?;
//! let input = upload.finish().await?;
//!
//! let gif = convert_artifact_async(
//!     converter,
//!     session,
//!     input,
//!     "clip.mp4".to_string(),
//!     ConversionRequest::new().with_range(0.0, 3.0),
//!     Some(Duration::from_secs(60)),
//! )
//! .await?;
//! println!("{} bytes", gif.bytes().len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;

use crate::artifact::TempArtifact;
use crate::delivery::RenderedGif;
use crate::error::ClipgifError;
use crate::gate::Session;
use crate::pipeline::Converter;
use crate::request::ConversionRequest;
use crate::source::MediaBackend;
use crate::upload::{UploadReceiver, UploadWriter};

/// Chunks buffered between the async producer and the disk writer.
///
/// Kept small: each chunk may be several megabytes.
const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// An upload being written to disk on a blocking thread.
///
/// Dropping it without [`finish`](AsyncUpload::finish) stops the writer and
/// deletes the partial file.
pub struct AsyncUpload<T = Vec<u8>>
where
    T: AsRef<[u8]> + Send + 'static,
{
    sender: Option<Sender<T>>,
    handle: Option<JoinHandle<Result<TempArtifact, ClipgifError>>>,
}

impl<T> AsyncUpload<T>
where
    T: AsRef<[u8]> + Send + 'static,
{
    /// Validate `original_name` and start the background writer.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ClipgifError::UnsupportedExtension`] for a disallowed
    /// extension, or an I/O error if the scratch file cannot be created.
    pub fn begin(receiver: &UploadReceiver, original_name: &str) -> Result<Self, ClipgifError> {
        let writer = receiver.begin(original_name)?;
        let (sender, chunks) = tokio::sync::mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let handle = tokio::task::spawn_blocking(move || write_chunks_blocking(writer, chunks));

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queue one chunk, waiting while the writer is behind.
    ///
    /// # Errors
    ///
    /// Returns the writer's error (for example
    /// [`ClipgifError::UploadTooLarge`]) once it has stopped.
    pub async fn send(&mut self, chunk: T) -> Result<(), ClipgifError> {
        let Some(sender) = &self.sender else {
            return Err(ClipgifError::Interrupted(
                "upload writer already stopped".to_string(),
            ));
        };
        if sender.send(chunk).await.is_ok() {
            return Ok(());
        }

        // The writer hung up: surface why.
        self.sender = None;
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(Err(error)) => Err(error),
                Ok(Ok(_partial)) => Err(ClipgifError::Interrupted(
                    "upload writer stopped early".to_string(),
                )),
                Err(error) => Err(ClipgifError::Interrupted(error.to_string())),
            },
            None => Err(ClipgifError::Interrupted(
                "upload writer already stopped".to_string(),
            )),
        }
    }

    /// Close the stream and wait for the file to be flushed.
    ///
    /// # Errors
    ///
    /// Returns the writer's error, or [`ClipgifError::Interrupted`] if the
    /// writer thread died.
    pub async fn finish(mut self) -> Result<TempArtifact, ClipgifError> {
        drop(self.sender.take());
        let handle = self.handle.take().ok_or_else(|| {
            ClipgifError::Interrupted("upload writer already stopped".to_string())
        })?;
        handle
            .await
            .map_err(|error| ClipgifError::Interrupted(error.to_string()))?
    }
}

fn write_chunks_blocking<T: AsRef<[u8]>>(
    mut writer: UploadWriter,
    mut chunks: Receiver<T>,
) -> Result<TempArtifact, ClipgifError> {
    while let Some(chunk) = chunks.blocking_recv() {
        writer.write_chunk(chunk.as_ref())?;
    }
    writer.finish()
}

/// Run [`Converter::convert_artifact`] on a blocking thread.
///
/// With `timeout` set, the call returns [`ClipgifError::Timeout`] once the
/// limit expires; the conversion itself is not interrupted.
///
/// # Errors
///
/// Everything [`Converter::convert_artifact`] returns, plus
/// [`ClipgifError::Timeout`] and [`ClipgifError::Interrupted`].
pub async fn convert_artifact_async<B>(
    converter: Arc<Converter<B>>,
    session: Session,
    input: TempArtifact,
    original_name: String,
    request: ConversionRequest,
    timeout: Option<Duration>,
) -> Result<RenderedGif, ClipgifError>
where
    B: MediaBackend + 'static,
{
    let handle = tokio::task::spawn_blocking(move || {
        converter.convert_artifact(&session, input, &original_name, &request)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                log::warn!("Conversion exceeded {limit:?}; abandoning it to the background");
                return Err(ClipgifError::Timeout(limit));
            }
        },
        None => handle.await,
    };

    joined.map_err(|error| ClipgifError::Interrupted(error.to_string()))?
}
