//! HTTP front end.
//!
//! Two routes:
//!
//! - `GET /` serves a minimal upload form;
//! - `POST /convert` takes a multipart body (`secret`, `video`, `start`,
//!   `end`, `fps`, `width`, `speed`, `loop`, `optimize`) and answers with
//!   the GIF as a download.
//!
//! The secret may also be sent as `Authorization: Bearer <secret>`. Either
//! way it must be checked before the `video` field is read, so an
//! unauthenticated client never gets a byte written to disk.
//!
//! Errors are returned as plain text with a status derived from their
//! [`ErrorKind`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};

use crate::artifact::TempArtifact;
use crate::delivery::RenderedGif;
use crate::error::{ClipgifError, ErrorKind};
use crate::gate::{AccessGate, Session};
use crate::pipeline::Converter;
use crate::request::{ConversionRequest, parse_timecode};
use crate::source::MediaBackend;
use crate::task::{AsyncUpload, convert_artifact_async};
use crate::upload::UploadReceiver;

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>clipgif</title></head>
<body>
<h1>Video to GIF</h1>
<form action="/convert" method="post" enctype="multipart/form-data">
  <p><label>Password <input type="password" name="secret" required></label></p>
  <p><label>Start <input name="start" value="0" size="10"></label>
     <label>End <input name="end" value="" size="10" placeholder="end of clip"></label></p>
  <p><label>FPS <input type="number" name="fps" value="10" min="1" max="50"></label>
     <label>Width <input type="number" name="width" value="0" min="0"></label>
     <label>Speed <input name="speed" value="1.0" size="5"></label></p>
  <p><label>Loops (0 = forever) <input type="number" name="loop" value="0" min="0"></label>
     <label>Optimize <select name="optimize"><option value="yes">yes</option><option value="no">no</option></select></label></p>
  <p><input type="file" name="video" accept=".avi,.mp4,.mov" required></p>
  <p><button type="submit">Convert</button></p>
</form>
</body>
</html>
"#;

/// Listener settings for [`serve`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Wall-clock limit per conversion; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Largest accepted request body in bytes.
    pub body_limit: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            timeout: Some(Duration::from_secs(300)),
            body_limit: 512 * 1024 * 1024,
        }
    }
}

impl ServerOptions {
    /// Defaults: `127.0.0.1:8080`, five minute timeout, 512 MiB bodies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listen address.
    #[must_use]
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Set the per-conversion timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the request body limit.
    #[must_use]
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }
}

struct AppState<B: MediaBackend> {
    gate: AccessGate,
    converter: Arc<Converter<B>>,
    receiver: UploadReceiver,
    timeout: Option<Duration>,
}

impl<B: MediaBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            converter: Arc::clone(&self.converter),
            receiver: self.receiver.clone(),
            timeout: self.timeout,
        }
    }
}

/// Build the application router.
pub fn router<B>(gate: AccessGate, converter: Converter<B>, options: &ServerOptions) -> Router
where
    B: MediaBackend + 'static,
{
    let state = AppState {
        gate,
        receiver: converter.upload_receiver(),
        converter: Arc::new(converter),
        timeout: options.timeout,
    };

    Router::new()
        .route("/", get(index))
        .route("/convert", post(convert::<B>))
        .layer(DefaultBodyLimit::max(options.body_limit))
        .with_state(state)
}

/// Listen on `options.bind` until Ctrl-C.
///
/// # Errors
///
/// Returns an I/O error if the address cannot be bound.
pub async fn serve<B>(
    gate: AccessGate,
    converter: Converter<B>,
    options: ServerOptions,
) -> Result<(), ClipgifError>
where
    B: MediaBackend + 'static,
{
    let app = router(gate, converter, &options);
    let listener = tokio::net::TcpListener::bind(options.bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for Ctrl-C: {error}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn convert<B>(
    State(state): State<AppState<B>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response
where
    B: MediaBackend + 'static,
{
    match handle_convert(&state, &headers, multipart).await {
        Ok(gif) => gif_response(gif),
        Err(error) => error_response(&error),
    }
}

async fn handle_convert<B>(
    state: &AppState<B>,
    headers: &HeaderMap,
    mut multipart: Multipart,
) -> Result<RenderedGif, ClipgifError>
where
    B: MediaBackend + 'static,
{
    let mut session: Option<Session> = match bearer_secret(headers) {
        Some(secret) => Some(state.gate.authenticate(secret)?),
        None => None,
    };
    let mut request = ConversionRequest::new();
    let mut upload: Option<(TempArtifact, String)> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "secret" => {
                let submitted = field.text().await.map_err(malformed)?;
                if session.is_none() {
                    session = Some(state.gate.authenticate(&submitted)?);
                }
            }
            "video" => {
                if session.is_none() {
                    return Err(ClipgifError::AccessDenied);
                }
                if upload.is_some() {
                    return Err(ClipgifError::MalformedUpload(
                        "more than one video file".to_string(),
                    ));
                }
                // Text fields precede the file in the form, so reject a bad
                // request before anything is written to disk.
                request.validate(state.converter.options().limits())?;
                let original_name = field.file_name().unwrap_or_default().to_string();
                let mut writer = AsyncUpload::<Bytes>::begin(&state.receiver, &original_name)?;
                while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                    writer.send(chunk).await?;
                }
                upload = Some((writer.finish().await?, original_name));
            }
            _ => {
                let value = field.text().await.map_err(malformed)?;
                apply_form_field(&mut request, &name, &value)?;
            }
        }
    }

    let session = session.ok_or(ClipgifError::AccessDenied)?;
    let (input, original_name) = upload.ok_or(ClipgifError::MissingUpload)?;

    convert_artifact_async(
        Arc::clone(&state.converter),
        session,
        input,
        original_name,
        request,
        state.timeout,
    )
    .await
}

fn malformed(error: MultipartError) -> ClipgifError {
    ClipgifError::MalformedUpload(error.body_text())
}

fn bearer_secret(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Apply one non-file form field to `request`. Unknown fields are ignored.
fn apply_form_field(
    request: &mut ConversionRequest,
    name: &str,
    value: &str,
) -> Result<(), ClipgifError> {
    let value = value.trim();
    match name {
        "start" => request.start_seconds = parse_timecode(value)?,
        "end" => request.end_seconds = parse_timecode(value)?,
        "fps" => request.frames_per_second = parse_number("fps", value)?,
        "width" if value.is_empty() => request.target_width = 0,
        "width" => request.target_width = parse_number("width", value)?,
        "speed" => request.speed = parse_number("speed", value)?,
        "loop" if value.is_empty() => request.loop_count = 0,
        "loop" => request.loop_count = parse_number("loop", value)?,
        "optimize" => request.optimize = parse_flag(value)?,
        other => log::debug!("Ignoring unknown form field {other:?}"),
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ClipgifError> {
    value
        .parse()
        .map_err(|_| ClipgifError::invalid(name, format!("{value:?} is not a valid number")))
}

fn parse_flag(value: &str) -> Result<bool, ClipgifError> {
    match value.to_ascii_lowercase().as_str() {
        "" | "1" | "on" | "yes" | "true" => Ok(true),
        "0" | "off" | "no" | "false" => Ok(false),
        _ => Err(ClipgifError::invalid(
            "optimize",
            format!("{value:?} is not yes or no"),
        )),
    }
}

/// HTTP status for each error kind.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        ErrorKind::Validation | ErrorKind::Decode => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Encode | ErrorKind::Io | ErrorKind::Configuration => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: &ClipgifError) -> Response {
    let kind = error.kind();
    if kind.is_user_retriable() {
        log::info!("Request failed ({kind}): {error}");
    } else {
        log::error!("Request failed ({kind}): {error}");
    }
    (
        status_for(kind),
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        error.to_string(),
    )
        .into_response()
}

fn gif_response(gif: RenderedGif) -> Response {
    let disposition = gif.content_disposition();
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, gif.content_type().to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        gif.into_bytes(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::{FromRequest, Request};
    use axum::http::HeaderValue;

    use crate::configuration::ConverterOptions;
    use crate::decoder::FfmpegBackend;

    use super::*;

    const BOUNDARY: &str = "clipgif-boundary";

    fn state_in(directory: &std::path::Path) -> AppState<FfmpegBackend> {
        let converter = Converter::new(
            FfmpegBackend::new(),
            ConverterOptions::new().with_temp_directory(directory),
        );
        AppState {
            gate: AccessGate::new("hunter2").unwrap(),
            receiver: converter.upload_receiver(),
            converter: Arc::new(converter),
            timeout: None,
        }
    }

    async fn multipart_of(fields: &[(&str, Option<&str>, &str)]) -> Multipart {
        let mut body = String::new();
        for (name, file_name, value) in fields {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        let request = Request::builder()
            .method("POST")
            .uri("/convert")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn reversed_range_is_rejected_before_the_video_is_stored() {
        let scratch = tempfile::tempdir().unwrap();
        let state = state_in(scratch.path());
        // An upload that would itself be refused shows which check ran first.
        let multipart = multipart_of(&[
            ("secret", None, "hunter2"),
            ("start", None, "5"),
            ("end", None, "3"),
            ("video", Some("clip.exe"), "not really a video"),
        ])
        .await;

        let result = handle_convert(&state, &HeaderMap::new(), multipart).await;

        assert!(
            matches!(result, Err(ClipgifError::InvalidRange { .. })),
            "unexpected {result:?}"
        );
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn video_before_the_secret_is_refused() {
        let scratch = tempfile::tempdir().unwrap();
        let state = state_in(scratch.path());
        let multipart = multipart_of(&[
            ("video", Some("clip.mp4"), "frames"),
            ("secret", None, "hunter2"),
        ])
        .await;

        let result = handle_convert(&state, &HeaderMap::new(), multipart).await;

        assert!(matches!(result, Err(ClipgifError::AccessDenied)), "unexpected {result:?}");
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(status_for(ClipgifError::AccessDenied.kind()), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(ClipgifError::InvalidRange { start: 7.0, end: 2.0 }.kind()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ClipgifError::NoVideoStream.kind()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(ClipgifError::GifEncodeError("boom".into()).kind()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(ClipgifError::Timeout(Duration::from_secs(1)).kind()),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(ClipgifError::SecretNotConfigured.kind()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn form_fields_fill_the_request() {
        let mut request = ConversionRequest::new();
        for (name, value) in [
            ("start", "2"),
            ("end", "00:07"),
            ("fps", "15"),
            ("width", "320"),
            ("speed", "1.5"),
            ("loop", "3"),
            ("optimize", "no"),
            ("unknown", "ignored"),
        ] {
            apply_form_field(&mut request, name, value).unwrap();
        }

        assert_eq!(
            request,
            ConversionRequest::new()
                .with_range(2.0, 7.0)
                .with_frames_per_second(15)
                .with_target_width(320)
                .with_speed(1.5)
                .with_loop_count(3)
                .with_optimize(false)
        );
    }

    #[test]
    fn bad_numbers_name_the_field() {
        let mut request = ConversionRequest::new();
        match apply_form_field(&mut request, "fps", "ten") {
            Err(ClipgifError::InvalidParameter { name, .. }) => assert_eq!(name, "fps"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(apply_form_field(&mut request, "optimize", "maybe").is_err());
    }

    #[test]
    fn bearer_header_is_extracted() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_secret(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_secret(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer hunter2"));
        assert_eq!(bearer_secret(&headers), Some("hunter2"));
    }
}
