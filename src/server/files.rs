//! Streaming file responses: inline serving, downloads and thumbnails.

use std::io;
use std::path::Path as FsPath;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use futures_util::stream::{self, Stream, StreamExt};
use tokio_util::io::ReaderStream;
use tracing::warn;

use super::timeouts::{blocking_with_timeout, stat, with_io_timeout};
use super::AppState;
use crate::confine::ConfinedPath;
use crate::error::{AppError, AppResult};
use crate::media::content_type_for;

/// Resolve `user_path` and require an existing regular file.
async fn confined_file(state: &AppState, user_path: &str) -> AppResult<ConfinedPath> {
    let target = state.confinement.resolve(user_path)?;
    match stat(state.config.io_timeout, target.absolute()).await? {
        None => Err(AppError::not_found("not_found", "File not found")),
        Some(m) if !m.is_file() => Err(AppError::user("not_a_file", "Not a file")),
        Some(_) => Ok(target),
    }
}

/// Media-root bytes are untrusted: no sniffing, and any document rendered from them
/// gets an opaque origin so its scripts cannot reach the dashboard API.
fn untrusted_content_headers(headers: &mut HeaderMap) {
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_static("sandbox"));
}

/// Yield chunks of `inner`, failing the body with `TimedOut` when a single read takes
/// longer than `limit`. The stream ends after the first error.
fn with_chunk_timeout<S>(inner: S, limit: Duration) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    S: Stream<Item = io::Result<Bytes>> + Send + Unpin,
{
    stream::unfold(Some(inner), move |state| async move {
        let mut inner = state?;
        match tokio::time::timeout(limit, inner.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(inner))),
            Ok(Some(Err(e))) => Some((Err(e), None)),
            Ok(None) => None,
            Err(_) => {
                warn!(target: "files", ?limit, "body read timed out");
                Some((Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")), None))
            }
        }
    })
}

async fn stream_file(limit: Duration, path: &FsPath, content_type: &str, disposition: Option<HeaderValue>) -> AppResult<Response> {
    let file = with_io_timeout(limit, "open", tokio::fs::File::open(path)).await?;
    let len = with_io_timeout(limit, "stat", file.metadata()).await?.len();
    let body = with_chunk_timeout(ReaderStream::new(file), limit);
    let mut resp = Response::new(Body::from_stream(body));
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type).unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    untrusted_content_headers(headers);
    if let Some(d) = disposition {
        headers.insert(header::CONTENT_DISPOSITION, d);
    }
    Ok(resp)
}

/// `attachment; filename="<ascii fallback>"; filename*=UTF-8''<percent-encoded>`
pub(crate) fn attachment_disposition(name: &str) -> HeaderValue {
    let ascii: String = name
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();
    let value = format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{}", urlencoding::encode(name));
    HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static("attachment"))
}

pub async fn serve_file(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    let target = confined_file(&state, &path).await?;
    stream_file(state.config.io_timeout, target.absolute(), content_type_for(target.absolute()), None).await
}

pub async fn download_file(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    let target = confined_file(&state, &path).await?;
    let name = target.file_name().unwrap_or_else(|| "download".to_string());
    stream_file(
        state.config.io_timeout,
        target.absolute(),
        content_type_for(target.absolute()),
        Some(attachment_disposition(&name)),
    )
    .await
}

pub async fn thumbnail(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    let target = confined_file(&state, &path).await?;
    let limit = state.config.io_timeout;
    let cache = state.thumbnails.clone();
    let source = target.absolute().to_path_buf();
    let thumb = match blocking_with_timeout(limit, "thumbnail", move || Ok(cache.get_or_create(&source))).await {
        Ok(t) => t,
        Err(e) => {
            warn!(target: "thumbnail", path = %target.relative_string(), error = %e, "serving original instead");
            None
        }
    };
    match thumb {
        Some(p) => stream_file(limit, &p, "image/jpeg", None).await,
        None => stream_file(limit, target.absolute(), content_type_for(target.absolute()), None).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stalled_chunk_fails_the_body() {
        let stalled = stream::iter(vec![Ok(Bytes::from_static(b"first"))]).chain(stream::pending());
        let mut body = Box::pin(with_chunk_timeout(stalled, Duration::from_millis(50)));
        assert_eq!(body.next().await.unwrap().unwrap(), Bytes::from_static(b"first"));
        let err = body.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn healthy_stream_passes_through() {
        let chunks = stream::iter(vec![Ok(Bytes::from_static(b"a")), Ok(Bytes::from_static(b"b"))]);
        let all: Vec<_> = with_chunk_timeout(chunks, Duration::from_secs(5)).collect().await;
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn disposition_plain_name() {
        let v = attachment_disposition("clip.mp4");
        assert_eq!(v.to_str().unwrap(), "attachment; filename=\"clip.mp4\"; filename*=UTF-8''clip.mp4");
    }

    #[test]
    fn disposition_non_ascii_and_quotes() {
        let v = attachment_disposition("été \"x\".jpg");
        let s = v.to_str().unwrap();
        assert!(s.starts_with("attachment; filename=\"_t_ _x_.jpg\""));
        assert!(s.contains("filename*=UTF-8''%C3%A9t%C3%A9%20%22x%22.jpg"));
    }
}
