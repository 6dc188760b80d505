use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::Response;
use futures_util::Stream;
use nptr_store::ObjectKey;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use crate::error::{ServerError, ServerResult};
use crate::range::{parse_range, RangeSpec};
use crate::state::AppState;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "f";

const STREAM_CHUNK: usize = 64 * 1024;

/// `GET /`: one-line usage hint.
pub async fn index(State(state): State<Arc<AppState>>) -> String {
    state.usage_hint().to_string()
}

/// `GET /health`, `GET /status`.
pub async fn health() -> &'static str {
    "ok"
}

/// `POST /`: store the `f` part of a multipart form and answer with its URL.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ServerResult<String> {
    let limit = state.config.max_upload_size;
    if let Some(declared) = content_length(&headers) {
        if declared > state.body_limit() {
            return Err(ServerError::TooLarge { limit });
        }
    }

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "skipping form field");
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();

        let mut spooler = state
            .store
            .spool(state.namer.scheme().hash_algorithm(), limit)
            .await?;
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            spooler.write(&chunk).await?;
        }
        let spooled = spooler.finish().await?;

        let key = state.namer.name(spooled.digest(), &filename);
        let outcome = state.store.put(spooled, &key).await?;
        info!(
            key = %outcome.key,
            filename = %filename,
            size = outcome.size,
            created = outcome.created,
            "upload accepted"
        );
        return Ok(state.config.object_url(&outcome.key));
    }

    Err(ServerError::BadRequest(format!(
        "missing form field `{UPLOAD_FIELD}`"
    )))
}

/// `GET /{key}` and `HEAD /{key}`: stream an object, honouring one byte range.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(raw_key): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let key = ObjectKey::parse(&raw_key)?;
    let handle = state.store.get(&key).await?;
    let size = handle.size();
    let head_only = method == Method::HEAD;

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let builder = Response::builder()
        .header(header::CONTENT_TYPE, handle.content_type())
        .header(header::ACCEPT_RANGES, "bytes");

    let response = match parse_range(range, size) {
        RangeSpec::Unsatisfiable => return Err(ServerError::RangeNotSatisfiable { size }),
        RangeSpec::Full => {
            let body = if head_only {
                Body::empty()
            } else {
                Body::from_stream(chunks(handle.into_file()))
            };
            builder
                .status(StatusCode::OK)
                .header(header::CONTENT_LENGTH, size)
                .body(body)
        }
        RangeSpec::Partial(r) => {
            debug!(key = %key, start = r.start, end = r.end, "serving byte range");
            let body = if head_only {
                Body::empty()
            } else {
                Body::from_stream(chunks(handle.into_range(r.start, r.byte_count()).await?))
            };
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_LENGTH, r.byte_count())
                .header(header::CONTENT_RANGE, r.content_range(size))
                .body(body)
        }
    };
    response.map_err(|e| ServerError::Internal(e.to_string()))
}

fn chunks<R>(reader: R) -> impl Stream<Item = std::io::Result<Bytes>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async_stream::try_stream! {
        let mut reader = reader;
        let mut buf = vec![0u8; STREAM_CHUNK];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            yield Bytes::copy_from_slice(&buf[..n]);
        }
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn multipart_error(err: MultipartError, limit: u64) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::TooLarge { limit }
    } else {
        ServerError::BadRequest(err.body_text())
    }
}
