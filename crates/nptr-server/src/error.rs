use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use nptr_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("requested range not satisfiable for a {size} byte object")]
    RangeNotSatisfiable { size: u64 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::TooLarge { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::Store(e) if !e.is_client_error() => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(StoreError::TooLarge { .. }) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::NOT_FOUND,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text sent to the client. Server-side failures stay generic.
    fn client_message(&self) -> String {
        match self {
            Self::Store(StoreError::NotFound(_)) | Self::Store(StoreError::InvalidKey { .. }) => {
                "not found".into()
            }
            _ if self.status().is_server_error() => "internal server error".into(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else if matches!(self, Self::TooLarge { .. } | Self::Store(StoreError::TooLarge { .. })) {
            tracing::warn!(error = %self, "upload rejected");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        let mut response = (status, self.client_message()).into_response();
        if let Self::RangeNotSatisfiable { size } = self {
            if let Ok(value) = format!("bytes */{size}").parse() {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(ServerError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ServerError::TooLarge { limit: 1 }.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServerError::from(StoreError::TooLarge { limit: 1 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::from(StoreError::NotFound("k".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::from(StoreError::InvalidKey { key: "..".into(), reason: "leading dot" })
                .status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn storage_failures_map_to_500() {
        let err = ServerError::from(StoreError::Io(std::io::Error::other("disk full")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "internal server error");
        let err = ServerError::from(StoreError::MissingRoot("/gone".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_status_follows_client_classification() {
        let errors = [
            StoreError::NotFound("k".into()),
            StoreError::InvalidKey { key: "..".into(), reason: "leading dot" },
            StoreError::TooLarge { limit: 1 },
            StoreError::MissingRoot("/gone".into()),
            StoreError::Io(std::io::Error::other("disk full")),
        ];
        for e in errors {
            let client = e.is_client_error();
            let status = ServerError::from(e).status();
            assert_eq!(status.is_client_error(), client, "{status}");
        }
    }

    #[test]
    fn range_error_carries_content_range() {
        let response = ServerError::RangeNotSatisfiable { size: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */42");
    }
}
