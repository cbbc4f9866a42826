//! Server and HTTP error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jamoveo_auth::AuthError;
use jamoveo_catalog::CatalogError;
use jamoveo_core::SongId;
use jamoveo_core::frame::ErrorFrame;
use tracing::warn;

/// Failures starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Other socket-level error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The Prometheus recorder could not be installed.
    #[error("metrics recorder: {0}")]
    Metrics(String),

    /// Credential verification could not be set up.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Errors returned by HTTP handlers, rendered as `{"error", "code"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or rejected credential.
    #[error("{0}")]
    Unauthorized(#[from] AuthError),

    /// No song with this id.
    #[error("song {0} not found")]
    SongNotFound(SongId),

    /// The catalog backend failed.
    #[error("catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),

    /// The session service refused or is gone.
    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::SongNotFound(_) => StatusCode::NOT_FOUND,
            Self::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable error code in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::SongNotFound(_) => "SONG_NOT_FOUND",
            Self::Catalog(_) => "CATALOG_ERROR",
            Self::Unavailable(_) => "UNAVAILABLE",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = ErrorFrame {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_and_codes() {
        let err = ApiError::from(AuthError::Expired);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "UNAUTHORIZED");
        assert_eq!(err.to_string(), "token expired");

        let err = ApiError::SongNotFound(SongId::from_raw("s9"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "song s9 not found");

        let err = ApiError::Unavailable("full".into());
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn body_is_error_frame() {
        let resp = ApiError::from(AuthError::MissingToken).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["code"], "UNAUTHORIZED");
        assert_eq!(parsed["error"], "missing bearer token");
    }

    #[test]
    fn bind_error_names_address() {
        let err = ServerError::Bind {
            addr: "1.2.3.4:80".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(err.to_string().contains("1.2.3.4:80"));
    }
}
