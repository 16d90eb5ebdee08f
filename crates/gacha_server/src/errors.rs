//! Transport and startup errors.
//!
//! [`ApiError`] renders as `{ "code": <int>, "message": <string> }` with the
//! HTTP status equal to `code`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::path::PathBuf;
use thiserror::Error;

use gacha_chain::ChainError;
use gacha_economy::{CatalogError, DrawError, ErrorCode, StoreError};

use crate::api::ErrorBody;

/// Request failures.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Rejected or failed by the draw engine.
    #[error(transparent)]
    Draw(#[from] DrawError),

    /// Request body could not be decoded.
    #[error("invalid argument: {0}")]
    InvalidBody(String),

    /// The blocking task running the engine panicked or was cancelled.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl ApiError {
    /// Code reported to the caller.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Draw(e) => e.code(),
            Self::InvalidBody(_) => ErrorCode::InvalidArgument,
            Self::Worker(_) => ErrorCode::StoreError,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code().as_u16();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Failures while loading config or assembling the engine.
#[derive(Error, Debug)]
pub enum StartupError {
    /// A file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// Config syntax error or unknown key.
    #[error("config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config value rejected.
    #[error("config: {0}")]
    Config(String),

    /// Catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Ownership Store could not be opened.
    #[error("ownership store: {0}")]
    Store(#[from] StoreError),

    /// Chain ledger could not be set up.
    #[error("chain ledger: {0}")]
    Chain(#[from] ChainError),

    /// Listener or runtime failure.
    #[error("server: {0}")]
    Serve(#[source] std::io::Error),
}
