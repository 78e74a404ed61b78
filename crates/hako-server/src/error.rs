//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hako_kernel::VfsError;
use thiserror::Error;

/// Errors a handler can answer with. The body is always `error: <message>`,
/// which clients match on.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", .0.client_message())]
    Vfs(#[from] VfsError),

    #[error("malformed request")]
    MalformedRequest,

    #[error("malformed upload: {0}")]
    MalformedUpload(String),

    #[error("missing upload destination header")]
    MissingDestination,

    #[error("not found")]
    NotMounted,

    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Vfs(err) => vfs_status(err),
            ApiError::MalformedRequest
            | ApiError::MalformedUpload(_)
            | ApiError::MissingDestination => StatusCode::BAD_REQUEST,
            ApiError::NotMounted => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

/// HTTP status for a kernel error.
pub fn vfs_status(err: &VfsError) -> StatusCode {
    match err {
        VfsError::InvalidPath(_)
        | VfsError::UnknownCommand(_)
        | VfsError::ArityMismatch { .. } => StatusCode::BAD_REQUEST,
        VfsError::ReadOnly => StatusCode::FORBIDDEN,
        VfsError::NotFound(_) | VfsError::SymlinkBlocked(_) => StatusCode::NOT_FOUND,
        VfsError::NotADirectory(_) | VfsError::IsADirectory(_) => StatusCode::CONFLICT,
        VfsError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), format!("error: {self}")).into_response()
    }
}
