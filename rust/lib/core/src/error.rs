use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Machine-readable error codes. Clients branch on these, never on the
/// message text.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const DUPLICATE_SUBMISSION: &str = "DUPLICATE_SUBMISSION";
    pub const ALLOCATION_CONFLICT: &str = "ALLOCATION_CONFLICT";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

/// Error type shared by every module and the server.
///
/// Serialized as `{"code": "...", "message": "..."}` with the status from
/// [`ServiceError::status_code`].
#[derive(Error, Debug)]
pub enum ServiceError {
    /// HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// The submitted form is wrong and the user can fix it. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Looks like an accidental resend of the last committed test. HTTP 409;
    /// the client confirms and resubmits.
    #[error("{0}")]
    DuplicateSubmission(String),

    /// Another writer held the database lock or took the same serial.
    /// Retried internally. HTTP 503 if it ever escapes.
    #[error("{0}")]
    AllocationConflict(String),

    /// Database or photo store failed. HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// HTTP 500.
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
}

impl ServiceError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, error_code::NOT_FOUND),
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, error_code::VALIDATION_FAILED),
            ServiceError::DuplicateSubmission(_) => {
                (StatusCode::CONFLICT, error_code::DUPLICATE_SUBMISSION)
            }
            ServiceError::AllocationConflict(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, error_code::ALLOCATION_CONFLICT)
            }
            ServiceError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, error_code::STORAGE_ERROR),
            ServiceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, error_code::INTERNAL),
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.parts().1
    }

    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    /// Whether repeating the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::AllocationConflict(_))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = self.to_string();
        let body = ErrorBody {
            code,
            message: &message,
        };
        (status, axum::Json(body)).into_response()
    }
}
