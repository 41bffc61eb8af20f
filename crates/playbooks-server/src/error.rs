use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use playbooks_core::PlaybookError;

// ---------------------------------------------------------------------------
// Sentinels for statuses that have no PlaybookError variant
// ---------------------------------------------------------------------------

/// Private sentinel carrying an explicit HTTP status through the
/// `anyhow::Error` chain without touching the `PlaybookError` enum.
#[derive(Debug)]
struct StatusError {
    status: StatusCode,
    message: String,
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StatusError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Every error renders as
/// `{"error": "<message>"}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(
            StatusError {
                status,
                message: msg.into(),
            }
            .into(),
        )
    }

    /// 400 Bad Request.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::status(StatusCode::BAD_REQUEST, msg)
    }

    /// 401 Unauthorized.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::status(StatusCode::UNAUTHORIZED, msg)
    }

    /// 403 Forbidden.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::status(StatusCode::FORBIDDEN, msg)
    }

    /// 404 Not Found.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::status(StatusCode::NOT_FOUND, msg)
    }

    /// 409 Conflict.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::status(StatusCode::CONFLICT, msg)
    }

    pub fn status_code(&self) -> StatusCode {
        if let Some(s) = self.0.downcast_ref::<StatusError>() {
            return s.status;
        }
        match self.0.downcast_ref::<PlaybookError>() {
            Some(e) => match e {
                PlaybookError::PlaybookNotFound(_)
                | PlaybookError::PersonaNotFound(_)
                | PlaybookError::SkillNotFound(_)
                | PlaybookError::McpServerNotFound(_)
                | PlaybookError::CanvasNotFound(_)
                | PlaybookError::SectionNotFound(_)
                | PlaybookError::MemoryNotFound(_)
                | PlaybookError::ApiKeyNotFound(_) => StatusCode::NOT_FOUND,
                PlaybookError::PlaybookExists(_) | PlaybookError::CanvasExists(_) => {
                    StatusCode::CONFLICT
                }
                PlaybookError::MissingField(_)
                | PlaybookError::InvalidSlug(_)
                | PlaybookError::InvalidMemoryKey(_)
                | PlaybookError::InvalidPermission(_)
                | PlaybookError::InvalidSchema(_)
                | PlaybookError::InvalidTtl(_) => StatusCode::BAD_REQUEST,
                PlaybookError::InvalidCredentials | PlaybookError::CredentialsExpired => {
                    StatusCode::UNAUTHORIZED
                }
                PlaybookError::Database(_)
                | PlaybookError::Io(_)
                | PlaybookError::Yaml(_)
                | PlaybookError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
