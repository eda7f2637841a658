use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// ApiError
///
/// The complete error taxonomy surfaced by the API. Every operation maps its
/// failures into one of these variants at the handler boundary; lower-level
/// errors (store drivers, decode failures, the S3 client) are never passed
/// through uninterpreted.
///
/// Each variant renders as `{"success": false, "message": "..."}` with the
/// status code chosen in `status()`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed required input (fields, email format, password length).
    #[error("{0}")]
    Validation(String),
    /// No, invalid, or expired session token on an operation requiring one.
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated but lacking the required ownership/role relationship.
    #[error("{0}")]
    Forbidden(String),
    /// Referenced entity id does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Uniqueness violation on register/subscribe.
    #[error("{0}")]
    Duplicate(String),
    /// Moderation attempted on a post that is not in the pending state.
    #[error("{0}")]
    InvalidState(String),
    /// Media store failure. Fatal to the enclosing create/update.
    #[error("{0}")]
    Upload(String),
    /// Any unexpected failure. The internal detail is logged, never returned.
    #[error("Server error")]
    Server,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Duplicate(_) | ApiError::InvalidState(_) => StatusCode::CONFLICT,
            ApiError::Upload(_) => StatusCode::BAD_GATEWAY,
            ApiError::Server => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for the generic denial used whenever a session token is
    /// missing or unusable. Clients are expected to redirect to sign-in.
    pub fn unauthorized() -> Self {
        ApiError::Unauthorized("Unauthorized. Please login.".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::Server) {
            tracing::error!("request failed with an internal error");
        }
        let body = Json(serde_json::json!({
            "success": false,
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}
