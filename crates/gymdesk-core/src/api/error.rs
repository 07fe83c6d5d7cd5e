//! API error type and `{"error": {"code", "message"}}` body

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::notifications::NotificationError;
use crate::store::classes::BookingError;
use crate::team::InviteError;
use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// An upstream service (email, identity provider, LLM) failed
    #[error("upstream error: {0}")]
    BadGateway(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::BadGateway(_) => "bad_gateway",
        }
    }

    fn message(self) -> String {
        match self {
            Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::BadRequest(m)
            | Self::Internal(m)
            | Self::BadGateway(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message: self.message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::StaffOnly | AuthError::MemberOnly => Self::Forbidden(err.to_string()),
            AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::InvalidAudience
            | AuthError::InvalidSignature
            | AuthError::InvalidSubject
            | AuthError::InvalidToken(_) => Self::Unauthorized(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "Internal error");
        Self::Internal(err.to_string())
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::InvalidClassId => Self::BadRequest(err.to_string()),
            BookingError::NoMatchingClass | BookingError::ClassNotFound => {
                Self::NotFound(err.to_string())
            }
            BookingError::FullyBooked | BookingError::AlreadyBooked => {
                Self::Conflict(err.to_string())
            }
            BookingError::Database(e) => Self::from(e),
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::MissingFields(_) | NotificationError::MissingReplyText => {
                Self::BadRequest(err.to_string())
            }
            NotificationError::Disabled => Self::Internal(err.to_string()),
            NotificationError::Email(_) => Self::BadGateway(err.to_string()),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::EmptyMessage => Self::BadRequest(err.to_string()),
            WorkflowError::TicketNotFound => Self::NotFound(err.to_string()),
            WorkflowError::Internal(e) => Self::from(e),
        }
    }
}

impl From<InviteError> for ApiError {
    fn from(err: InviteError) -> Self {
        match err {
            InviteError::MissingFields | InviteError::InvalidRole => {
                Self::BadRequest(err.to_string())
            }
            InviteError::Disabled => Self::Internal(err.to_string()),
            InviteError::Identity(_) => Self::BadGateway(err.to_string()),
            InviteError::Internal(e) => Self::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            ApiError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("ticket").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::BadGateway("x".into()).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn auth_errors_map() {
        assert_eq!(ApiError::from(AuthError::StaffOnly).code(), "forbidden");
        assert_eq!(ApiError::from(AuthError::TokenExpired).code(), "unauthorized");
    }

    #[test]
    fn booking_errors_map() {
        assert_eq!(
            ApiError::from(BookingError::FullyBooked).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(BookingError::InvalidClassId).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn notification_validation_is_bad_request() {
        let err = ApiError::from(NotificationError::MissingFields(vec!["title"]));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Missing required fields: title");
    }

    #[tokio::test]
    async fn error_body_shape() {
        let response = ApiError::not_found("Ticket not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "not_found");
        assert_eq!(body["error"]["message"], "Ticket not found");
    }
}
