use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ErrorBody;
use crate::services::{
    AuthError, RequestError, StatsError, TemplateError, TokenError, UploadError, UserAdminError,
};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    ExternalApiError { service: String, message: String },

    ValidationError(String),

    Conflict(String),

    InternalError(String),

    Unauthorized(String),

    Forbidden(String),

    PayloadTooLarge(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::ExternalApiError { service, message } => write!(f, "{service} error: {message}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::Conflict(msg) => write!(f, "Conflict: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
            Self::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            Self::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            Self::PayloadTooLarge(msg) => write!(f, "Payload too large: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::DatabaseError(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            Self::ExternalApiError { service, message } => {
                tracing::warn!(service = %service, error = %message, "External service error");
                (
                    StatusCode::BAD_GATEWAY,
                    format!("{service} service is unavailable"),
                )
            }
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
        };

        (status, Json(ErrorBody::new(error_message))).into_response()
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(format!("{err:#}"))
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Unauthenticated => Self::unauthorized("Missing token"),
            TokenError::InvalidToken => Self::unauthorized("Invalid token"),
            TokenError::Signing(msg) => Self::internal(msg),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Empty | UploadError::UnsupportedType(_) => Self::validation(err.to_string()),
            UploadError::TooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            UploadError::Io(_) => Self::internal(err.to_string()),
            UploadError::Transport(_) | UploadError::Rejected(_) => Self::ExternalApiError {
                service: "Object storage".to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::unauthorized(err.to_string()),
            AuthError::EmailTaken => Self::Conflict(err.to_string()),
            AuthError::Forbidden(msg) => Self::Forbidden(msg),
            AuthError::UserNotFound => Self::NotFound(err.to_string()),
            AuthError::InvalidResetToken => Self::validation(err.to_string()),
            AuthError::Validation(msg) => Self::ValidationError(msg),
            AuthError::Token(e) => e.into(),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<TemplateError> for ApiError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound => Self::NotFound(err.to_string()),
            TemplateError::InUse(_) => Self::validation(err.to_string()),
            TemplateError::Validation(msg) => Self::ValidationError(msg),
            TemplateError::Upload(e) => e.into(),
            TemplateError::Database(msg) => Self::DatabaseError(msg),
            TemplateError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::NotFound | RequestError::TemplateNotFound | RequestError::FileNotFound => {
                Self::NotFound(err.to_string())
            }
            RequestError::FileMismatch
            | RequestError::TransitionNotAllowed { .. } => Self::validation(err.to_string()),
            RequestError::Forbidden => Self::forbidden(err.to_string()),
            RequestError::Validation(msg) => Self::ValidationError(msg),
            RequestError::Upload(e) => e.into(),
            RequestError::Database(msg) => Self::DatabaseError(msg),
            RequestError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<UserAdminError> for ApiError {
    fn from(err: UserAdminError) -> Self {
        match err {
            UserAdminError::NotFound => Self::NotFound(err.to_string()),
            UserAdminError::SelfAction(msg) | UserAdminError::Validation(msg) => {
                Self::ValidationError(msg)
            }
            UserAdminError::HasRequests(_) | UserAdminError::EmailTaken => {
                Self::Conflict(err.to_string())
            }
            UserAdminError::Database(msg) => Self::DatabaseError(msg),
            UserAdminError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::Database(msg) => Self::DatabaseError(msg),
            StatsError::Internal(msg) => Self::InternalError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_status_codes() {
        let status = |err: ApiError| err.into_response().status();

        assert_eq!(status(TemplateError::InUse(1).into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(RequestError::Forbidden.into()), StatusCode::FORBIDDEN);
        assert_eq!(status(RequestError::FileMismatch.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::EmailTaken.into()), StatusCode::CONFLICT);
        assert_eq!(
            status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(UserAdminError::HasRequests(2).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(UploadError::TooLarge { limit: 10 }.into()),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status(StatsError::Database("boom".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
