use axum::{Json, http::StatusCode, response::IntoResponse};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    dto::validation::flatten_validation_errors,
    services::token_service::TokenError,
    state::draft::DraftError,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Request body failed field validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Monitor token rejected.
    #[error("token error: {0}")]
    Token(TokenError),
    /// Unexpected failure; detail stays in the logs.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(message) => ServiceError::Internal(message),
            rejected => ServiceError::Token(rejected),
        }
    }
}

impl From<DraftError> for ServiceError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::InvalidRows(inner) => ServiceError::InvalidInput(inner.to_string()),
            other => ServiceError::InvalidState(other.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::Validation(flatten_validation_errors(&err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Field-level validation failures keyed by field path.
    #[error("validation failed")]
    Validation(IndexMap<String, Vec<String>>),
    /// Missing or rejected credentials.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Machine-readable code.
        code: Option<&'static str>,
        /// Human readable reason.
        message: String,
    },
    /// Valid credentials that do not cover the requested resource.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Machine-readable code.
        code: Option<&'static str>,
        /// Human readable reason.
        message: String,
    },
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 401 with `message`.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            code: None,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Validation(errors) => errors.into(),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Token(token) if token.is_forbidden() => AppError::Forbidden {
                code: Some(token.code()),
                message: token.to_string(),
            },
            ServiceError::Token(token) => AppError::Unauthorized {
                code: Some(token.code()),
                message: token.to_string(),
            },
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// JSON body returned for every error response.
pub struct ErrorBody {
    /// Human readable reason.
    pub message: String,
    /// Machine-readable error code, e.g. `EXPIRED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Field path to validation messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub fields: Option<IndexMap<String, Vec<String>>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match self {
            AppError::Validation(fields) => ErrorBody {
                message: "validation failed".into(),
                code: None,
                fields: Some(fields),
            },
            AppError::Unauthorized { code, message } | AppError::Forbidden { code, message } => {
                ErrorBody {
                    message,
                    code: code.map(str::to_string),
                    fields: None,
                }
            }
            AppError::Internal(detail) => {
                error!(error = %detail, "request failed with an internal error");
                ErrorBody {
                    message: "internal server error".into(),
                    code: None,
                    fields: None,
                }
            }
            other => ErrorBody {
                message: other.to_string(),
                code: None,
                fields: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_failures_are_internal_errors() {
        let err = ServiceError::from(TokenError::Signing("key rejected".into()));
        assert!(matches!(err, ServiceError::Internal(_)));

        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn token_rejections_carry_their_code() {
        let AppError::Unauthorized { code, .. } = AppError::from(ServiceError::from(TokenError::Expired))
        else {
            panic!("expired tokens are unauthorized");
        };
        assert_eq!(code, Some("EXPIRED"));

        let response =
            AppError::from(ServiceError::from(TokenError::ScopeMismatch("match"))).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
