//! Authentication Error Types

use thiserror::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response, Json},
};
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Maximum number of auth attempts reached. Please try again later.")]
    RateLimited,

    #[error("Invalid Username or Password.")]
    InvalidCredentials,

    #[error("Account is disabled.")]
    AccountDisabled,

    #[error("Account is deleted.")]
    AccountDeleted,

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Duplicate entity: {entity_type} with {field}={value}")]
    Duplicate { entity_type: String, field: String, value: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Database error: {0}")]
    Database(mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AuthError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn duplicate(entity_type: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// HTTP status and stable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AuthError::AccountDisabled => (StatusCode::UNAUTHORIZED, "ACCOUNT_DISABLED"),
            AuthError::AccountDeleted => (StatusCode::BAD_REQUEST, "ACCOUNT_DELETED"),
            AuthError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AuthError::Unavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            AuthError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AuthError::Duplicate { .. } => (StatusCode::CONFLICT, "DUPLICATE"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Message safe to return to clients. Storage errors collapse to a
    /// generic message so connection details never reach the wire.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Database(_)
            | AuthError::Serialization(_)
            | AuthError::Deserialization(_)
            | AuthError::Configuration { .. }
            | AuthError::Internal { .. } => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// Storage timeouts are retryable by the caller and must not read as an
/// authentication decision, so they surface as Unavailable.
impl From<mongodb::error::Error> for AuthError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;
        match err.kind.as_ref() {
            ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => {
                AuthError::Unavailable { message: "datastore unreachable".to_string() }
            }
            _ => AuthError::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// Error response body
#[derive(Debug, serde::Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_code();

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_mapping() {
        let (status, code) = AuthError::RateLimited.status_and_code();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(code, "RATE_LIMITED");
    }

    #[test]
    fn test_invalid_credentials_message_is_uniform() {
        // Unknown identifier and wrong password must be indistinguishable.
        let err = AuthError::InvalidCredentials;
        assert_eq!(err.to_string(), "Invalid Username or Password.");
        assert_eq!(err.status_and_code().0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_account_state_mappings() {
        assert_eq!(AuthError::AccountDisabled.status_and_code().0, StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::AccountDeleted.status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_carries_message() {
        let err = AuthError::unauthorized("Expired Access Token");
        assert_eq!(err.to_string(), "Expired Access Token");
    }

    #[test]
    fn test_internal_errors_do_not_leak() {
        let err = AuthError::internal("connection string mongodb://secret@host");
        assert_eq!(err.public_message(), "An internal error occurred");
    }

    #[test]
    fn test_unavailable_mapping() {
        let err = AuthError::unavailable("timed out");
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "UNAVAILABLE");
    }
}
