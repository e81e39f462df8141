use crate::scope::ScopeKey;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Result type for authentication operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication error types
#[derive(Error, Debug)]
pub enum AuthError {
    /// Raised by an authenticator to reject a connection
    #[error("{0}")]
    PermissionDenied(String),

    /// Raised by an authenticator when no credentials were presented
    #[error("{0}")]
    NotAuthorized(String),

    /// A handler read a scope entry that no authenticator wrote
    #[error("'{0}' is not defined in scope, install an AuthMiddleware to set it")]
    ScopeNotPopulated(ScopeKey),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AuthError::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::ScopeNotPopulated(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error denies the connection, as opposed to a server fault
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            AuthError::PermissionDenied(_) | AuthError::NotAuthorized(_)
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "status_code": status.as_u16(),
            "detail": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AuthError::PermissionDenied("unauthenticated".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::NotAuthorized("missing".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::ScopeNotPopulated(ScopeKey::User).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_scope_error_display() {
        assert_eq!(
            AuthError::ScopeNotPopulated(ScopeKey::User).to_string(),
            "'user' is not defined in scope, install an AuthMiddleware to set it"
        );
        assert_eq!(
            AuthError::ScopeNotPopulated(ScopeKey::Auth).to_string(),
            "'auth' is not defined in scope, install an AuthMiddleware to set it"
        );
    }

    #[test]
    fn test_is_denial() {
        assert!(AuthError::PermissionDenied("no".to_string()).is_denial());
        assert!(AuthError::NotAuthorized("no".to_string()).is_denial());
        assert!(!AuthError::ScopeNotPopulated(ScopeKey::Auth).is_denial());
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = AuthError::ScopeNotPopulated(ScopeKey::Auth).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status_code"], 500);
        assert_eq!(
            json["detail"],
            "'auth' is not defined in scope, install an AuthMiddleware to set it"
        );
    }
}
