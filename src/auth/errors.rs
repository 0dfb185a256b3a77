//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::jwt::JwtError;

/// Failure of a single authentication/authorization attempt.
#[derive(Debug)]
pub enum AuthError {
    /// No bearer token on the request
    NotAuthenticated,
    /// The token failed verification
    Token(JwtError),
    /// The token's subject no longer resolves to a user
    PrincipalNotFound,
    /// Valid user without the permissions the operation requires
    InsufficientPermissions,
    /// The user directory could not be queried
    Directory,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotAuthenticated | AuthError::PrincipalNotFound => StatusCode::UNAUTHORIZED,
            AuthError::Token(JwtError::Creation(_)) | AuthError::Directory => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AuthError::Token(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::Token(e)
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NotAuthenticated => write!(f, "Not authenticated"),
            AuthError::Token(e) => write!(f, "{}", e),
            AuthError::PrincipalNotFound => write!(f, "User not found"),
            AuthError::InsufficientPermissions => {
                write!(f, "User doesn't have necessary permissions")
            }
            AuthError::Directory => write!(f, "Database error"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Token(e) => Some(e),
            _ => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::NotAuthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Token(JwtError::Expired).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::PrincipalNotFound.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InsufficientPermissions.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::Directory.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_message_passes_through() {
        let err = AuthError::from(JwtError::Expired);
        assert_eq!(err.to_string(), "Authentication Error: Token is expired");
    }
}
