use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;
use thiserror::Error;

use crate::claims::TokenType;
use crate::store::StoreError;

pub type TokenResult<T> = Result<T, TokenError>;
pub type AuthResult<T> = Result<T, AuthError>;

/// Failures from issuing or parsing a signed token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token signature mismatch")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Other(String),
    #[error("failed to sign token: {0}")]
    SigningFailed(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        match value.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => Self::Malformed(value.to_string()),
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Other(value.to_string()),
        }
    }
}

/// Request-level authentication failures surfaced by extractors and handlers.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("expected {expected} token, got {actual} token")]
    WrongTokenType { expected: TokenType, actual: TokenType },
    #[error("refresh token is no longer current")]
    RefreshTokenRevoked,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl AuthError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => {
                (StatusCode::UNAUTHORIZED, "AUTH_HEADER")
            }
            AuthError::Token(TokenError::Expired) => (StatusCode::UNAUTHORIZED, "AUTH_EXPIRED"),
            AuthError::Token(TokenError::SigningFailed(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_SIGNING")
            }
            AuthError::Token(_) => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN"),
            AuthError::WrongTokenType { .. } => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN_TYPE"),
            AuthError::RefreshTokenRevoked => (StatusCode::UNAUTHORIZED, "AUTH_REVOKED"),
            AuthError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_STORE"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
