use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts};
use chrono::Utc;

use crate::claims::{TokenClaims, TokenType};
use crate::error::{AuthError, AuthResult};
use crate::manager::TokenManager;

/// Verified access-token claims for the current request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: TokenClaims,
    pub token: String,
}

impl AuthContext {
    pub fn user_id(&self) -> u64 {
        self.claims.user_id
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.claims.role == role
    }

    pub fn into_claims(self) -> TokenClaims {
        self.claims
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<TokenManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let manager = Arc::<TokenManager>::from_ref(state);

        let header_value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = parse_bearer(header_value)?;
        let claims = manager.parse_expecting(&token, TokenType::Access, Utc::now())?;

        Ok(Self { claims, token })
    }
}

/// Extracts the token from `Authorization: Bearer <token>`; the scheme is matched case-insensitively.
pub fn parse_bearer(value: &axum::http::HeaderValue) -> AuthResult<String> {
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?
        .trim();

    let (scheme, token) = raw
        .split_once(' ')
        .ok_or(AuthError::InvalidAuthorization)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(AuthError::InvalidAuthorization);
    }

    Ok(token.to_owned())
}
