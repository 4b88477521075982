use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TokenError, TokenResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified contents of an access or refresh token.
///
/// Refresh tokens carry an empty `username` and `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenClaims {
    pub user_id: u64,
    pub username: String,
    pub role: String,
    pub token_type: TokenType,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub issuer: String,
    /// Unique per token (`jti`), so two pairs issued in the same second still differ.
    pub token_id: Uuid,
}

impl TokenClaims {
    pub fn is_access(&self) -> bool {
        self.token_type == TokenType::Access
    }

    pub fn is_refresh(&self) -> bool {
        self.token_type == TokenType::Refresh
    }
}

/// Wire layout of the signed payload.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClaimsRepr {
    pub(crate) user_id: u64,
    #[serde(default)]
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) role: String,
    pub(crate) token_type: TokenType,
    pub(crate) exp: i64,
    pub(crate) iat: i64,
    pub(crate) iss: String,
    pub(crate) jti: Uuid,
}

impl From<&TokenClaims> for ClaimsRepr {
    fn from(value: &TokenClaims) -> Self {
        Self {
            user_id: value.user_id,
            username: value.username.clone(),
            role: value.role.clone(),
            token_type: value.token_type,
            exp: value.expires_at.timestamp(),
            iat: value.issued_at.timestamp(),
            iss: value.issuer.clone(),
            jti: value.token_id,
        }
    }
}

impl TryFrom<ClaimsRepr> for TokenClaims {
    type Error = TokenError;

    fn try_from(value: ClaimsRepr) -> TokenResult<Self> {
        let expires_at = timestamp("exp", value.exp)?;
        let issued_at = timestamp("iat", value.iat)?;
        if expires_at <= issued_at {
            return Err(TokenError::Other(format!(
                "exp ({}) must be after iat ({})",
                value.exp, value.iat
            )));
        }

        Ok(Self {
            user_id: value.user_id,
            username: value.username,
            role: value.role,
            token_type: value.token_type,
            issued_at,
            expires_at,
            issuer: value.iss,
            token_id: value.jti,
        })
    }
}

fn timestamp(claim: &'static str, seconds: i64) -> TokenResult<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| TokenError::Other(format!("invalid {claim} timestamp {seconds}")))
}
