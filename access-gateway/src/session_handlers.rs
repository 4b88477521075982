use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use common_auth::{
    ensure_role, AuthContext, AuthError, AuthResult, RefreshRecord, TokenClaims, TokenType,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::app::AppState;

pub const ADMIN_ROLES: &[&str] = &["admin", "super_admin"];

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
    pub token_type: &'static str,
    pub access_token_expires_at: String,
    pub refresh_token_expires_at: String,
}

pub async fn health() -> &'static str {
    "ok"
}

fn sign_session(
    state: &AppState,
    user_id: u64,
    username: &str,
    role: &str,
) -> AuthResult<(SessionResponse, RefreshRecord)> {
    let now = Utc::now();
    let pair = state
        .token_manager
        .issue_token_pair(user_id, username, role, now)
        .map_err(|err| {
            error!(user_id, error = ?err, "Failed to issue tokens");
            err
        })?;

    let record = RefreshRecord {
        token: pair.refresh_token.clone(),
        username: username.to_string(),
        role: role.to_string(),
    };
    let session = SessionResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: (pair.access_expires_at - now).num_seconds(),
        refresh_expires_in: (pair.refresh_expires_at - now).num_seconds(),
        token_type: "Bearer",
        access_token_expires_at: pair
            .access_expires_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        refresh_token_expires_at: pair
            .refresh_expires_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    Ok((session, record))
}

fn refresh_ttl(state: &AppState) -> Duration {
    state
        .token_manager
        .lifetimes()
        .refresh
        .to_std()
        .unwrap_or_default()
}

/// Signs a new pair for the user and makes its refresh token the only one the ledger accepts.
///
/// Credential checks happen before this is called; the gateway does no password handling.
pub async fn issue_session(
    state: &AppState,
    user_id: u64,
    username: &str,
    role: &str,
) -> AuthResult<SessionResponse> {
    let (session, record) = sign_session(state, user_id, username, role)?;
    state
        .refresh_ledger
        .record(user_id, &record, refresh_ttl(state))
        .await
        .map_err(|err| {
            error!(user_id, error = ?err, "Failed to record refresh token");
            err
        })?;

    info!(user_id, "session issued");
    Ok(session)
}

pub async fn refresh_session(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    let claims = state.token_manager.parse_expecting(
        &request.refresh_token,
        TokenType::Refresh,
        Utc::now(),
    )?;
    let user_id = claims.user_id;

    let current = state
        .refresh_ledger
        .current(user_id, &request.refresh_token)
        .await?
        .ok_or_else(|| {
            debug!(user_id, "refresh token is not current");
            AuthError::RefreshTokenRevoked
        })?;

    let (session, next) = sign_session(&state, user_id, &current.username, &current.role)?;
    let rotated = state
        .refresh_ledger
        .rotate(user_id, &request.refresh_token, &next, refresh_ttl(&state))
        .await?;
    if !rotated {
        debug!(user_id, "refresh token was rotated concurrently");
        return Err(AuthError::RefreshTokenRevoked);
    }

    info!(user_id, "session refreshed");
    Ok(Json(session))
}

pub async fn logout_session(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<StatusCode, AuthError> {
    state
        .refresh_ledger
        .revoke(auth.user_id(), refresh_ttl(&state))
        .await?;
    info!(user_id = auth.user_id(), "session revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// Ends another user's session; admins only.
pub async fn revoke_user_session(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<u64>,
) -> Result<StatusCode, (StatusCode, String)> {
    ensure_role(&auth, ADMIN_ROLES)?;
    state
        .refresh_ledger
        .revoke(user_id, refresh_ttl(&state))
        .await
        .map_err(|err| {
            error!(user_id, error = ?err, "Failed to revoke refresh token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unable to revoke session.".to_string(),
            )
        })?;
    info!(user_id, revoked_by = auth.user_id(), "session revoked by admin");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn current_user(auth: AuthContext) -> Json<TokenClaims> {
    Json(auth.into_claims())
}
