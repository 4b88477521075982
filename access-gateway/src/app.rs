use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::FromRef;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use common_auth::{InMemoryTokenStore, RefreshTokenLedger, TokenManager};
use common_cors::{cors_middleware, CorsPolicy};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::session_handlers::{
    current_user, health, logout_session, refresh_session, revoke_user_session,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub token_manager: Arc<TokenManager>,
    pub refresh_ledger: Arc<RefreshTokenLedger<InMemoryTokenStore>>,
    pub cors: Arc<CorsPolicy>,
}

impl AppState {
    pub fn new(token_manager: TokenManager, cors: CorsPolicy) -> Self {
        Self {
            token_manager: Arc::new(token_manager),
            refresh_ledger: Arc::new(RefreshTokenLedger::new(InMemoryTokenStore::new())),
            cors: Arc::new(cors),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let cors = config.cors.to_policy()?;
        Ok(Self::new(TokenManager::new(config.signing.clone()), cors))
    }
}

impl FromRef<AppState> for Arc<TokenManager> {
    fn from_ref(state: &AppState) -> Self {
        state.token_manager.clone()
    }
}

impl FromRef<AppState> for Arc<CorsPolicy> {
    fn from_ref(state: &AppState) -> Self {
        state.cors.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = state.cors.clone();
    Router::new()
        .route("/healthz", get(health))
        .route("/me", get(current_user))
        .route("/session/refresh", post(refresh_session))
        .route("/session/logout", post(logout_session))
        .route("/users/:user_id/session/revoke", post(revoke_user_session))
        .with_state(state)
        .layer(from_fn_with_state(cors, cors_middleware))
}

/// Periodically drops expired ledger entries, revocation records included.
pub fn spawn_token_sweeper(
    ledger: Arc<RefreshTokenLedger<InMemoryTokenStore>>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match ledger.store().purge_expired() {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "purged expired refresh tokens"),
                Err(err) => warn!(error = ?err, "Failed to purge token store"),
            }
        }
    })
}
