pub mod app;
pub mod config;
pub mod session_handlers;

pub use app::{build_router, spawn_token_sweeper, AppState};
pub use config::{load_gateway_config, CorsSettings, GatewayConfig};
pub use session_handlers::{issue_session, SessionResponse};
