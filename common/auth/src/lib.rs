pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod manager;
pub mod store;

pub use claims::{TokenClaims, TokenType};
pub use config::{SigningConfig, SigningConfigError, TokenLifetimes, DEFAULT_ISSUER};
pub use error::{AuthError, AuthResult, TokenError, TokenResult};
pub use extractors::{parse_bearer, AuthContext};
pub use guards::{ensure_role, GuardError};
pub use manager::{TokenManager, TokenPair};
pub use store::{InMemoryTokenStore, RefreshRecord, RefreshTokenLedger, StoreError, TokenStore};
