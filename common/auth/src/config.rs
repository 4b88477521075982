use std::fmt;

use chrono::Duration;
use jsonwebtoken::Algorithm;
use thiserror::Error;

pub const DEFAULT_ISSUER: &str = "fastgo";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningConfigError {
    #[error("signing secret must not be empty")]
    EmptySecret,
    #[error("algorithm {0:?} is not an HMAC algorithm")]
    UnsupportedAlgorithm(Algorithm),
}

/// Symmetric signing material shared read-only by every issuance and parse call.
#[derive(Clone)]
pub struct SigningConfig {
    secret: Vec<u8>,
    algorithm: Algorithm,
    issuer: String,
}

impl SigningConfig {
    pub fn new(secret: impl Into<Vec<u8>>, algorithm: Algorithm) -> Result<Self, SigningConfigError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(SigningConfigError::EmptySecret);
        }
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(SigningConfigError::UnsupportedAlgorithm(algorithm));
        }

        Ok(Self {
            secret,
            algorithm,
            issuer: DEFAULT_ISSUER.to_string(),
        })
    }

    pub fn hs256(secret: impl Into<Vec<u8>>) -> Result<Self, SigningConfigError> {
        Self::new(secret, Algorithm::HS256)
    }

    /// Override the `iss` claim written on issuance and required on parse.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Validity windows for issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::hours(2),
            refresh: Duration::days(7),
        }
    }
}
