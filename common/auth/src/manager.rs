use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::claims::{ClaimsRepr, TokenClaims, TokenType};
use crate::config::{SigningConfig, TokenLifetimes};
use crate::error::{AuthError, AuthResult, TokenError, TokenResult};

/// Access and refresh token issued together for one user.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Issues and parses HMAC-signed tokens.
///
/// Holds no mutable state; share one instance behind an `Arc`.
#[derive(Clone)]
pub struct TokenManager {
    config: SigningConfig,
    lifetimes: TokenLifetimes,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenManager {
    pub fn new(config: SigningConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret());
        let decoding_key = DecodingKey::from_secret(config.secret());

        let mut validation = Validation::new(config.algorithm());
        // Expiry is compared against the caller-supplied clock in `parse`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[config.issuer()]);

        Self {
            config,
            lifetimes: TokenLifetimes::default(),
            encoding_key,
            decoding_key,
            validation,
        }
    }

    pub fn with_lifetimes(mut self, lifetimes: TokenLifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Signs a fresh access/refresh pair. Either signature failing aborts the whole pair.
    pub fn issue_token_pair(
        &self,
        user_id: u64,
        username: &str,
        role: &str,
        now: DateTime<Utc>,
    ) -> TokenResult<TokenPair> {
        let access = TokenClaims {
            user_id,
            username: username.to_string(),
            role: role.to_string(),
            token_type: TokenType::Access,
            issued_at: now,
            expires_at: now + self.lifetimes.access,
            issuer: self.config.issuer().to_string(),
            token_id: Uuid::new_v4(),
        };
        let refresh = TokenClaims {
            user_id,
            username: String::new(),
            role: String::new(),
            token_type: TokenType::Refresh,
            issued_at: now,
            expires_at: now + self.lifetimes.refresh,
            issuer: self.config.issuer().to_string(),
            token_id: Uuid::new_v4(),
        };

        let access_token = self.sign(&access)?;
        let refresh_token = self.sign(&refresh)?;
        debug!(user_id, "issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }

    fn sign(&self, claims: &TokenClaims) -> TokenResult<String> {
        let header = Header::new(self.config.algorithm());
        encode(&header, &ClaimsRepr::from(claims), &self.encoding_key)
            .map_err(|err| TokenError::SigningFailed(err.to_string()))
    }

    /// Verifies signature, issuer and expiry (`expires_at > now`).
    ///
    /// A changed byte in the payload or signature segment yields
    /// [`TokenError::SignatureInvalid`]. The header segment is decoded before the
    /// signature is checked, so a changed header byte yields [`TokenError::Malformed`].
    ///
    /// The token type is reported, not enforced; see [`TokenManager::parse_expecting`].
    pub fn parse(&self, token: &str, now: DateTime<Utc>) -> TokenResult<TokenClaims> {
        let data = decode::<ClaimsRepr>(token, &self.decoding_key, &self.validation)?;
        let claims = TokenClaims::try_from(data.claims)?;
        if claims.expires_at <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    pub fn parse_expecting(
        &self,
        token: &str,
        expected: TokenType,
        now: DateTime<Utc>,
    ) -> AuthResult<TokenClaims> {
        let claims = self.parse(token, now)?;
        if claims.token_type != expected {
            return Err(AuthError::WrongTokenType {
                expected,
                actual: claims.token_type,
            });
        }
        Ok(claims)
    }
}
