use axum::http::StatusCode;

use crate::AuthContext;

#[derive(Debug, Clone)]
pub enum GuardError {
    Forbidden { required: Vec<String> },
}

impl GuardError {
    pub fn into_response(self) -> (StatusCode, String) {
        match self {
            GuardError::Forbidden { required } => (
                StatusCode::FORBIDDEN,
                if required.is_empty() {
                    "Insufficient role".to_string()
                } else {
                    format!(
                        "Insufficient role. Required one of: {}",
                        required.join(", ")
                    )
                },
            ),
        }
    }
}

impl From<GuardError> for (StatusCode, String) {
    fn from(value: GuardError) -> Self {
        value.into_response()
    }
}

pub fn ensure_role(auth: &AuthContext, allowed: &[&str]) -> Result<(), GuardError> {
    if allowed.is_empty() || allowed.iter().any(|required| auth.has_role(required)) {
        return Ok(());
    }

    Err(GuardError::Forbidden {
        required: allowed.iter().map(|value| value.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{TokenClaims, TokenType};
    use chrono::{Duration, Utc};

    fn context(role: &str) -> AuthContext {
        let now = Utc::now();
        AuthContext {
            claims: TokenClaims {
                user_id: 1,
                username: "alice".into(),
                role: role.into(),
                token_type: TokenType::Access,
                issued_at: now,
                expires_at: now + Duration::hours(2),
                issuer: "fastgo".into(),
                token_id: uuid::Uuid::new_v4(),
            },
            token: "token".into(),
        }
    }

    #[test]
    fn matching_role_passes() {
        assert!(ensure_role(&context("admin"), &["manager", "admin"]).is_ok());
        assert!(ensure_role(&context("cashier"), &[]).is_ok());
    }

    #[test]
    fn missing_role_is_forbidden() {
        let err = ensure_role(&context("cashier"), &["admin"]).unwrap_err();
        let (status, message) = err.into_response();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(message, "Insufficient role. Required one of: admin");
    }
}
