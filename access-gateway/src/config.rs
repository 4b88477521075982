use std::env;
use std::net::{IpAddr, SocketAddr};

use anyhow::{anyhow, Context, Result};
use common_auth::SigningConfig;
use common_cors::CorsPolicy;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    pub signing: SigningConfig,
    pub cors: CorsSettings,
}

/// Raw CORS settings as read from the environment; unset entries keep the builder defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsSettings {
    pub allow_origins: Vec<String>,
    pub allow_origin_patterns: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
    pub allow_private_network: bool,
    pub max_age: Option<i64>,
}

impl CorsSettings {
    pub fn to_policy(&self) -> Result<CorsPolicy> {
        let mut builder = CorsPolicy::builder()
            .allow_origins(self.allow_origins.iter().cloned())
            .allow_origin_patterns(self.allow_origin_patterns.iter().cloned())
            .allow_methods(self.allow_methods.iter().cloned())
            .allow_headers(self.allow_headers.iter().cloned())
            .expose_headers(self.expose_headers.iter().cloned())
            .allow_credentials(self.allow_credentials)
            .allow_private_network(self.allow_private_network);
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(max_age);
        }
        builder.build().context("Failed to build CORS policy")
    }
}

pub fn load_gateway_config() -> Result<GatewayConfig> {
    load_gateway_config_from(|key| env::var(key).ok())
}

pub fn load_gateway_config_from<F>(lookup: F) -> Result<GatewayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("HOST")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("Failed to parse HOST '{host}'"))?;
    let port = match lookup("PORT").and_then(|value| normalize_optional(&value)) {
        Some(value) => value
            .parse::<u16>()
            .with_context(|| format!("Failed to parse PORT '{value}'"))?,
        None => DEFAULT_PORT,
    };

    let secret = lookup("JWT_SECRET")
        .and_then(|value| normalize_optional(&value))
        .ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;
    let mut signing = SigningConfig::hs256(secret).context("Invalid JWT_SECRET")?;
    if let Some(issuer) = lookup("JWT_ISSUER").and_then(|value| normalize_optional(&value)) {
        signing = signing.with_issuer(issuer);
    }

    let max_age = match lookup("CORS_MAX_AGE").and_then(|value| normalize_optional(&value)) {
        Some(value) => Some(
            value
                .parse::<i64>()
                .with_context(|| format!("Failed to parse CORS_MAX_AGE '{value}'"))?,
        ),
        None => None,
    };

    let list = |key: &str| lookup(key).map(|value| parse_list(&value)).unwrap_or_default();
    let flag = |key: &str| lookup(key).map(|value| parse_bool(&value)).unwrap_or(false);

    let cors = CorsSettings {
        allow_origins: list("CORS_ALLOW_ORIGINS"),
        allow_origin_patterns: lookup("CORS_ALLOW_ORIGIN_PATTERNS")
            .map(|value| parse_patterns(&value))
            .unwrap_or_default(),
        allow_methods: list("CORS_ALLOW_METHODS"),
        allow_headers: list("CORS_ALLOW_HEADERS"),
        expose_headers: list("CORS_EXPOSE_HEADERS"),
        allow_credentials: flag("CORS_ALLOW_CREDENTIALS"),
        allow_private_network: flag("CORS_ALLOW_PRIVATE_NETWORK"),
        max_age,
    };

    Ok(GatewayConfig {
        addr: SocketAddr::from((ip, port)),
        signing,
        cors,
    })
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|item| normalize_optional(item))
        .collect()
}

/// Origin patterns are whitespace separated, since regexes may contain commas (`{1,3}`).
fn parse_patterns(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        load_gateway_config_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn parse_bool_accepts_common_truthy_values() {
        for value in ["1", "true", "YES", " on "] {
            assert!(parse_bool(value), "{value}");
        }
        for value in ["0", "false", "no", ""] {
            assert!(!parse_bool(value), "{value}");
        }
    }

    #[test]
    fn parse_list_trims_and_skips_blanks() {
        assert_eq!(
            parse_list(" https://a.test , ,https://b.test,"),
            vec!["https://a.test".to_string(), "https://b.test".to_string()]
        );
        assert!(parse_list("  ").is_empty());
    }

    #[test]
    fn origin_patterns_keep_counted_quantifiers() {
        assert_eq!(
            parse_patterns(r" ^https://[a-z]{1,3}\.example\.com$
                ^https://.*\.example\.org$ "),
            vec![
                r"^https://[a-z]{1,3}\.example\.com$".to_string(),
                r"^https://.*\.example\.org$".to_string(),
            ]
        );

        let config = load(&[
            ("JWT_SECRET", "s"),
            ("CORS_ALLOW_ORIGIN_PATTERNS", r"^https://[a-z]{1,3}\.example\.com$"),
        ])
        .expect("config");
        let policy = config.cors.to_policy().expect("policy");
        assert!(policy.is_origin_allowed("https://abc.example.com"));
        assert!(!policy.is_origin_allowed("https://abcd.example.com"));
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = load(&[("JWT_SECRET", "s3cret")]).expect("config");
        assert_eq!(config.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.signing.issuer(), "fastgo");
        assert_eq!(config.cors, CorsSettings::default());

        let policy = config.cors.to_policy().expect("policy");
        assert!(policy.allow_origins().is_empty());
        assert_eq!(policy.allow_methods(), ["GET".to_string()]);
        assert_eq!(policy.max_age_seconds(), 600);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = load(&[("PORT", "9000")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
        assert!(load(&[("JWT_SECRET", "   ")]).is_err());
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = load(&[("JWT_SECRET", "s"), ("PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn cors_settings_are_read() {
        let config = load(&[
            ("JWT_SECRET", "s"),
            ("JWT_ISSUER", "gateway"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9100"),
            ("CORS_ALLOW_ORIGINS", "https://app.example.com"),
            ("CORS_ALLOW_ORIGIN_PATTERNS", r"^https://.*\.example\.org$"),
            ("CORS_ALLOW_METHODS", "GET,POST"),
            ("CORS_ALLOW_HEADERS", "Content-Type,Authorization"),
            ("CORS_EXPOSE_HEADERS", "X-Request-Id"),
            ("CORS_ALLOW_CREDENTIALS", "true"),
            ("CORS_ALLOW_PRIVATE_NETWORK", "on"),
            ("CORS_MAX_AGE", "120"),
        ])
        .expect("config");

        assert_eq!(config.addr, "127.0.0.1:9100".parse().unwrap());
        assert_eq!(config.signing.issuer(), "gateway");

        let policy = config.cors.to_policy().expect("policy");
        assert!(policy.is_origin_allowed("https://app.example.com"));
        assert!(policy.is_origin_allowed("https://shop.example.org"));
        assert!(!policy.is_origin_allowed("https://evil.test"));
        assert!(policy.is_method_allowed("POST"));
        assert!(policy.allow_credentials());
        assert!(policy.allow_private_network());
        assert_eq!(policy.expose_headers(), ["X-Request-Id".to_string()]);
        assert_eq!(policy.max_age_seconds(), 120);
    }

    #[test]
    fn invalid_origin_pattern_fails_policy_build() {
        let config = load(&[("JWT_SECRET", "s"), ("CORS_ALLOW_ORIGIN_PATTERNS", "(")])
            .expect("config");
        assert!(config.cors.to_policy().is_err());
    }

    #[test]
    fn invalid_max_age_is_an_error() {
        assert!(load(&[("JWT_SECRET", "s"), ("CORS_MAX_AGE", "ten")]).is_err());
    }
}
