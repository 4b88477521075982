use axum::http::HeaderValue;
use regex::Regex;
use tracing::warn;

use crate::error::{CorsConfigError, CorsConfigResult};

/// Leading entry that matches every origin, method or header.
pub const WILDCARD: &str = "*";

pub const DEFAULT_ALLOW_METHODS: &[&str] = &["GET"];
pub const DEFAULT_ALLOW_HEADERS: &[&str] = &[
    "Accept",
    "Accept-Language",
    "Content-Language",
    "Content-Type",
    "Authorization",
    "X-Requested-With",
];
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 600;

/// Immutable cross-origin policy, built once at startup and shared by every request.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origins: Vec<String>,
    allow_origin_patterns: Vec<Regex>,
    allow_methods: Vec<String>,
    allow_headers: Vec<String>,
    allow_credentials: bool,
    expose_headers: Vec<String>,
    max_age_seconds: u64,
    allow_private_network: bool,
    pub(crate) rendered: RenderedHeaders,
}

/// Response header values that only depend on the policy.
#[derive(Debug, Clone)]
pub(crate) struct RenderedHeaders {
    pub(crate) allow_methods: HeaderValue,
    pub(crate) allow_headers: HeaderValue,
    pub(crate) expose_headers: Option<HeaderValue>,
    pub(crate) max_age: Option<HeaderValue>,
}

impl CorsPolicy {
    pub fn builder() -> CorsPolicyBuilder {
        CorsPolicyBuilder::default()
    }

    pub fn allow_origins(&self) -> &[String] {
        &self.allow_origins
    }

    pub fn allow_origin_patterns(&self) -> &[Regex] {
        &self.allow_origin_patterns
    }

    pub fn allow_methods(&self) -> &[String] {
        &self.allow_methods
    }

    pub fn allow_headers(&self) -> &[String] {
        &self.allow_headers
    }

    pub fn allow_credentials(&self) -> bool {
        self.allow_credentials
    }

    pub fn expose_headers(&self) -> &[String] {
        &self.expose_headers
    }

    pub fn max_age_seconds(&self) -> u64 {
        self.max_age_seconds
    }

    pub fn allow_private_network(&self) -> bool {
        self.allow_private_network
    }

    /// Exact (case-sensitive) origins are checked before any pattern.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if origin.is_empty() {
            return false;
        }

        if self
            .allow_origins
            .first()
            .is_some_and(|first| first == WILDCARD)
        {
            return true;
        }

        if self.allow_origins.iter().any(|allowed| allowed == origin) {
            return true;
        }

        self.allow_origin_patterns
            .iter()
            .any(|pattern| pattern.is_match(origin))
    }

    pub fn is_method_allowed(&self, method: &str) -> bool {
        matches_list(&self.allow_methods, method)
    }

    pub fn is_header_allowed(&self, header: &str) -> bool {
        matches_list(&self.allow_headers, header.trim())
    }
}

fn matches_list(list: &[String], candidate: &str) -> bool {
    match list.first() {
        Some(first) if first == WILDCARD => true,
        _ => list.iter().any(|entry| entry.eq_ignore_ascii_case(candidate)),
    }
}

/// Validating builder for [`CorsPolicy`].
///
/// List setters given an empty list keep the current value, and a negative
/// max-age keeps the current max-age.
#[derive(Debug, Clone)]
pub struct CorsPolicyBuilder {
    allow_origins: Vec<String>,
    origin_patterns: Vec<String>,
    origin_regexes: Vec<Regex>,
    allow_methods: Vec<String>,
    allow_headers: Vec<String>,
    allow_credentials: bool,
    expose_headers: Vec<String>,
    max_age_seconds: u64,
    allow_private_network: bool,
}

impl Default for CorsPolicyBuilder {
    fn default() -> Self {
        Self {
            allow_origins: Vec::new(),
            origin_patterns: Vec::new(),
            origin_regexes: Vec::new(),
            allow_methods: to_owned_list(DEFAULT_ALLOW_METHODS),
            allow_headers: to_owned_list(DEFAULT_ALLOW_HEADERS),
            allow_credentials: false,
            expose_headers: Vec::new(),
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
            allow_private_network: false,
        }
    }
}

impl CorsPolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        replace_if_non_empty(&mut self.allow_origins, origins);
        self
    }

    /// Regular expressions compiled by [`CorsPolicyBuilder::build`].
    pub fn allow_origin_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        replace_if_non_empty(&mut self.origin_patterns, patterns);
        self
    }

    pub fn allow_origin_regexes<I>(mut self, regexes: I) -> Self
    where
        I: IntoIterator<Item = Regex>,
    {
        let regexes: Vec<Regex> = regexes.into_iter().collect();
        if !regexes.is_empty() {
            self.origin_regexes = regexes;
        }
        self
    }

    pub fn allow_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        replace_if_non_empty(&mut self.allow_methods, methods);
        self
    }

    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        replace_if_non_empty(&mut self.allow_headers, headers);
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        replace_if_non_empty(&mut self.expose_headers, headers);
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        match u64::try_from(seconds) {
            Ok(value) => self.max_age_seconds = value,
            Err(_) => warn!(
                seconds,
                kept = self.max_age_seconds,
                "ignoring negative CORS max-age"
            ),
        }
        self
    }

    pub fn allow_private_network(mut self, allow: bool) -> Self {
        self.allow_private_network = allow;
        self
    }

    pub fn build(self) -> CorsConfigResult<CorsPolicy> {
        let mut allow_origin_patterns = self.origin_regexes;
        for pattern in self.origin_patterns {
            let compiled = Regex::new(&pattern)
                .map_err(|source| CorsConfigError::InvalidPattern { pattern, source })?;
            allow_origin_patterns.push(compiled);
        }

        if self.allow_credentials
            && self
                .allow_origins
                .first()
                .is_some_and(|first| first == WILDCARD)
        {
            warn!("CORS credentials enabled together with a wildcard origin; every origin will be echoed");
        }

        let expose_headers = if self.expose_headers.is_empty() {
            None
        } else {
            Some(render(
                "Access-Control-Expose-Headers",
                self.expose_headers.join(", "),
            )?)
        };
        let max_age = if self.max_age_seconds > 0 {
            Some(HeaderValue::from(self.max_age_seconds))
        } else {
            None
        };

        let rendered = RenderedHeaders {
            allow_methods: render(
                "Access-Control-Allow-Methods",
                self.allow_methods.join(", "),
            )?,
            allow_headers: render(
                "Access-Control-Allow-Headers",
                self.allow_headers.join(", "),
            )?,
            expose_headers,
            max_age,
        };

        Ok(CorsPolicy {
            allow_origins: self.allow_origins,
            allow_origin_patterns,
            allow_methods: self.allow_methods,
            allow_headers: self.allow_headers,
            allow_credentials: self.allow_credentials,
            expose_headers: self.expose_headers,
            max_age_seconds: self.max_age_seconds,
            allow_private_network: self.allow_private_network,
            rendered,
        })
    }
}

fn render(header: &'static str, value: String) -> CorsConfigResult<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|_| CorsConfigError::InvalidHeaderValue { header, value })
}

fn replace_if_non_empty<I, S>(target: &mut Vec<String>, values: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    if !values.is_empty() {
        *target = values;
    }
}

fn to_owned_list(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
