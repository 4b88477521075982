use axum::http::header::{
    self, HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS,
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD,
};
use axum::http::{Method, StatusCode};
use tracing::debug;

use crate::policy::CorsPolicy;

pub const ACCESS_CONTROL_ALLOW_PRIVATE_NETWORK: HeaderName =
    HeaderName::from_static("access-control-allow-private-network");

pub const ORIGIN_NOT_ALLOWED: &str = "Origin not allowed";
pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";
pub const HEADER_NOT_ALLOWED: &str = "Header not allowed";

/// The parts of an incoming request that take part in a CORS decision.
///
/// Empty header values are treated as absent. Values that are not UTF-8 are
/// kept as [`UNDECODABLE`], which no configured origin, method or header equals.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorsRequest<'a> {
    pub origin: &'a str,
    pub method: &'a str,
    pub request_method: Option<&'a str>,
    pub request_headers: Option<&'a str>,
}

impl<'a> CorsRequest<'a> {
    pub fn new(origin: &'a str, method: &'a str) -> Self {
        Self {
            origin,
            method,
            request_method: None,
            request_headers: None,
        }
    }

    pub fn with_request_method(mut self, method: &'a str) -> Self {
        self.request_method = non_empty(method);
        self
    }

    pub fn with_request_headers(mut self, headers: &'a str) -> Self {
        self.request_headers = non_empty(headers);
        self
    }

    pub fn from_parts(method: &'a Method, headers: &'a HeaderMap) -> Self {
        Self {
            origin: header_str(headers, &header::ORIGIN).unwrap_or_default(),
            method: method.as_str(),
            request_method: header_str(headers, &ACCESS_CONTROL_REQUEST_METHOD),
            request_headers: header_str(headers, &ACCESS_CONTROL_REQUEST_HEADERS),
        }
    }

    pub fn is_preflight(&self) -> bool {
        self.method == Method::OPTIONS.as_str() || self.request_method.is_some()
    }
}

/// Stand-in for a header value whose bytes are not valid UTF-8.
pub const UNDECODABLE: &str = "\u{FFFD}";

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    let value = headers.get(name)?;
    non_empty(std::str::from_utf8(value.as_bytes()).unwrap_or(UNDECODABLE))
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Outcome of evaluating a request against a [`CorsPolicy`].
///
/// `headers` are the response headers the host must set before continuing
/// (`Allow`) or before terminating the chain (`Preflight`, `Reject`).
#[derive(Debug, Clone)]
pub enum CorsDecision {
    /// Not a cross-origin request; nothing to do.
    PassThrough,
    Allow {
        headers: HeaderMap,
    },
    Preflight {
        headers: HeaderMap,
        status: StatusCode,
    },
    Reject {
        headers: HeaderMap,
        status: StatusCode,
        reason: String,
    },
}

impl CorsDecision {
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            CorsDecision::PassThrough => None,
            CorsDecision::Allow { headers }
            | CorsDecision::Preflight { headers, .. }
            | CorsDecision::Reject { headers, .. } => Some(headers),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CorsDecision::Preflight { status, .. } | CorsDecision::Reject { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether the host should stop the chain after applying this decision.
    pub fn terminates(&self) -> bool {
        matches!(
            self,
            CorsDecision::Preflight { .. } | CorsDecision::Reject { .. }
        )
    }
}

fn reject(headers: HeaderMap, reason: impl Into<String>) -> CorsDecision {
    CorsDecision::Reject {
        headers,
        status: StatusCode::FORBIDDEN,
        reason: reason.into(),
    }
}

impl CorsPolicy {
    pub fn evaluate(&self, request: &CorsRequest<'_>) -> CorsDecision {
        let origin = request.origin;
        if origin.is_empty() {
            return CorsDecision::PassThrough;
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));

        if !self.is_origin_allowed(origin) {
            debug!(origin, "cors: origin rejected");
            return reject(headers, ORIGIN_NOT_ALLOWED);
        }

        let Ok(origin_value) = HeaderValue::from_str(origin) else {
            debug!(origin, "cors: origin is not a valid header value");
            return reject(headers, ORIGIN_NOT_ALLOWED);
        };
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin_value);

        if self.allow_credentials() {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }

        if request.is_preflight() {
            return self.evaluate_preflight(request, headers);
        }

        if let Some(expose) = &self.rendered.expose_headers {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
        CorsDecision::Allow { headers }
    }

    fn evaluate_preflight(&self, request: &CorsRequest<'_>, mut headers: HeaderMap) -> CorsDecision {
        if !request
            .request_method
            .is_some_and(|method| self.is_method_allowed(method))
        {
            debug!(
                origin = request.origin,
                requested = request.request_method.unwrap_or_default(),
                "cors: preflight method rejected"
            );
            return reject(headers, METHOD_NOT_ALLOWED);
        }

        let allow_headers = match request.request_headers {
            Some(raw) => {
                if let Some(denied) = raw
                    .split(',')
                    .map(str::trim)
                    .find(|requested| !self.is_header_allowed(requested))
                {
                    debug!(origin = request.origin, header = denied, "cors: preflight header rejected");
                    return reject(headers, format!("{HEADER_NOT_ALLOWED}: {denied}"));
                }
                match HeaderValue::from_str(raw) {
                    Ok(value) => value,
                    Err(_) => return reject(headers, format!("{HEADER_NOT_ALLOWED}: {raw}")),
                }
            }
            None => self.rendered.allow_headers.clone(),
        };

        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            self.rendered.allow_methods.clone(),
        );
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
        if let Some(max_age) = &self.rendered.max_age {
            headers.insert(ACCESS_CONTROL_MAX_AGE, max_age.clone());
        }
        if self.allow_private_network() {
            headers.insert(
                ACCESS_CONTROL_ALLOW_PRIVATE_NETWORK,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(expose) = &self.rendered.expose_headers {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }

        CorsDecision::Preflight {
            headers,
            status: StatusCode::NO_CONTENT,
        }
    }
}
