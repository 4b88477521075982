use thiserror::Error;

pub type CorsConfigResult<T> = Result<T, CorsConfigError>;

/// Returned by `CorsPolicyBuilder::build` when the configuration cannot be
/// turned into a usable policy.
#[derive(Debug, Error)]
pub enum CorsConfigError {
    #[error("invalid origin pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("value '{value}' cannot be used for header '{header}'")]
    InvalidHeaderValue { header: &'static str, value: String },
}
