pub mod decision;
pub mod error;
pub mod middleware;
pub mod policy;

pub use decision::{
    CorsDecision, CorsRequest, ACCESS_CONTROL_ALLOW_PRIVATE_NETWORK, HEADER_NOT_ALLOWED,
    METHOD_NOT_ALLOWED, ORIGIN_NOT_ALLOWED, UNDECODABLE,
};
pub use error::{CorsConfigError, CorsConfigResult};
pub use middleware::cors_middleware;
pub use policy::{CorsPolicy, CorsPolicyBuilder, WILDCARD};
