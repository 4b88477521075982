use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{HeaderMap, VARY};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::decision::{CorsDecision, CorsRequest};
use crate::policy::CorsPolicy;

/// axum middleware applying a shared [`CorsPolicy`] to every request.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn_with_state(policy, cors_middleware));
/// ```
pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request,
    next: Next,
) -> Response {
    let decision = {
        let cors_request = CorsRequest::from_parts(request.method(), request.headers());
        policy.evaluate(&cors_request)
    };

    match decision {
        CorsDecision::PassThrough => next.run(request).await,
        CorsDecision::Allow { headers } => {
            let mut response = next.run(request).await;
            merge_headers(response.headers_mut(), headers);
            response
        }
        CorsDecision::Preflight { headers, status } => (status, headers).into_response(),
        CorsDecision::Reject {
            headers,
            status,
            reason,
        } => (status, headers, reason).into_response(),
    }
}

/// Staged CORS headers win over downstream values, except `Vary`, which is appended.
fn merge_headers(target: &mut HeaderMap, staged: HeaderMap) {
    for (name, value) in staged.iter() {
        if *name == VARY {
            target.append(name.clone(), value.clone());
        } else {
            target.insert(name.clone(), value.clone());
        }
    }
}
