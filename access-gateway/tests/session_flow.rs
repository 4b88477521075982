use access_gateway::{build_router, issue_session, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE, ORIGIN, VARY,
        },
        Method, Request, StatusCode,
    },
    Router,
};
use common_auth::{SigningConfig, TokenManager};
use common_cors::CorsPolicy;
use serde_json::{json, Value};
use tower::util::ServiceExt;

const APP_ORIGIN: &str = "https://app.example.com";

fn state() -> AppState {
    let manager = TokenManager::new(SigningConfig::hs256("gateway-secret").expect("config"));
    let cors = CorsPolicy::builder()
        .allow_origins([APP_ORIGIN])
        .allow_methods(["GET", "POST"])
        .allow_headers(["Content-Type", "Authorization"])
        .allow_credentials(true)
        .build()
        .expect("policy");
    AppState::new(manager, cors)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body")
        .to_vec();
    (status, body)
}

fn refresh_request(token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/session/refresh")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "refresh_token": token }).to_string()))
        .expect("request")
}

fn bearer(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn refresh_rotates_and_logout_revokes() {
    let state = state();
    let app = build_router(state.clone());

    let session = issue_session(&state, 7, "alice", "admin")
        .await
        .expect("session");
    assert_eq!(session.token_type, "Bearer");
    assert_eq!(session.expires_in, 2 * 60 * 60);

    // Identity survives rotation.
    let (status, body) = send(&app, refresh_request(&session.refresh_token)).await;
    assert_eq!(status, StatusCode::OK);
    let rotated: Value = serde_json::from_slice(&body).expect("json");
    let new_access = rotated["access_token"].as_str().expect("access").to_string();
    let new_refresh = rotated["refresh_token"].as_str().expect("refresh").to_string();
    assert_ne!(new_refresh, session.refresh_token);

    let (status, body) = send(&app, bearer(Method::GET, "/me", &new_access)).await;
    assert_eq!(status, StatusCode::OK);
    let claims: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(claims["user_id"], 7);
    assert_eq!(claims["username"], "alice");
    assert_eq!(claims["role"], "admin");

    // The rotated-out token is no longer accepted.
    let (status, body) = send(&app, refresh_request(&session.refresh_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let error: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(error["code"], "AUTH_REVOKED");

    let (status, _) = send(
        &app,
        bearer(Method::POST, "/session/logout", &new_access),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, refresh_request(&new_refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn access_token_cannot_refresh() {
    let state = state();
    let app = build_router(state.clone());
    let session = issue_session(&state, 3, "bob", "cashier")
        .await
        .expect("session");

    let (status, body) = send(&app, refresh_request(&session.access_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let error: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(error["code"], "AUTH_TOKEN_TYPE");
}

#[tokio::test]
async fn refresh_token_cannot_authenticate() {
    let state = state();
    let app = build_router(state.clone());
    let session = issue_session(&state, 3, "bob", "cashier")
        .await
        .expect("session");

    let (status, _) = send(&app, bearer(Method::GET, "/me", &session.refresh_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_refresh_token_is_unauthorized() {
    let app = build_router(state());
    let (status, body) = send(&app, refresh_request("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let error: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(error["code"], "AUTH_TOKEN");
}

#[tokio::test]
async fn cors_wraps_every_route() {
    let app = build_router(state());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .header(ORIGIN, APP_ORIGIN)
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], APP_ORIGIN);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(response.headers()[VARY], "Origin");

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/session/refresh")
        .header(ORIGIN, APP_ORIGIN)
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(preflight).await.expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], "GET, POST");

    let foreign = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .header(ORIGIN, "https://evil.test")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(&app, foreign).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, b"Origin not allowed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refreshes_of_one_token_issue_one_session() {
    let state = state();
    let app = build_router(state.clone());

    for trial in 0..50u64 {
        let session = issue_session(&state, trial, "alice", "admin")
            .await
            .expect("session");

        let attempts: Vec<_> = (0..2)
            .map(|_| {
                let app = app.clone();
                let token = session.refresh_token.clone();
                tokio::spawn(async move { send(&app, refresh_request(&token)).await.0 })
            })
            .collect();

        let mut statuses = Vec::new();
        for attempt in attempts {
            statuses.push(attempt.await.expect("join"));
        }
        statuses.sort();
        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::UNAUTHORIZED],
            "trial {trial}"
        );
    }
}

#[tokio::test]
async fn admin_can_revoke_another_users_session() {
    let state = state();
    let app = build_router(state.clone());
    let admin = issue_session(&state, 1, "root", "admin")
        .await
        .expect("session");
    let cashier = issue_session(&state, 2, "bob", "cashier")
        .await
        .expect("session");

    let (status, _) = send(
        &app,
        bearer(Method::POST, "/users/1/session/revoke", &cashier.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        bearer(Method::POST, "/users/2/session/revoke", &admin.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, refresh_request(&cashier.refresh_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, refresh_request(&admin.refresh_token)).await;
    assert_eq!(status, StatusCode::OK);
}
