use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sigil::config::Config;
use sigil::db::IdentityProviderRecord;
use sigil::idp::{IdentityProvider, IdentityProviderUserInfo, IdpError, ProviderFactory};
use sigil::state::SharedState;
use tower::ServiceExt;

const ORIGIN: &str = "http://localhost:5230";

/// Provider that echoes the authorization code back as the user identifier.
struct EchoProvider;

#[async_trait]
impl IdentityProvider for EchoProvider {
    async fn exchange_token(&self, _redirect_uri: &str, code: &str) -> Result<String, IdpError> {
        if code == "bad-code" {
            return Err(IdpError::Exchange("invalid_grant".to_string()));
        }
        Ok(format!("idp-token-{code}"))
    }

    async fn user_info(&self, access_token: &str) -> Result<IdentityProviderUserInfo, IdpError> {
        let identifier = access_token.trim_start_matches("idp-token-").to_string();
        Ok(IdentityProviderUserInfo {
            display_name: format!("{identifier} (SSO)"),
            email: format!("{}@corp.example", identifier.to_lowercase()),
            identifier,
        })
    }
}

struct EchoFactory;

impl ProviderFactory for EchoFactory {
    fn build(&self, _record: &IdentityProviderRecord) -> Result<Box<dyn IdentityProvider>, IdpError> {
        Ok(Box::new(EchoProvider))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config
}

async fn spawn_app() -> Router {
    let shared = SharedState::with_providers(test_config(), Arc::new(EchoFactory))
        .await
        .expect("Failed to create shared state");
    let state = sigil::api::create_app_state(Arc::new(shared), None);
    sigil::api::router(state).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response: Response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, cookie, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::ORIGIN, ORIGIN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, token: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ORIGIN, ORIGIN)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn token_from_set_cookie(cookie: &str) -> String {
    cookie
        .strip_prefix("sigil.access-token=")
        .and_then(|rest| rest.split(';').next())
        .unwrap()
        .to_string()
}

async fn sign_up(app: &Router, username: &str, password: &str) -> (StatusCode, String, Value) {
    let (status, cookie, body) = send(
        app,
        post_json(
            "/api/auth/signup",
            &json!({ "username": username, "password": password }),
        ),
    )
    .await;
    (status, cookie.map(|c| token_from_set_cookie(&c)).unwrap_or_default(), body)
}

#[tokio::test]
async fn first_sign_up_becomes_host() {
    let app = spawn_app().await;

    let (status, cookie, body) = send(
        &app,
        post_json(
            "/api/auth/signup",
            &json!({ "username": "alice", "password": "pw1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "HOST");
    assert_eq!(body["data"]["user"]["username"], "alice");

    let cookie = cookie.expect("sign-up must set the session cookie");
    assert!(cookie.starts_with("sigil.access-token="));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(!cookie.contains("Secure"));

    let (status, _, body) = sign_up(&app, "bob", "pw2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "USER");

    let (status, _, body) = sign_up(&app, "alice", "other").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "user_already_exists");
}

#[tokio::test]
async fn sign_up_rejects_bad_input() {
    let app = spawn_app().await;

    let (status, _, body) = sign_up(&app, "-nope-", "pw").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_username");

    let (status, _, body) = sign_up(&app, "carol", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_password");
}

#[tokio::test]
async fn sign_in_with_password() {
    let app = spawn_app().await;
    sign_up(&app, "alice", "pw1").await;

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/auth/signin",
            &json!({ "username": "alice", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_credentials");

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/auth/signin",
            &json!({ "username": "nobody", "password": "pw1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "user_not_found");

    let (status, cookie, body) = send(
        &app,
        post_json(
            "/api/auth/signin",
            &json!({ "username": "Alice", "password": "pw1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "alice");
    let token = token_from_set_cookie(&cookie.unwrap());

    let request = Request::builder()
        .uri("/api/auth/status")
        .header(header::ORIGIN, ORIGIN)
        .header(header::COOKIE, format!("sigil.access-token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
}

#[tokio::test]
async fn secure_origin_gets_cross_site_cookie() {
    let app = spawn_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/signup")
        .header(header::ORIGIN, "https://notes.example.com")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": "alice", "password": "pw1" }).to_string(),
        ))
        .unwrap();

    let (status, cookie, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();
    assert!(cookie.contains("SameSite=None"));
    assert!(cookie.contains("Secure"));
}

#[tokio::test]
async fn sign_in_without_origin_is_rejected() {
    let app = spawn_app().await;
    sign_up(&app, "alice", "pw1").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/signin")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "username": "alice", "password": "pw1" }).to_string(),
        ))
        .unwrap();

    let (status, cookie, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_origin");
    assert!(cookie.is_none());
}

#[tokio::test]
async fn revoked_token_stops_working() {
    let app = spawn_app().await;
    let (_, token, _) = sign_up(&app, "alice", "pw1").await;

    let (status, _, body) = send(&app, authed("GET", "/api/auth/tokens", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    let tokens = body["data"].as_array().unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0]["description"], "user login");
    let token_id = tokens[0]["id"].as_i64().unwrap();

    let (status, _, _) = send(
        &app,
        authed("DELETE", &format!("/api/auth/tokens/{token_id}"), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, cookie, body) =
        send(&app, authed("GET", "/api/auth/status", &token, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");
    let cookie = cookie.expect("status must clear the stale cookie");
    assert!(cookie.starts_with("sigil.access-token=;"));
    assert!(cookie.contains("1970"));

    let (status, _, _) = send(&app, authed("GET", "/api/auth/tokens", &token, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = spawn_app().await;

    let request = Request::builder()
        .uri("/api/auth/tokens")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app,
        authed("GET", "/api/workspace/general", "not-a-jwt", None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn archived_user_cannot_sign_in() {
    let app = spawn_app().await;
    let (_, host_token, _) = sign_up(&app, "alice", "pw1").await;
    let (_, _, bob) = sign_up(&app, "bob", "pw2").await;
    let bob_id = bob["data"]["user"]["id"].as_i64().unwrap();

    let (status, _, body) = send(
        &app,
        authed(
            "POST",
            &format!("/api/users/{bob_id}/archive"),
            &host_token,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["row_status"], "ARCHIVED");

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/auth/signin",
            &json!({ "username": "bob", "password": "pw2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "user_archived");

    let (status, _, _) = send(
        &app,
        authed(
            "POST",
            &format!("/api/users/{bob_id}/restore"),
            &host_token,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &app,
        post_json(
            "/api/auth/signin",
            &json!({ "username": "bob", "password": "pw2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn disallowed_sign_up_is_refused() {
    let app = spawn_app().await;
    let (_, host_token, _) = sign_up(&app, "alice", "pw1").await;

    let setting = json!({ "disallow_signup": true, "disallow_password_login": false });
    let (status, _, _) = send(
        &app,
        authed("PUT", "/api/workspace/general", &host_token, Some(&setting)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = sign_up(&app, "bob", "pw2").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "signup_disabled");
}

#[tokio::test]
async fn sso_provisions_and_filters_users() {
    let app = spawn_app().await;
    let (_, host_token, _) = sign_up(&app, "alice", "pw1").await;

    let provider = json!({
        "name": "Corp SSO",
        "type": "OAUTH2",
        "identifier_filter": "^Carol$",
        "config": {
            "client_id": "sigil",
            "client_secret": "s3cret",
            "auth_url": "https://sso.corp.example/authorize",
            "token_url": "https://sso.corp.example/token",
            "user_info_url": "https://sso.corp.example/userinfo",
            "scopes": ["openid", "profile"],
            "field_mapping": { "identifier": "sub", "display_name": "name", "email": "email" }
        }
    });

    let (status, _, body) = send(
        &app,
        authed("POST", "/api/identity-providers", &host_token, Some(&provider)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let idp_id = body["data"]["id"].as_i64().unwrap();

    let request = Request::builder()
        .uri("/api/identity-providers")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"][0]["config"].get("client_secret").is_none());

    let sso = |code: &str| {
        json!({
            "idp_id": idp_id,
            "redirect_uri": "http://localhost:5230/auth/callback",
            "code": code,
        })
    };

    let (status, cookie, body) = send(&app, post_json("/api/auth/signin/sso", &sso("Carol"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "carol");
    assert_eq!(body["data"]["user"]["role"], "USER");
    assert_eq!(body["data"]["user"]["nickname"], "Carol (SSO)");
    assert!(cookie.is_some());

    let (status, _, body) = send(&app, post_json("/api/auth/signin/sso", &sso("Carol"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "carol");

    let (status, _, body) = send(&app, post_json("/api/auth/signin/sso", &sso("mallory"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "identifier_rejected");

    let (status, _, body) = send(&app, post_json("/api/auth/signin/sso", &sso("bad-code"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "provider_exchange_failed");

    let missing = json!({
        "idp_id": idp_id + 100,
        "redirect_uri": "http://localhost:5230/auth/callback",
        "code": "Carol",
    });
    let (status, _, body) = send(&app, post_json("/api/auth/signin/sso", &missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "provider_not_found");
}

#[tokio::test]
async fn host_can_retarget_identifier_filter() {
    let app = spawn_app().await;
    let (_, host_token, _) = sign_up(&app, "alice", "pw1").await;

    let provider = json!({
        "name": "Corp SSO",
        "type": "OAUTH2",
        "identifier_filter": "^Carol$",
        "config": {
            "client_id": "sigil",
            "client_secret": "s3cret",
            "auth_url": "https://sso.corp.example/authorize",
            "token_url": "https://sso.corp.example/token",
            "user_info_url": "https://sso.corp.example/userinfo",
            "field_mapping": { "identifier": "sub" }
        }
    });
    let (_, _, body) = send(
        &app,
        authed("POST", "/api/identity-providers", &host_token, Some(&provider)),
    )
    .await;
    let idp_id = body["data"]["id"].as_i64().unwrap();

    let sso = json!({
        "idp_id": idp_id,
        "redirect_uri": "http://localhost:5230/auth/callback",
        "code": "Dave",
    });
    let (status, _, _) = send(&app, post_json("/api/auth/signin/sso", &sso)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/identity-providers/{idp_id}");
    let patch = json!({ "identifier_filter": "^(Carol|Dave)$" });
    let (status, _, body) = send(&app, authed("PATCH", &uri, &host_token, Some(&patch))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], idp_id);
    assert_eq!(body["data"]["name"], "Corp SSO");
    assert!(body["data"]["config"].get("client_secret").is_none());

    let (status, _, body) = send(&app, post_json("/api/auth/signin/sso", &sso)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "dave");

    let (_, bob_token, _) = sign_up(&app, "bob", "pw2").await;
    let (status, _, body) = send(&app, authed("PATCH", &uri, &bob_token, Some(&patch))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");

    let bad = json!({ "identifier_filter": "(" });
    let (status, _, body) = send(&app, authed("PATCH", &uri, &host_token, Some(&bad))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_identifier_filter");
}

#[tokio::test]
async fn metrics_route_reports_disabled_exporter() {
    let app = spawn_app().await;
    let (_, token, _) = sign_up(&app, "alice", "pw1").await;

    let response = app
        .clone()
        .oneshot(authed("GET", "/api/metrics", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
    assert_eq!(
        response.headers().get("x-frame-options").unwrap(),
        "DENY"
    );
}

#[tokio::test]
async fn regular_users_cannot_manage_providers() {
    let app = spawn_app().await;
    sign_up(&app, "alice", "pw1").await;
    let (_, bob_token, _) = sign_up(&app, "bob", "pw2").await;

    let provider = json!({
        "name": "Rogue",
        "type": "OAUTH2",
        "config": {}
    });
    let (status, _, body) = send(
        &app,
        authed("POST", "/api/identity-providers", &bob_token, Some(&provider)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");
}

#[tokio::test]
async fn health_reports_database() {
    let app = spawn_app().await;

    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], true);
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}
