//! End-to-end tests for the HTTP surface, driving the router directly.
#![cfg(feature = "web")]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use partner_survey::app::{AppState, router};
use partner_survey::auth::{Role, SessionStore, UserDirectory};
use partner_survey::sheets::SheetMirror;
use partner_survey::storage::MemStorage;

/// Build a service backed by throwaway state. The tempdir keeps mirror and
/// snapshot writes out of the working directory.
fn test_app(dir: &tempfile::TempDir) -> Router {
    let users = UserDirectory::new();
    users
        .add_user("admin", "admin123", "admin@example.com", Role::Admin)
        .unwrap();

    let state = Arc::new(AppState {
        store: MemStorage::new(),
        users,
        sessions: SessionStore::new(),
        mirror: SheetMirror::new(dir.path().join("responses.xlsx")),
        snapshot_file: dir
            .path()
            .join("responses.bin.gz")
            .to_string_lossy()
            .to_string(),
    });
    router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

/// Log in and return the session cookie pair (`session=<id>`).
async fn login(app: &Router, username: &str, password: &str) -> String {
    let request = json_request(
        "POST",
        "/api/auth/login",
        &json!({ "username": username, "password": password }),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "login should succeed");

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets a session cookie")
        .to_str()
        .unwrap();
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair present")
        .to_string()
}

fn existing_submission() -> Value {
    json!({
        "identity": "existing",
        "email": "boss@cafe.tw",
        "businessName": "巷口咖啡",
        "privacyConsent": "yes",
        "cooperationDuration": "1y+",
        "newCustomerCount": 120,
        "satisfactionRating": 4,
        "recommendRating": 5,
        "contactInfo": "0922-000-111"
    })
}

#[tokio::test]
async fn submit_then_read_back_as_admin() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(
        &app,
        json_request("POST", "/api/responses", &existing_submission()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().expect("stored record has an id").to_string();
    assert_eq!(body["identity"], "existing");
    assert_eq!(body["businessName"], "巷口咖啡");

    // reads are gated behind a session
    let (status, _) = send(&app, get_request("/api/admin/responses", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = login(&app, "admin", "admin123").await;
    let (status, body) = send(&app, get_request("/api/admin/responses", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let uri = format!("/api/admin/responses/{}", id);
    let (status, body) = send(&app, get_request(&uri, Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    let (status, body) = send(
        &app,
        get_request("/api/admin/responses/no-such-id", Some(&cookie)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Response not found");
}

#[tokio::test]
async fn invalid_submission_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let mut payload = existing_submission();
    payload["satisfactionRating"] = json!(9);
    let (status, body) = send(&app, json_request("POST", "/api/responses", &payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("滿意度"));

    let (status, _) = send(&app, json_request("POST", "/api/responses", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn flow_advance_follows_answers() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(&app, get_request("/api/flow/start", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"]["key"], "welcome");
    assert_eq!(body["progress"], 0.0);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/flow/advance",
            &json!({ "current": "welcome", "answers": {}, "direction": "next" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"]["key"], "identity");

    // an invalid answer blocks the step
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/flow/advance",
            &json!({
                "current": "email",
                "answers": { "email": "not-an-email" },
                "direction": "next"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "請輸入有效的電子郵件地址");

    // declining the privacy terms diverts to the rejection screen
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/flow/advance",
            &json!({
                "current": "privacy_consent",
                "answers": { "identity": "existing", "privacyConsent": "no" },
                "direction": "next"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"]["key"], "privacy_rejected");

    // ...which offers the reconsider path back to the consent question
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/flow/advance",
            &json!({
                "current": "privacy_rejected",
                "answers": {},
                "direction": "reconsider"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"]["key"], "privacy_consent");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            &json!({ "username": "admin", "password": "wrong" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "密碼錯誤");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            &json!({ "username": "ghost", "password": "whatever" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "使用者不存在");
}

#[tokio::test]
async fn role_hierarchy_gates_the_admin_surface() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let admin_cookie = login(&app, "admin", "admin123").await;

    // admin creates a viewer account
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/users",
            &json!({
                "username": "vera",
                "password": "secret",
                "email": "vera@example.com",
                "role": "viewer"
            }),
        ),
    )
    .await;
    // the request above lacks the session cookie
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "請先登入");

    let mut request = json_request(
        "POST",
        "/api/admin/users",
        &json!({
            "username": "vera",
            "password": "secret",
            "email": "vera@example.com",
            "role": "viewer"
        }),
    );
    request
        .headers_mut()
        .insert(header::COOKIE, admin_cookie.parse().unwrap());
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "viewer");

    // the viewer can read submissions but not manage accounts
    let viewer_cookie = login(&app, "vera", "secret").await;
    let (status, _) = send(&app, get_request("/api/admin/responses", Some(&viewer_cookie))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get_request("/api/admin/users", Some(&viewer_cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "權限不足");

    // role promotion opens nothing below admin
    let mut request = json_request(
        "PATCH",
        "/api/admin/users/vera/role",
        &json!({ "role": "editor" }),
    );
    request
        .headers_mut()
        .insert(header::COOKIE, admin_cookie.parse().unwrap());
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "editor");

    let (status, _) = send(&app, get_request("/api/admin/users", Some(&viewer_cookie))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let cookie = login(&app, "admin", "admin123").await;

    let (status, _) = send(&app, get_request("/api/auth/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);

    let mut request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .body(Body::empty())
        .unwrap();
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get_request("/api/auth/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
