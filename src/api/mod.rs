pub mod auth;
mod error;
mod profile;

pub use error::{ApiError, ErrorCode, ValidationErrorBuilder};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Profile routes sit behind the session gate
    let protected = Router::new()
        .route("/save-medical-data", post(profile::save_medical_data))
        .route("/get-medical-data", get(profile::get_medical_data))
        .route("/save-device-data", post(profile::save_device_data))
        .route("/get-device-data", get(profile::get_device_data))
        .route("/dashboard", get(auth::dashboard))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/check-auth", get(auth::check_auth))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::DbPool;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> (Router, DbPool) {
        let pool = crate::db::test_pool().await;
        let state = Arc::new(AppState::new(Config::default(), pool.clone()));
        (create_router(state), pool)
    }

    fn json_post(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body, set_cookie)
    }

    /// The `name=value` pair from a Set-Cookie header, for replay as Cookie.
    fn cookie_pair(set_cookie: &str) -> String {
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn signup_and_login(app: &Router, username: &str, password: &str) -> String {
        let (status, _, _) = send(
            app,
            json_post("/signup", json!({"username": username, "password": password}), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, set_cookie) = send(
            app,
            json_post("/login", json!({"username": username, "password": password}), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        cookie_pair(&set_cookie.expect("login sets the session cookie"))
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app().await;
        let (status, body, _) = send(&app, get_request("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_signup_login_save_get_flow() {
        let (app, _) = test_app().await;

        let (status, body, _) = send(
            &app,
            json_post("/signup", json!({"username": "alice", "password": "pw1"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"User registered");

        let (status, body, set_cookie) = send(
            &app,
            json_post("/login", json!({"username": "alice", "password": "pw1"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let login: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(login["success"], json!(true));
        assert_eq!(login["redirectTo"], json!("/simulation.html"));
        assert_eq!(login["user"]["username"], json!("alice"));
        assert!(login["user"]["id"].is_i64());
        assert!(login.get("password_hash").is_none());

        let set_cookie = set_cookie.unwrap();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Max-Age=600"));
        let cookie = cookie_pair(&set_cookie);

        let (status, body, _) = send(
            &app,
            json_post("/save-medical-data", json!({"full_name": "Alice A"}), Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let saved: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(saved["success"], json!(true));

        let (status, body, _) = send(&app, get_request("/get-medical-data", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        let profile: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(profile["full_name"], json!("Alice A"));
        assert_eq!(profile["blood_type"], Value::Null);
    }

    #[tokio::test]
    async fn test_signup_missing_fields_is_400() {
        let (app, _) = test_app().await;

        let (status, body, _) = send(
            &app,
            json_post("/signup", json!({"username": "", "password": "pw"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"]["code"], json!("validation_error"));

        let (status, _, _) = send(&app, json_post("/signup", json!({}), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_signup_is_conflict() {
        let (app, pool) = test_app().await;

        let request = json!({"username": "alice", "password": "pw1"});
        let (status, _, _) = send(&app, json_post("/signup", request.clone(), None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body, _) = send(&app, json_post("/signup", request, None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"]["code"], json!("conflict"));

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_failed_login_creates_no_session() {
        let (app, pool) = test_app().await;
        send(
            &app,
            json_post("/signup", json!({"username": "alice", "password": "pw1"}), None),
        )
        .await;

        let (status, _, set_cookie) = send(
            &app,
            json_post("/login", json!({"username": "alice", "password": "wrong"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(set_cookie.is_none());

        let (status, _, _) = send(
            &app,
            json_post("/login", json!({"username": "nobody", "password": "pw1"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_gate_rejects_before_store_access() {
        let (app, pool) = test_app().await;

        let (status, body, _) = send(&app, get_request("/get-medical-data", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"]["code"], json!("unauthorized"));

        let stale = format!("{}=0123456789abcdef", auth::SESSION_COOKIE);
        let (status, _, _) = send(
            &app,
            json_post("/save-medical-data", json!({"full_name": "Mallory"}), Some(&stale)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // The handler never ran, so nothing was written
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM medical_profiles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_check_auth_reports_without_rejecting() {
        let (app, _) = test_app().await;

        let (status, body, _) = send(&app, get_request("/check-auth", None)).await;
        assert_eq!(status, StatusCode::OK);
        let check: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(check["authenticated"], json!(false));
        assert!(check.get("user").is_none());

        let cookie = signup_and_login(&app, "alice", "pw1").await;
        let (status, body, _) = send(&app, get_request("/check-auth", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        let check: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(check["authenticated"], json!(true));
        assert_eq!(check["user"]["username"], json!("alice"));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (app, _) = test_app().await;
        let cookie = signup_and_login(&app, "alice", "pw1").await;

        let (status, body, set_cookie) = send(&app, get_request("/logout", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Logged out");
        assert!(set_cookie.unwrap().contains("Max-Age=0"));

        // The session is gone
        let (status, _, _) = send(&app, get_request("/dashboard", Some(&cookie))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // Logging out again with the dead cookie is still a success
        let (status, _, _) = send(&app, get_request("/logout", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dashboard_greets_by_username() {
        let (app, _) = test_app().await;
        let cookie = signup_and_login(&app, "alice", "pw1").await;

        let (status, body, _) = send(&app, get_request("/dashboard", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Welcome, alice");
    }

    #[tokio::test]
    async fn test_get_medical_data_is_null_before_first_save() {
        let (app, _) = test_app().await;
        let cookie = signup_and_login(&app, "alice", "pw1").await;

        let (status, body, _) = send(&app, get_request("/get-medical-data", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"null");
    }

    #[tokio::test]
    async fn test_repeated_save_overwrites_single_row() {
        let (app, pool) = test_app().await;
        let cookie = signup_and_login(&app, "alice", "pw1").await;

        send(
            &app,
            json_post(
                "/save-medical-data",
                json!({"full_name": "Alice A", "allergies": "penicillin"}),
                Some(&cookie),
            ),
        )
        .await;
        send(
            &app,
            json_post("/save-medical-data", json!({"full_name": "Alice B"}), Some(&cookie)),
        )
        .await;

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM medical_profiles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);

        let (_, body, _) = send(&app, get_request("/get-medical-data", Some(&cookie))).await;
        let profile: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(profile["full_name"], json!("Alice B"));
        // Overwrite, not merge
        assert_eq!(profile["allergies"], Value::Null);
    }

    #[tokio::test]
    async fn test_legacy_device_data_roundtrip_and_conflict() {
        let (app, _) = test_app().await;
        let cookie = signup_and_login(&app, "alice", "pw1").await;

        // Nothing saved yet: the legacy fetch answers with an empty object
        let (status, body, _) = send(&app, get_request("/get-device-data", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"{}");

        let request = json!({"blood_type": "AB-", "emergency_contact": "555-0102"});
        let (status, body, _) = send(
            &app,
            json_post("/save-device-data", request.clone(), Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Data saved");

        let (status, body, _) = send(&app, get_request("/get-device-data", Some(&cookie))).await;
        assert_eq!(status, StatusCode::OK);
        let row: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(row["blood_type"], json!("AB-"));
        assert_eq!(row["emergency_contact_phone"], json!("555-0102"));
        assert!(row["id"].is_i64());

        // The legacy save never upserts; a repeat collides with the
        // one-profile-per-user constraint
        let (status, body, _) = send(
            &app,
            json_post("/save-device-data", request, Some(&cookie)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let error: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(error["error"]["code"], json!("conflict"));
    }

    #[tokio::test]
    async fn test_sessions_are_per_user() {
        let (app, _) = test_app().await;
        let alice = signup_and_login(&app, "alice", "pw1").await;
        let bob = signup_and_login(&app, "bob", "pw2").await;

        send(
            &app,
            json_post("/save-medical-data", json!({"full_name": "Alice A"}), Some(&alice)),
        )
        .await;

        // Bob's session sees Bob's (empty) profile, not Alice's
        let (_, body, _) = send(&app, get_request("/get-medical-data", Some(&bob))).await;
        assert_eq!(body, b"null");
    }
}
