//! Account endpoints and the session gate.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tokio::task;

use crate::auth::{hash_password, verify_password, AuthSession};
use crate::db::{CheckAuthResponse, LoginRequest, LoginResponse, SignupRequest, UserResponse};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};

/// Session token cookie name
pub const SESSION_COOKIE: &str = "vitalcard_session";

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

fn expired_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

/// Signup endpoint
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<&'static str, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if request.username.trim().is_empty() {
        errors.add("username", "Username is required");
    }
    if request.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.finish()?;

    // Hashing is CPU-bound; keep it off the async workers.
    let password = request.password;
    let password_hash = task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|_| ApiError::internal("Password hashing task failed"))?
        .map_err(|e| {
            tracing::error!("Failed to hash password: {}", e);
            ApiError::internal("Failed to hash password")
        })?;

    let user_id = state.users.create(&request.username, &password_hash).await?;
    tracing::info!(user_id, username = %request.username, "User registered");

    Ok("User registered")
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users
        .find_by_username(&request.username)
        .await?
        // Distinct messages for missing user vs bad password are kept from
        // the original service's behavior.
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    let password = request.password;
    let hash = user.password_hash.clone();
    let matches = task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|_| ApiError::internal("Password verification task failed"))?;

    if !matches {
        return Err(ApiError::unauthorized("Incorrect password"));
    }

    let token = state.sessions.create(user.id, &user.username).await?;
    let cookie = session_cookie(&token, state.sessions.ttl_seconds());

    tracing::info!(user_id = user.id, username = %user.username, "Login successful");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            message: "Login successful".to_string(),
            redirect_to: "/simulation.html".to_string(),
            user: UserResponse::from(user),
        }),
    ))
}

/// Logout endpoint. Not behind the session gate so that a repeated logout
/// with a stale cookie still succeeds.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy(cookie.value()).await?;
    }
    Ok(([(header::SET_COOKIE, expired_session_cookie())], "Logged out"))
}

/// Report whether the request carries a valid session, without rejecting.
pub async fn check_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<CheckAuthResponse>, ApiError> {
    let session = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.sessions.resolve(cookie.value()).await?,
        None => None,
    };

    let response = match session {
        Some(session) => CheckAuthResponse {
            authenticated: true,
            user: Some(UserResponse {
                id: session.user_id,
                username: session.username,
            }),
        },
        None => CheckAuthResponse {
            authenticated: false,
            user: None,
        },
    };
    Ok(Json(response))
}

/// Protected greeting route
pub async fn dashboard(Extension(session): Extension<AuthSession>) -> String {
    format!("Welcome, {}", session.username)
}

/// Middleware guarding the profile routes. Resolves the session cookie and
/// attaches the identity to the request; otherwise rejects with 401 before
/// any handler runs.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Not authorized"))?;

    let session = state
        .sessions
        .resolve(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Not authorized"))?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
