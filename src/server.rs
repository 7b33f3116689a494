//!
//! profilium HTTP server
//! ---------------------
//! This module defines the Axum-based HTTP API for the profile service.
//!
//! Responsibilities:
//! - Session management with an HttpOnly cookie model.
//! - Login/logout endpoints backed by the `security` module.
//! - Profile read and deep-merge update endpoints.
//! - Admin-only user directory listing.
//! - Router construction and server bootstrap.

use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::AppError;
use crate::merge::{self, ProfileMap};
use crate::session::{SessionHandle, SessionStore};
use crate::{directory, security};

const SESSION_COOKIE: &str = "profilium_session";

/// Shared server state injected into all handlers.
///
/// Holds the session store handle. The user directory and the shared
/// ancestor table are process statics and need no injection.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new() -> Self {
        Self { sessions: SessionStore::new() }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    // Option so the handler itself can answer missing fields with 400
    // instead of a framework rejection.
    username: Option<String>,
    password: Option<String>,
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn set_session_cookie(sid: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict. The service is
    // served over plain HTTP, so no Secure attribute.
    HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE, sid)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Strict; Path=/", SESSION_COOKIE)).unwrap()
}

fn session_from_headers(state: &AppState, headers: &HeaderMap) -> Option<SessionHandle> {
    let sid = parse_cookie(headers, SESSION_COOKIE)?;
    state.sessions.get(&sid)
}

fn status_of(err: &AppError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_body(err: &AppError) -> Value {
    json!({"error": err.label(), "message": err.message()})
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        let err = AppError::missing_credentials("Username and password are required");
        return (status_of(&err), HeaderMap::new(), Json(error_body(&err)));
    }
    match security::create_session(&state.sessions, &username, &password) {
        Ok(session) => {
            info!("login ok user={} admin={}", username, session.is_admin);
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&session.id));
            (StatusCode::OK, headers, Json(json!({
                "message": "Login successful",
                "user": session.public_view(),
            })))
        }
        Err(err) => {
            info!("login rejected user={}", username);
            (status_of(&err), HeaderMap::new(), Json(error_body(&err)))
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(handle) = session_from_headers(&state, &headers) else {
        let err = AppError::unauthenticated("Not authenticated");
        return (status_of(&err), HeaderMap::new(), Json(error_body(&err)));
    };
    let sid = handle.lock().id.clone();
    state.sessions.remove(&sid);
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"message": "Logged out"})))
}

async fn profile(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let handle = session_from_headers(&state, &headers);
    let guard = handle.as_ref().map(|h| h.lock());
    match security::require_authenticated(guard.as_deref()) {
        Ok(session) => (StatusCode::OK, Json(json!({
            "message": "User profile",
            "user": session.public_view(),
        }))),
        Err(err) => (status_of(&err), Json(error_body(&err))),
    }
}

async fn update_profile(State(state): State<AppState>, headers: HeaderMap, Json(updates): Json<Value>) -> impl IntoResponse {
    let Some(handle) = session_from_headers(&state, &headers) else {
        let err = AppError::unauthenticated("Not authenticated");
        return (status_of(&err), Json(error_body(&err)));
    };
    // Read-merge-write happens entirely under this session's lock.
    let mut session = handle.lock();
    let base = Value::Object(session.profile.clone());
    match merge::merge(ProfileMap::new(), &[&base, &updates]) {
        Ok(merged) => {
            session.profile = merged;
            if security::apply_escalation(&mut session, &updates) {
                info!("profile update escalated user={}", session.username);
            }
            (StatusCode::OK, Json(json!({
                "message": "Profile updated successfully",
                "profile": Value::Object(session.profile.clone()),
                "user": session.public_view(),
                "success": true,
            })))
        }
        Err(e) => {
            // Failure is reported in-band; the raw payload check still runs.
            security::apply_payload_escalation(&mut session, &updates);
            error!("profile update failed user={}: {}", session.username, e);
            let err = AppError::from(e);
            (status_of(&err), Json(json!({
                "message": "Profile update failed",
                "error": err.message(),
                "user": {
                    "username": session.username,
                    "isAdmin": session.is_admin,
                },
                "success": false,
            })))
        }
    }
}

async fn admin_users(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let handle = session_from_headers(&state, &headers);
    let guard = handle.as_ref().map(|h| h.lock());
    match security::require_admin(guard.as_deref()) {
        Ok(session) => {
            let dir = directory::global();
            (StatusCode::OK, Json(json!({
                "message": "User list retrieved successfully",
                "users": dir.wire_map(),
                "totalUsers": dir.len(),
                "requestedBy": session.username,
            })))
        }
        Err(err) => {
            let mut body = error_body(&err);
            // A present but non-admin session also reports its flag.
            if let (Some(obj), Some(session)) = (body.as_object_mut(), guard.as_deref()) {
                obj.insert("isAdmin".into(), json!(session.is_admin));
            }
            (status_of(&err), Json(body))
        }
    }
}

/// Mount all routes over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "profilium ok" }))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(profile))
        .route("/update-profile", post(update_profile))
        .route("/admin/users", get(admin_users))
        .with_state(state)
}

/// Start the profilium HTTP server bound to the given port.
pub async fn run_with_port(http_port: u16) -> anyhow::Result<()> {
    let state = AppState::new();
    info!("directory users={}", directory::global().len());

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point using the default port.
pub async fn run() -> anyhow::Result<()> {
    run_with_port(3206).await
}
