use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tracing::{info, warn};

use super::client::ClientInfo;
use super::AppState;
use crate::error::{AppError, AppResult, LOGIN_PATH};
use crate::identity::{clear_session_cookie, parse_cookie, session_cookie, SESSION_COOKIE};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let creds = state.credentials.clone();
    let username = form.username.clone();
    // argon2 is deliberately slow; keep it off the async workers
    let ok = tokio::task::spawn_blocking(move || creds.verify(&username, &form.password))
        .await
        .map_err(|e| AppError::internal("task_failed", e.to_string()))?;
    if !ok {
        warn!(target: "auth", user = %form.username, ip = %client.ip(), "failed login");
        return Ok(Redirect::to("/login?error=invalid").into_response());
    }
    let token = state.sessions.create(&form.username)?;
    let secure = state.config.cookie_security.is_secure(&headers);
    let cookie = session_cookie(&token, state.sessions.ttl_secs(), secure)?;
    info!(target: "auth", user = %form.username, ip = %client.ip(), "login");
    Ok(([(SET_COOKIE, cookie)], Redirect::to("/")).into_response())
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = parse_cookie(&headers, SESSION_COOKIE) {
        state.sessions.revoke(&token);
    }
    let secure = state.config.cookie_security.is_secure(&headers);
    ([(SET_COOKIE, clear_session_cookie(secure))], Redirect::to(LOGIN_PATH)).into_response()
}
