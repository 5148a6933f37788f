//! Unified application error model and HTTP mapping helpers.
//! Every handler returns `AppResult<T>`; the error carries a stable machine code plus a
//! human readable message and renders itself as a JSON body (or, for
//! `Unauthenticated`, as a redirect to the login page).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Login entry point that unauthenticated requests are sent to.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    AccessDenied { code: String, message: String },
    NotFound { code: String, message: String },
    Unauthenticated { code: String, message: String },
    Upstream { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::AccessDenied { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Unauthenticated { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::AccessDenied { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Unauthenticated { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn access_denied(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::AccessDenied { code: code.into(), message: msg.into() } }
    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn unauthenticated(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Unauthenticated { code: code.into(), message: msg.into() } }
    pub fn upstream(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn io(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::AccessDenied { .. } => 403,
            AppError::NotFound { .. } => 404,
            // Rendered as a redirect; 401 is only reported for non-HTTP consumers.
            AppError::Unauthenticated { .. } => 401,
            AppError::Upstream { .. } => 502,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(app) = err.downcast_ref::<AppError>() {
            return app.clone();
        }
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::not_found("not_found", "File not found"),
            std::io::ErrorKind::PermissionDenied => AppError::access_denied("permission_denied", err.to_string()),
            _ => AppError::io("io_error", err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Unauthenticated { .. } = self {
            return Redirect::to(LOGIN_PATH).into_response();
        }
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "status": "error",
            "code": self.code_str(),
            "message": self.message(),
        });
        (status, Json(body)).into_response()
    }
}
