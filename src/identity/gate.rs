//! Session gate in front of every protected route.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::cookie::{parse_cookie, SESSION_COOKIE};
use super::session::{Session, SessionStore};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoToken,
    InvalidOrExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed(Session),
    Denied(DenyReason),
}

pub fn evaluate(store: &SessionStore, token: Option<&str>) -> GateDecision {
    match token {
        None | Some("") => GateDecision::Denied(DenyReason::NoToken),
        Some(t) => match store.validate(t) {
            Some(session) => GateDecision::Allowed(session),
            None => GateDecision::Denied(DenyReason::InvalidOrExpired),
        },
    }
}

/// Middleware: run the inner handler only with a live session, else redirect to login.
/// The validated [`Session`] is placed in the request extensions.
pub async fn require_session(State(store): State<Arc<SessionStore>>, mut req: Request, next: Next) -> Response {
    let token = parse_cookie(req.headers(), SESSION_COOKIE);
    match evaluate(&store, token.as_deref()) {
        GateDecision::Allowed(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        GateDecision::Denied(reason) => {
            debug!(target: "gate", path = %req.uri().path(), ?reason, "request denied");
            AppError::unauthenticated("login_required", "Login required").into_response()
        }
    }
}
