use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Request, State};
use axum::http::{header, Uri};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;
use tracing::{info, warn};

use super::pages;
use super::store::{AttackEvent, AttackLog, AttackSummary};
use crate::config::HoneypotConfig;
use crate::error::{AppError, AppResult};
use crate::server::files::attachment_disposition;
use crate::server::ClientInfo;
use crate::system::Diagnostics;

const RECENT_LOGINS: usize = 50;
const RECENT_SESSIONS: usize = 20;

#[derive(Clone)]
pub struct HoneypotState {
    pub log: Arc<AttackLog>,
}

impl HoneypotState {
    pub fn new(log: AttackLog) -> Self { Self { log: Arc::new(log) } }

    /// Store an event off the async workers; failures are logged, never surfaced to the visitor.
    async fn record(&self, event: AttackEvent) {
        let log = self.log.clone();
        match tokio::task::spawn_blocking(move || log.record(&event)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(target: "honeypot", error = %e, "failed to record event"),
            Err(e) => warn!(target: "honeypot", error = %e, "record task failed"),
        }
    }

    async fn summary(&self) -> AppResult<AttackSummary> {
        let log = self.log.clone();
        tokio::task::spawn_blocking(move || log.summary(RECENT_LOGINS, RECENT_SESSIONS))
            .await
            .map_err(|e| AppError::internal("task_failed", e.to_string()))?
            .map_err(|e| AppError::internal("attack_log", e.to_string()))
    }
}

pub fn router(state: HoneypotState) -> Router {
    Router::new()
        .route("/", get(fake_login_page))
        .route("/login", get(fake_login_page).post(fake_login))
        .route("/dashboard", get(fake_dashboard))
        .route("/api/diagnostics", get(fake_diagnostics))
        .route("/file/{*path}", get(fake_file))
        .route("/api/download/{*path}", get(fake_download))
        .route("/api/thumbnail/{*path}", get(fake_thumbnail))
        .route("/honeypot/admin", get(admin_panel))
        .route("/honeypot/api/attacks", get(attacks))
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

/// Every request, whatever its route, is filed as a page visit first.
async fn log_requests(State(state): State<HoneypotState>, client: ClientInfo, req: Request, next: Next) -> Response {
    let headers: BTreeMap<String, String> = req
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).to_string()))
        .collect();
    let event = AttackEvent::page_visit(client.ip(), client.user_agent.clone(), req.method().as_str(), req.uri().path(), headers);
    state.record(event).await;
    next.run(req).await
}

async fn fake_login_page() -> Html<String> { Html(pages::fake_login(false, "")) }

#[derive(Debug, Deserialize)]
struct FakeLoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn fake_login(State(state): State<HoneypotState>, client: ClientInfo, Form(form): Form<FakeLoginForm>) -> Html<String> {
    info!(target: "honeypot", ip = %client.ip(), user = %form.username, "captured login attempt");
    state
        .record(AttackEvent::login_attempt(client.ip(), client.user_agent.clone(), &form.username, &form.password))
        .await;
    Html(pages::fake_login(true, &form.username))
}

async fn fake_dashboard(State(state): State<HoneypotState>, client: ClientInfo) -> Html<String> {
    state.record(AttackEvent::dashboard_access(client.ip(), client.user_agent.clone())).await;
    Html(pages::fake_dashboard())
}

async fn fake_diagnostics(State(state): State<HoneypotState>, client: ClientInfo) -> Json<Diagnostics> {
    state.record(AttackEvent::api_access(client.ip(), client.user_agent.clone(), "/api/diagnostics")).await;
    Json(pages::decoy_diagnostics())
}

async fn decoy_response(state: &HoneypotState, client: &ClientInfo, uri: &Uri, content_type: &'static str, bytes: Vec<u8>) -> Response {
    state.record(AttackEvent::api_access(client.ip(), client.user_agent.clone(), uri.path())).await;
    ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
}

async fn fake_file(State(state): State<HoneypotState>, client: ClientInfo, uri: Uri, Path(path): Path<String>) -> Response {
    let (content_type, bytes) = pages::decoy_file(&path);
    decoy_response(&state, &client, &uri, content_type, bytes).await
}

async fn fake_download(State(state): State<HoneypotState>, client: ClientInfo, uri: Uri, Path(path): Path<String>) -> Response {
    let (content_type, bytes) = pages::decoy_file(&path);
    let name = path.rsplit('/').next().unwrap_or("download");
    let mut resp = decoy_response(&state, &client, &uri, content_type, bytes).await;
    resp.headers_mut().insert(header::CONTENT_DISPOSITION, attachment_disposition(name));
    resp
}

async fn fake_thumbnail(State(state): State<HoneypotState>, client: ClientInfo, uri: Uri) -> Response {
    decoy_response(&state, &client, &uri, "image/jpeg", pages::decoy_jpeg()).await
}

fn local_only(client: &ClientInfo) -> AppResult<()> {
    if client.is_loopback() { Ok(()) } else { Err(AppError::not_found("not_found", "Not found")) }
}

async fn admin_panel(State(state): State<HoneypotState>, client: ClientInfo) -> AppResult<Html<String>> {
    local_only(&client)?;
    Ok(Html(pages::admin_panel(&state.summary().await?)))
}

async fn attacks(State(state): State<HoneypotState>, client: ClientInfo) -> AppResult<Json<AttackSummary>> {
    local_only(&client)?;
    Ok(Json(state.summary().await?))
}

async fn not_found() -> Response { AppError::not_found("not_found", "Not found").into_response() }

pub async fn run(config: HoneypotConfig) -> anyhow::Result<()> {
    info!(target: "startup", "honeypot starting. data_dir={:?}", config.data_dir);
    let log = AttackLog::open(&config.data_dir)
        .with_context(|| format!("While opening attack log under {}", config.data_dir.display()))?;
    let app = router(HoneypotState::new(log));
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(target: "startup", "honeypot listening on http://{}; admin panel at http://localhost:{}/honeypot/admin", addr, addr.port());
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(crate::server::shutdown_signal())
        .await
        .context("honeypot server error")?;
    Ok(())
}
