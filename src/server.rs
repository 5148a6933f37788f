//!
//! mediagate HTTP server
//! ---------------------
//! This module defines the Axum-based dashboard: a login-gated view over a single
//! media directory.
//!
//! Responsibilities:
//! - Cookie sessions backed by the in-memory `SessionStore`.
//! - Login/logout endpoints backed by an injected `CredentialStore`.
//! - Serving, downloading, thumbnailing and listing files strictly inside the media root.
//! - Uploads and folder creation under the media root.
//! - Host diagnostics and a service restart hook.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::config::ServerConfig;
use crate::confine::Confinement;
use crate::identity::{require_session, CredentialStore, SessionStore};
use crate::media::ThumbnailCache;
use crate::system::{ProcProbe, ServiceControl, SystemProbe, SystemctlControl};

pub mod api;
pub mod auth_routes;
pub mod client;
pub mod files;
pub(crate) mod pages;
pub mod timeouts;

pub use client::ClientInfo;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub sessions: Arc<SessionStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub confinement: Arc<Confinement>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub probe: Arc<dyn SystemProbe>,
    pub services: Arc<dyn ServiceControl>,
}

impl AppState {
    /// Production wiring. The media root must already exist; plaintext passwords are
    /// hashed here.
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let credentials = config.credentials().context("while building the login credential")?;
        let confinement = Confinement::new(&config.media_root)
            .with_context(|| format!("media root is not accessible: {}", config.media_root.display()))?;
        Ok(Self {
            sessions: Arc::new(SessionStore::new(config.session_ttl)),
            credentials: Arc::new(credentials),
            confinement: Arc::new(confinement),
            thumbnails: Arc::new(ThumbnailCache::new(config.thumbnail_dir.clone())),
            probe: Arc::new(ProcProbe::default()),
            services: Arc::new(SystemctlControl::default()),
            config: Arc::new(config),
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn SystemProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_services(mut self, services: Arc<dyn ServiceControl>) -> Self {
        self.services = services;
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }
}

/// Full route table. Everything except login, logout and the favicon sits behind
/// `require_session`.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/", get(pages::dashboard))
        .route("/file/{*path}", get(files::serve_file))
        .route("/api/download/{*path}", get(files::download_file))
        .route("/api/thumbnail/{*path}", get(files::thumbnail))
        .route("/api/folder-contents", get(api::folder_contents))
        .route("/api/upload", post(api::upload))
        .route("/api/create-folder", post(api::create_folder))
        .route("/api/diagnostics", get(api::diagnostics))
        .route("/api/restart-samba", post(api::restart_service))
        .route("/api/models", get(api::models))
        .route_layer(from_fn_with_state(state.sessions.clone(), require_session));

    let public = Router::new()
        .route("/login", get(pages::login_page).post(auth_routes::login))
        .route("/logout", get(auth_routes::logout).post(auth_routes::logout))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }));

    let body_limit = state.config.max_upload_bytes;
    protected
        .merge(public)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

fn log_startup_folders(config: &ServerConfig) {
    let cwd = std::env::current_dir().ok();
    let exe = std::env::current_exe().ok();
    info!(
        target: "startup",
        "mediagate starting. Folder configuration: cwd={:?}, exe={:?}, media_root={:?}, thumbnail_dir={:?}",
        cwd, exe, config.media_root, config.thumbnail_dir
    );
    info!(
        target: "startup",
        "Path existence: media_root_exists={}, thumbnail_dir_exists={}",
        config.media_root.exists(), config.thumbnail_dir.exists()
    );
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    log_startup_folders(&config);

    std::fs::create_dir_all(&config.media_root)
        .with_context(|| format!("Failed to create or access media root: {}", config.media_root.display()))?;
    std::fs::create_dir_all(&config.thumbnail_dir)
        .with_context(|| format!("Failed to create thumbnail dir: {}", config.thumbnail_dir.display()))?;

    let addr = config.socket_addr();
    let user = config.username.clone();
    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(target: "startup", "mediagate listening on http://{} (user '{}')", addr, user);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

pub(crate) async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(target: "startup", "shutdown requested");
    }
}
