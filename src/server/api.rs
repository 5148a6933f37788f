//! JSON endpoints behind the session gate.

use std::path::{Component, Path};

use axum::extract::{Multipart, Query, State};
use axum::Form;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::timeouts::{blocking_with_timeout, stat};
use super::AppState;
use crate::confine::to_slash_string;
use crate::error::{AppError, AppResult};
use crate::media::{folder_contents as list_folder, sanitize_file_name, store_upload, FolderContents};
use crate::system::{Diagnostics, ServiceError};

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    #[serde(default)]
    pub folder_path: String,
}

pub async fn folder_contents(State(state): State<AppState>, Query(q): Query<FolderQuery>) -> AppResult<Json<FolderContents>> {
    let target = state.confinement.resolve(&q.folder_path)?;
    let limit = state.config.io_timeout;
    match stat(limit, target.absolute()).await? {
        Some(m) if m.is_dir() => {}
        _ => return Err(AppError::not_found("folder_not_found", "Folder not found")),
    }
    let root = state.confinement.root().to_path_buf();
    let dir = target.absolute().to_path_buf();
    let contents = blocking_with_timeout(limit, "listing", move || Ok(list_folder(&dir, &root))).await?;
    Ok(Json(contents))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: String,
    pub message: String,
    pub file_path: String,
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::user("bad_multipart", e.body_text())
}

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<Json<UploadResponse>> {
    let mut folder_path = String::new();
    let mut file: Option<(String, axum::body::Bytes)> = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let raw_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_multipart)?;
                file = Some((raw_name, data));
            }
            "folder_path" => folder_path = field.text().await.map_err(bad_multipart)?,
            _ => {}
        }
    }
    let (raw_name, data) = file.ok_or_else(|| AppError::user("missing_file", "No file uploaded"))?;
    let file_name = sanitize_file_name(&raw_name)?;
    let folder = state.confinement.resolve(folder_path.trim())?;
    if let Some(m) = stat(state.config.io_timeout, folder.absolute()).await? {
        if !m.is_dir() {
            return Err(AppError::user("not_a_folder", "Upload target is not a folder"));
        }
    }

    let confinement = state.confinement.clone();
    let rel_folder = folder.relative_string();
    let name = file_name.clone();
    let ts = Utc::now().timestamp();
    let written = blocking_with_timeout(state.config.io_timeout, "upload", move || {
        std::fs::create_dir_all(folder.absolute())?;
        // re-check after creation: a component may have been swapped for a symlink
        let dir = confinement.resolve(&rel_folder)?;
        Ok(store_upload(dir.absolute(), &name, &data, ts)?)
    })
    .await?;

    let rel = written
        .strip_prefix(state.confinement.root())
        .map(to_slash_string)
        .unwrap_or_else(|_| file_name.clone());
    info!(target: "upload", path = %rel, "file uploaded");
    Ok(Json(UploadResponse {
        status: "success".to_string(),
        message: format!("File '{file_name}' uploaded successfully"),
        file_path: rel,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderForm {
    pub folder_name: String,
    #[serde(default)]
    pub parent_path: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateFolderResponse {
    pub status: String,
    pub message: String,
    pub folder_path: String,
}

/// A new folder name must be exactly one plain path component.
fn validate_folder_name(raw: &str) -> AppResult<&str> {
    let name = raw.trim();
    let invalid = || AppError::user("invalid_folder_name", format!("invalid folder name '{raw}'"));
    if name.is_empty() || name.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }
    let mut comps = Path::new(name).components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(invalid()),
    }
}

pub async fn create_folder(State(state): State<AppState>, Form(form): Form<CreateFolderForm>) -> AppResult<Json<CreateFolderResponse>> {
    let name = validate_folder_name(&form.folder_name)?.to_string();
    let parent = state.confinement.resolve(form.parent_path.trim())?;
    let joined = if parent.is_root() { name.clone() } else { format!("{}/{}", parent.relative_string(), name) };
    let target = state.confinement.resolve(&joined)?;
    let abs = target.absolute().to_path_buf();
    blocking_with_timeout(state.config.io_timeout, "create folder", move || Ok(std::fs::create_dir_all(&abs)?)).await?;
    info!(target: "upload", path = %target.relative_string(), "folder created");
    Ok(Json(CreateFolderResponse {
        status: "success".to_string(),
        message: format!("Folder '{name}' created successfully"),
        folder_path: target.relative_string(),
    }))
}

pub async fn diagnostics(State(state): State<AppState>) -> AppResult<Json<Diagnostics>> {
    let limit = state.config.io_timeout + state.probe.sampling_time();
    let snap = match tokio::time::timeout(limit, state.probe.snapshot(state.confinement.root())).await {
        Ok(r) => r.map_err(|e| {
            error!(target: "diagnostics", error = %e, "diagnostics probe failed");
            AppError::internal("diagnostics_failed", format!("Error getting diagnostics: {e}"))
        })?,
        Err(_) => {
            warn!(target: "diagnostics", ?limit, "diagnostics probe timed out");
            return Err(AppError::io("io_timeout", "diagnostics timed out"));
        }
    };
    Ok(Json(snap))
}

pub async fn restart_service(State(state): State<AppState>) -> Json<Value> {
    let service = state.config.service_name.as_str();
    let (status, message) = match state.services.restart(service, state.config.service_timeout).await {
        Ok(()) => ("success", format!("Service '{service}' restarted successfully")),
        Err(ServiceError::Timeout { .. }) => ("error", "Restart command timed out".to_string()),
        Err(ServiceError::Failed { stderr, .. }) => ("error", format!("Failed to restart '{service}': {stderr}")),
        Err(e @ ServiceError::Spawn(_)) => ("error", format!("Error restarting '{service}': {e}")),
    };
    Json(json!({ "status": status, "message": message }))
}

pub async fn models() -> Json<Value> {
    Json(json!({
        "models": ["System Monitor", "File Explorer", "Samba Service", "Thumbnail Generator"]
    }))
}
