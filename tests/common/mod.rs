//! Shared fixtures for the dashboard integration suites.
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use mediagate::config::{PasswordSource, ServerConfig};
use mediagate::server::{router, AppState};

pub const USER: &str = "admin";
pub const PASSWORD: &str = "correct horse";

pub struct Harness {
    pub tmp: TempDir,
    pub root: PathBuf,
    pub state: AppState,
    pub app: Router,
}

/// Media root layout:
/// ```text
/// media/Photos/sunset.png   (real 64x32 PNG)
/// media/Photos/note.txt
/// media/Videos/clip.mp4
/// media/Docs/
/// outside/secret.txt        (sibling of the root, must stay unreachable)
/// ```
pub fn harness() -> Harness { harness_with(|s| s) }

pub fn harness_with(customize: impl FnOnce(AppState) -> AppState) -> Harness {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path().join("media");
    fs::create_dir_all(root.join("Photos")).unwrap();
    fs::create_dir_all(root.join("Videos")).unwrap();
    fs::create_dir_all(root.join("Docs")).unwrap();
    fs::create_dir_all(tmp.path().join("outside")).unwrap();
    fs::write(tmp.path().join("outside/secret.txt"), b"top secret").unwrap();
    fs::write(root.join("Photos/note.txt"), b"hello from the media root").unwrap();
    fs::write(root.join("Videos/clip.mp4"), vec![0u8; 2048]).unwrap();
    let png = image::RgbImage::from_fn(64, 32, |x, y| image::Rgb([x as u8 * 4, y as u8 * 8, 200]));
    png.save(root.join("Photos/sunset.png")).unwrap();

    let mut config = ServerConfig::with_defaults(&root, USER, PasswordSource::Plaintext(PASSWORD.to_string()));
    config.thumbnail_dir = tmp.path().join("thumbs");
    let state = customize(AppState::from_config(config).expect("state"));
    let app = router(state.clone());
    Harness { tmp, root, state, app }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    b.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut b = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    b.body(Body::from(body.to_string())).unwrap()
}

pub const BOUNDARY: &str = "mediagate-test-boundary";

pub fn multipart_upload(cookie: Option<&str>, folder_path: Option<&str>, file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(folder) = folder_path {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"folder_path\"\r\n\r\n{folder}\r\n").as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut b = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    b.body(Body::from(body)).unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("infallible")
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX).await.expect("body").to_vec()
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(resp).await).expect("json body")
}

pub fn location(resp: &Response<Body>) -> Option<String> {
    resp.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// `name=value` part of the session Set-Cookie header, ready to send back.
pub fn session_cookie_pair(resp: &Response<Body>) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session_token="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub async fn login(app: &Router) -> String {
    let resp = send(app, post_form("/login", None, &format!("username={USER}&password=correct+horse"))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    session_cookie_pair(&resp).expect("session cookie")
}
