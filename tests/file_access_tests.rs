//! Confined file access through the HTTP surface: serving, downloads, thumbnails,
//! listings, uploads and folder creation.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::{header, StatusCode};

use common::*;
use mediagate::system::{CpuStats, Diagnostics, ServiceControl, ServiceError, StaticProbe, SystemProbe, UsageStats};

#[tokio::test]
async fn traversal_is_rejected_with_or_without_session() -> Result<()> {
    let h = harness();
    let cookie = login(&h.app).await;
    let attacks = [
        "/file/..%2F..%2Fetc%2Fpasswd",
        "/file/..%2Foutside%2Fsecret.txt",
        "/file/Photos%2F..%2F..%2Foutside%2Fsecret.txt",
        "/api/download/..%2Foutside%2Fsecret.txt",
        "/api/thumbnail/..%2Foutside%2Fsecret.txt",
        "/api/folder-contents?folder_path=..%2F..",
        "/api/folder-contents?folder_path=%2Fetc",
    ];
    for uri in attacks {
        let authed = send(&h.app, get(uri, Some(&cookie))).await;
        assert_eq!(authed.status(), StatusCode::FORBIDDEN, "{uri}");
        let body = body_json(authed).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "path_escape");

        let anon = send(&h.app, get(uri, None)).await;
        assert_eq!(anon.status(), StatusCode::SEE_OTHER, "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn serves_file_inline() -> Result<()> {
    let h = harness();
    let cookie = login(&h.app).await;
    let resp = send(&h.app, get("/file/Photos/note.txt", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/plain; charset=utf-8");
    assert_eq!(resp.headers().get(header::CONTENT_LENGTH).unwrap(), "25");
    assert!(resp.headers().get(header::CONTENT_DISPOSITION).is_none());
    assert_eq!(body_bytes(resp).await, b"hello from the media root");

    let video = send(&h.app, get("/file/Videos/clip.mp4", Some(&cookie))).await;
    assert_eq!(video.headers().get(header::CONTENT_TYPE).unwrap(), "video/mp4");
    assert_eq!(body_bytes(video).await.len(), 2048);
    Ok(())
}

#[tokio::test]
async fn download_sets_attachment() -> Result<()> {
    let h = harness();
    let cookie = login(&h.app).await;
    let resp = send(&h.app, get("/api/download/Photos/note.txt", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disp = resp.headers().get(header::CONTENT_DISPOSITION).unwrap().to_str()?.to_string();
    assert!(disp.starts_with("attachment; filename=\"note.txt\""), "{disp}");
    assert_eq!(body_bytes(resp).await, b"hello from the media root");

    let dir = send(&h.app, get("/api/download/Photos", Some(&cookie))).await;
    assert_eq!(dir.status(), StatusCode::BAD_REQUEST);
    let missing = send(&h.app, get("/api/download/Photos/nope.txt", Some(&cookie))).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn thumbnails_and_fallback() -> Result<()> {
    let h = harness();
    let cookie = login(&h.app).await;
    let thumb = send(&h.app, get("/api/thumbnail/Photos/sunset.png", Some(&cookie))).await;
    assert_eq!(thumb.status(), StatusCode::OK);
    assert_eq!(thumb.headers().get(header::CONTENT_TYPE).unwrap(), "image/jpeg");
    let bytes = body_bytes(thumb).await;
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    assert_eq!(fs::read_dir(h.tmp.path().join("thumbs"))?.count(), 1);

    let original = send(&h.app, get("/api/thumbnail/Photos/note.txt", Some(&cookie))).await;
    assert_eq!(original.status(), StatusCode::OK);
    assert_eq!(body_bytes(original).await, b"hello from the media root");

    let missing = send(&h.app, get("/api/thumbnail/Photos/gone.png", Some(&cookie))).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn folder_listing_json() -> Result<()> {
    let h = harness();
    let cookie = login(&h.app).await;
    let root = body_json(send(&h.app, get("/api/folder-contents", Some(&cookie))).await).await;
    let names: Vec<_> = root["folders"].as_array().unwrap().iter().map(|f| f["name"].as_str().unwrap().to_string()).collect();
    assert_eq!(names, vec!["Docs", "Photos", "Videos"]);

    let photos = body_json(send(&h.app, get("/api/folder-contents?folder_path=Photos", Some(&cookie))).await).await;
    let files = photos["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["name"], "note.txt");
    assert_eq!(files[0]["type"], "other");
    assert_eq!(files[0]["size"], 25);
    assert_eq!(files[1]["path"], "Photos/sunset.png");
    assert_eq!(files[1]["type"], "image");

    let missing = send(&h.app, get("/api/folder-contents?folder_path=Nope", Some(&cookie))).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let file = send(&h.app, get("/api/folder-contents?folder_path=Photos%2Fnote.txt", Some(&cookie))).await;
    assert_eq!(file.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn upload_never_overwrites() -> Result<()> {
    let h = harness();
    let cookie = login(&h.app).await;

    let first = body_json(send(&h.app, multipart_upload(Some(&cookie), Some("Docs"), "x.txt", b"first")).await).await;
    assert_eq!(first["status"], "success");
    assert_eq!(first["file_path"], "Docs/x.txt");

    let second = body_json(send(&h.app, multipart_upload(Some(&cookie), Some("Docs"), "x.txt", b"second")).await).await;
    let renamed = second["file_path"].as_str().unwrap().to_string();
    let ts = renamed.strip_prefix("Docs/x_").and_then(|r| r.strip_suffix(".txt")).expect("timestamped name");
    assert!(!ts.is_empty() && ts.chars().all(|c| c.is_ascii_digit()), "{renamed}");

    assert_eq!(fs::read(h.root.join("Docs/x.txt"))?, b"first");
    assert_eq!(fs::read(h.root.join(&renamed))?, b"second");
    Ok(())
}

#[tokio::test]
async fn upload_creates_missing_folder_and_strips_client_paths() -> Result<()> {
    let h = harness();
    let cookie = login(&h.app).await;

    let nested = body_json(send(&h.app, multipart_upload(Some(&cookie), Some("New/Deeper"), "a.bin", b"abc")).await).await;
    assert_eq!(nested["file_path"], "New/Deeper/a.bin");
    assert_eq!(fs::read(h.root.join("New/Deeper/a.bin"))?, b"abc");

    let root = body_json(send(&h.app, multipart_upload(Some(&cookie), None, "../../evil.txt", b"e")).await).await;
    assert_eq!(root["file_path"], "evil.txt");
    assert!(h.root.join("evil.txt").exists());
    assert!(!h.tmp.path().join("evil.txt").exists());
    Ok(())
}

#[tokio::test]
async fn upload_outside_root_is_denied() -> Result<()> {
    let h = harness();
    let cookie = login(&h.app).await;
    let resp = send(&h.app, multipart_upload(Some(&cookie), Some("../outside"), "drop.txt", b"x")).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(!h.tmp.path().join("outside/drop.txt").exists());

    let bad_name = send(&h.app, multipart_upload(Some(&cookie), Some("Docs"), "..", b"x")).await;
    assert_eq!(bad_name.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn create_folder_inside_root_only() -> Result<()> {
    let h = harness();
    let cookie = login(&h.app).await;

    let ok = send(&h.app, post_form("/api/create-folder", Some(&cookie), "folder_name=Trips&parent_path=Photos")).await;
    assert_eq!(ok.status(), StatusCode::OK);
    let body = body_json(ok).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["folder_path"], "Photos/Trips");
    assert!(h.root.join("Photos/Trips").is_dir());

    let top = body_json(send(&h.app, post_form("/api/create-folder", Some(&cookie), "folder_name=Top")).await).await;
    assert_eq!(top["folder_path"], "Top");

    for bad in ["folder_name=..", "folder_name=a%2Fb", "folder_name=", "folder_name=."] {
        let resp = send(&h.app, post_form("/api/create-folder", Some(&cookie), bad)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{bad}");
    }
    let escape = send(&h.app, post_form("/api/create-folder", Some(&cookie), "folder_name=x&parent_path=..%2Foutside")).await;
    assert_eq!(escape.status(), StatusCode::FORBIDDEN);
    assert!(!h.tmp.path().join("outside/x").exists());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_out_of_root_is_denied() -> Result<()> {
    let h = harness();
    std::os::unix::fs::symlink(h.tmp.path().join("outside"), h.root.join("escape"))?;
    let cookie = login(&h.app).await;
    for uri in ["/file/escape/secret.txt", "/api/download/escape/secret.txt", "/api/folder-contents?folder_path=escape"] {
        let resp = send(&h.app, get(uri, Some(&cookie))).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{uri}");
    }
    let upload = send(&h.app, multipart_upload(Some(&cookie), Some("escape/sub"), "x.txt", b"x")).await;
    assert_eq!(upload.status(), StatusCode::FORBIDDEN);
    assert!(!h.tmp.path().join("outside/sub").exists());
    Ok(())
}

fn fixed_diagnostics() -> Diagnostics {
    Diagnostics {
        cpu: CpuStats { usage: 12.5 },
        memory: UsageStats { used: 3.25, total: 8.0, percent: 40.6 },
        disk: UsageStats { used: 100.0, total: 400.0, percent: 25.0 },
    }
}

#[tokio::test]
async fn diagnostics_and_models() -> Result<()> {
    let h = harness_with(|s| s.with_probe(Arc::new(StaticProbe(fixed_diagnostics()))));
    let cookie = login(&h.app).await;
    let d = body_json(send(&h.app, get("/api/diagnostics", Some(&cookie))).await).await;
    assert_eq!(d["cpu"]["usage"], 12.5);
    assert_eq!(d["memory"]["total"], 8.0);
    assert_eq!(d["disk"]["percent"], 25.0);

    let m = body_json(send(&h.app, get("/api/models", Some(&cookie))).await).await;
    assert_eq!(m["models"].as_array().unwrap().len(), 4);
    Ok(())
}

struct FakeServices {
    outcome: fn(&str, Duration) -> Result<(), ServiceError>,
}

#[async_trait]
impl ServiceControl for FakeServices {
    async fn restart(&self, service: &str, timeout: Duration) -> Result<(), ServiceError> { (self.outcome)(service, timeout) }
}

#[tokio::test]
async fn restart_reports_success_and_failure() -> Result<()> {
    let ok = harness_with(|s| s.with_services(Arc::new(FakeServices { outcome: |_, _| Ok(()) })));
    let cookie = login(&ok.app).await;
    let resp = send(&ok.app, post_form("/api/restart-samba", Some(&cookie), "")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "success");

    let failing = harness_with(|s| {
        s.with_services(Arc::new(FakeServices {
            outcome: |service, _| Err(ServiceError::Failed { service: service.to_string(), stderr: "sudo: a password is required".into() }),
        }))
    });
    let cookie = login(&failing.app).await;
    let resp = send(&failing.app, post_form("/api/restart-samba", Some(&cookie), "")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("password is required"));

    let slow = harness_with(|s| {
        s.with_services(Arc::new(FakeServices {
            outcome: |service, after| Err(ServiceError::Timeout { service: service.to_string(), after }),
        }))
    });
    let cookie = login(&slow.app).await;
    let body = body_json(send(&slow.app, post_form("/api/restart-samba", Some(&cookie), "")).await).await;
    assert_eq!(body["message"], "Restart command timed out");
    Ok(())
}

struct StalledProbe;

#[async_trait]
impl SystemProbe for StalledProbe {
    async fn snapshot(&self, _disk_path: &std::path::Path) -> Result<Diagnostics> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(fixed_diagnostics())
    }
}

#[tokio::test]
async fn stalled_diagnostics_probe_times_out() -> Result<()> {
    let h = harness_with(|mut s| {
        let mut config = (*s.config).clone();
        config.io_timeout = Duration::from_millis(200);
        s.config = Arc::new(config);
        s.with_probe(Arc::new(StalledProbe))
    });
    let cookie = login(&h.app).await;
    let resp = tokio::time::timeout(Duration::from_secs(5), send(&h.app, get("/api/diagnostics", Some(&cookie))))
        .await
        .expect("diagnostics must answer within its deadline");
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await["code"], "io_timeout");
    Ok(())
}

#[tokio::test]
async fn active_content_is_sandboxed() -> Result<()> {
    let h = harness();
    fs::write(h.root.join("Docs/page.html"), b"<script>fetch('/api/restart-samba',{method:'POST'})</script>")?;
    fs::write(h.root.join("Docs/logo.svg"), b"<svg xmlns=\"http://www.w3.org/2000/svg\"><script>alert(1)</script></svg>")?;
    let cookie = login(&h.app).await;
    for uri in ["/file/Docs/page.html", "/file/Docs/logo.svg", "/file/Photos/note.txt", "/api/download/Docs/page.html"] {
        let resp = send(&h.app, get(uri, Some(&cookie))).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        assert_eq!(resp.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff", "{uri}");
        assert_eq!(resp.headers().get(header::CONTENT_SECURITY_POLICY).unwrap(), "sandbox", "{uri}");
    }
    Ok(())
}
