//! Decoy content. The login and dashboard markup is the real dashboard's, so the two
//! services are indistinguishable from the outside.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;

use crate::media::{content_type_for, FileEntry, FolderContents, FolderEntry, MediaKind};
use crate::server::pages::{escape_html, render_dashboard, render_login, DashboardView, LoginView, INVALID_LOGIN_MESSAGE};
use crate::system::{CpuStats, Diagnostics, UsageStats};

use super::store::AttackSummary;

pub fn fake_login(error: bool, username: &str) -> String {
    render_login(&LoginView { error: error.then_some(INVALID_LOGIN_MESSAGE), username, action: "/login" })
}

pub fn fake_dashboard() -> String {
    let folder = |name: &str| FolderEntry { name: name.to_string(), path: name.to_string(), kind: "folder".to_string() };
    let tree: Vec<FolderEntry> = ["Backups", "Documents", "Movies", "Music", "Photos"].into_iter().map(folder).collect();
    let file = |name: &str, kind: MediaKind, size: u64| FileEntry { name: name.to_string(), path: name.to_string(), kind, size };
    let contents = FolderContents {
        folders: tree.clone(),
        files: vec![
            file("family_2019.jpg", MediaKind::Image, 2_483_112),
            file("passwords_old.txt", MediaKind::Other, 1_204),
            file("wedding.mp4", MediaKind::Video, 734_003_200),
        ],
    };
    render_dashboard(&DashboardView { username: "admin", current_path: "", tree: &tree, contents: &contents })
}

/// Plausible numbers for a mid-range home server.
pub fn decoy_diagnostics() -> Diagnostics {
    Diagnostics {
        cpu: CpuStats { usage: 23.4 },
        memory: UsageStats { used: 6.2, total: 16.0, percent: 38.8 },
        disk: UsageStats { used: 892.1, total: 1863.2, percent: 47.9 },
    }
}

/// Grey-blue 200x150 JPEG handed out for every decoy image and thumbnail.
pub fn decoy_jpeg() -> Vec<u8> {
    let img = image::RgbImage::from_fn(200, 150, |x, y| image::Rgb([(x / 2) as u8 + 40, y as u8 + 60, 120]));
    let mut out = Vec::new();
    if JpegEncoder::new_with_quality(&mut out, 70).encode_image(&img).is_err() {
        out.clear();
    }
    out
}

/// Content type and stand-in bytes for a decoy file, chosen by extension.
pub fn decoy_file(name: &str) -> (&'static str, Vec<u8>) {
    let path = Path::new(name);
    match MediaKind::classify(path) {
        MediaKind::Image => ("image/jpeg", decoy_jpeg()),
        MediaKind::Video => (content_type_for(path), vec![0u8; 64 * 1024]),
        MediaKind::Other => (content_type_for(path), b"backup rotated 2019-03-02\nsee admin share\n".to_vec()),
    }
}

pub fn admin_panel(summary: &AttackSummary) -> String {
    let mut attempts = String::new();
    for a in &summary.login_attempts {
        attempts.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&a.timestamp),
            escape_html(&a.ip_address),
            escape_html(&a.username),
            escape_html(&a.password),
            escape_html(&a.user_agent),
            escape_html(&a.session_id),
        ));
    }
    let mut sessions = String::new();
    for s in &summary.sessions {
        sessions.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&s.session_id),
            escape_html(&s.ip_address),
            escape_html(&s.start_time),
            escape_html(&s.last_activity),
            s.total_requests,
            escape_html(&s.attack_type),
        ));
    }
    let st = &summary.stats;
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Honeypot admin</title>\
<style>body{{font-family:sans-serif}}table{{border-collapse:collapse}}td,th{{border:1px solid #ccc;padding:2px 6px}}</style></head><body>\
<h2>Honeypot</h2><p>Total attempts: {} | Unique attackers: {} | Active sessions: {}</p>\
<h3>Recent login attempts</h3><table><tr><th>Time</th><th>IP</th><th>Username</th><th>Password</th><th>User agent</th><th>Session</th></tr>{attempts}</table>\
<h3>Sessions</h3><table><tr><th>Session</th><th>IP</th><th>Start</th><th>Last activity</th><th>Requests</th><th>Last type</th></tr>{sessions}</table>\
</body></html>",
        st.total_attempts, st.unique_attackers, st.active_sessions,
    )
}
