//! Server-rendered HTML for the login page and the dashboard.

use axum::extract::{Query, State};
use axum::response::Html;
use axum::Extension;
use serde::Deserialize;

use super::timeouts::{blocking_with_timeout, stat};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::Session;
use crate::media::{directory_structure, folder_contents, FolderContents, FolderEntry, MediaKind};

pub(crate) const INVALID_LOGIN_MESSAGE: &str = "Invalid username or password. Please try again.";

const STYLE: &str = "body{font-family:sans-serif;margin:0;background:#f4f5f7;color:#222}\
header{background:#263238;color:#fff;padding:.6em 1em;display:flex;justify-content:space-between}\
header a{color:#cfd8dc}main{display:flex}nav{width:14em;padding:1em;background:#eceff1;min-height:90vh}\
section{flex:1;padding:1em}.grid{display:flex;flex-wrap:wrap;gap:1em}\
.card{width:210px;background:#fff;border-radius:4px;padding:.5em;box-shadow:0 1px 2px #0002;word-break:break-all}\
.card img{max-width:200px;max-height:200px}.err{color:#b00020}\
.login{max-width:22em;margin:6em auto;background:#fff;padding:2em;border-radius:4px}";

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode each segment of a relative path, keeping the `/` separators.
pub(crate) fn encode_path(rel: &str) -> String {
    rel.split('/').map(|s| urlencoding::encode(s).into_owned()).collect::<Vec<_>>().join("/")
}

pub(crate) struct LoginView<'a> {
    pub error: Option<&'a str>,
    pub username: &'a str,
    /// Where the form posts to.
    pub action: &'a str,
}

pub(crate) fn render_login(view: &LoginView<'_>) -> String {
    let error = view
        .error
        .map(|e| format!("<p class=\"err\">{}</p>", escape_html(e)))
        .unwrap_or_default();
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Media Dashboard - Login</title><style>{STYLE}</style></head>\
<body><div class=\"login\"><h2>Media Dashboard</h2>{error}\
<form method=\"post\" action=\"{action}\">\
<p><label>Username<br><input name=\"username\" value=\"{username}\" autofocus required></label></p>\
<p><label>Password<br><input type=\"password\" name=\"password\" required></label></p>\
<p><button type=\"submit\">Sign in</button></p></form></div></body></html>",
        action = escape_html(view.action),
        username = escape_html(view.username),
    )
}

pub(crate) struct DashboardView<'a> {
    pub username: &'a str,
    pub current_path: &'a str,
    pub tree: &'a [FolderEntry],
    pub contents: &'a FolderContents,
}

pub(crate) fn render_dashboard(view: &DashboardView<'_>) -> String {
    let mut tree = String::from("<ul><li><a href=\"/\">/</a></li>");
    for f in view.tree {
        tree.push_str(&format!(
            "<li><a href=\"/?path={}\">{}</a></li>",
            urlencoding::encode(&f.path),
            escape_html(&f.name)
        ));
    }
    tree.push_str("</ul>");

    let mut cards = String::new();
    for f in &view.contents.folders {
        cards.push_str(&format!(
            "<div class=\"card\"><a href=\"/?path={}\">&#128193; {}</a></div>",
            urlencoding::encode(&f.path),
            escape_html(&f.name)
        ));
    }
    for f in &view.contents.files {
        let enc = encode_path(&f.path);
        let preview = match f.kind {
            MediaKind::Image => format!("<img loading=\"lazy\" src=\"/api/thumbnail/{enc}\" alt=\"\">"),
            MediaKind::Video => format!("<video controls preload=\"none\" src=\"/file/{enc}\" width=\"200\"></video>"),
            MediaKind::Other => String::new(),
        };
        cards.push_str(&format!(
            "<div class=\"card\">{preview}<div><a href=\"/file/{enc}\">{name}</a></div>\
<small>{size} bytes</small> <a href=\"/api/download/{enc}\">download</a></div>",
            name = escape_html(&f.name),
            size = f.size,
        ));
    }
    if cards.is_empty() {
        cards.push_str("<p>This folder is empty.</p>");
    }

    let current = escape_html(view.current_path);
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Media Dashboard</title><style>{STYLE}</style></head>\
<body><header><span>Media Dashboard</span><span>{user} | <a href=\"/api/diagnostics\">diagnostics</a> | <a href=\"/logout\">logout</a></span></header>\
<main><nav>{tree}</nav><section><h3>/{current}</h3>\
<form method=\"post\" action=\"/api/upload\" enctype=\"multipart/form-data\">\
<input type=\"hidden\" name=\"folder_path\" value=\"{current}\"><input type=\"file\" name=\"file\" required> <button>Upload</button></form>\
<form method=\"post\" action=\"/api/create-folder\">\
<input type=\"hidden\" name=\"parent_path\" value=\"{current}\"><input name=\"folder_name\" placeholder=\"New folder\" required> <button>Create</button></form>\
<div class=\"grid\">{cards}</div></section></main></body></html>",
        user = escape_html(view.username),
    )
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub path: String,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(q): Query<DashboardQuery>,
) -> AppResult<Html<String>> {
    let target = state.confinement.resolve(&q.path)?;
    let limit = state.config.io_timeout;
    match stat(limit, target.absolute()).await? {
        Some(m) if m.is_dir() => {}
        _ => return Err(AppError::not_found("invalid_path", "Invalid path")),
    }
    let root = state.confinement.root().to_path_buf();
    let dir = target.absolute().to_path_buf();
    let (tree, contents) = blocking_with_timeout(limit, "listing", move || {
        Ok((directory_structure(&root), folder_contents(&dir, &root)))
    })
    .await?;
    let current = target.relative_string();
    Ok(Html(render_dashboard(&DashboardView {
        username: &session.username,
        current_path: &current,
        tree: &tree,
        contents: &contents,
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoginPageQuery {
    pub error: Option<String>,
}

pub async fn login_page(Query(q): Query<LoginPageQuery>) -> Html<String> {
    let error = q.error.as_deref().map(|_| INVALID_LOGIN_MESSAGE);
    Html(render_login(&LoginView { error, username: "", action: "/login" }))
}
