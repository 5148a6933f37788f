//! Process configuration for both binaries.
//!
//! Precedence is CLI flag > `MEDIAGATE_*` environment variable > built-in default.
//! The password is only ever read from the environment so it never shows up in `ps`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::error::AppResult;
use crate::identity::{CookieSecurity, SingleCredential, SESSION_TTL};

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_HONEYPOT_PORT: u16 = 8001;
pub const DEFAULT_MEDIA_ROOT: &str = "/media/mint/shared";
pub const DEFAULT_THUMBNAIL_DIR: &str = "thumbnails";
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_SERVICE_NAME: &str = "smbd";
pub const DEFAULT_HONEYPOT_DATA: &str = "honeypot_data";

const DEFAULT_SERVICE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_UPLOAD_MB: usize = 512;

pub const SERVER_USAGE: &str = "mediagate\n\nUSAGE:\n  mediagate [--http-port N] [--bind ADDR] [--media-root PATH] [--thumbnail-dir PATH] [--username U] [--service-name NAME]\n\nOPTIONS:\n  --http-port N          Port for the dashboard (env MEDIAGATE_HTTP_PORT, default: 8000)\n  --bind ADDR            Listen address (env MEDIAGATE_BIND, default: 0.0.0.0)\n  --media-root PATH      Directory served by the dashboard (env MEDIAGATE_MEDIA_ROOT, default: /media/mint/shared)\n  --thumbnail-dir PATH   Thumbnail cache directory (env MEDIAGATE_THUMBNAIL_DIR, default: thumbnails)\n  --username U           Dashboard login name (env MEDIAGATE_USERNAME, default: admin)\n  --service-name NAME    Service restarted from the dashboard (env MEDIAGATE_SERVICE_NAME, default: smbd)\n\nENVIRONMENT:\n  MEDIAGATE_PASSWORD_HASH   Argon2 PHC string for the login password\n  MEDIAGATE_PASSWORD        Plaintext password, hashed at startup (used when no hash is set)\n  MEDIAGATE_SESSION_TTL_SECS, MEDIAGATE_COOKIE_SECURE (auto|always|never),\n  MEDIAGATE_SERVICE_TIMEOUT_SECS, MEDIAGATE_IO_TIMEOUT_SECS, MEDIAGATE_MAX_UPLOAD_MB\n  RUST_LOG                  Log filter (default: info)\n";

pub const HONEYPOT_USAGE: &str = "mediagate_honeypot\n\nUSAGE:\n  mediagate_honeypot [--port N] [--bind ADDR] [--data-dir PATH]\n\nOPTIONS:\n  --port N          Port for the decoy dashboard (env MEDIAGATE_HONEYPOT_PORT, default: 8001)\n  --bind ADDR       Listen address (env MEDIAGATE_BIND, default: 0.0.0.0)\n  --data-dir PATH   Attack database and log directory (env MEDIAGATE_HONEYPOT_DATA, default: honeypot_data)\n";

/// Where the login password comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum PasswordSource {
    Plaintext(String),
    Phc(String),
}

impl std::fmt::Debug for PasswordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordSource::Plaintext(_) => f.write_str("Plaintext(<redacted>)"),
            PasswordSource::Phc(_) => f.write_str("Phc(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub http_port: u16,
    pub media_root: PathBuf,
    pub thumbnail_dir: PathBuf,
    pub username: String,
    pub password: PasswordSource,
    pub session_ttl: Duration,
    pub cookie_security: CookieSecurity,
    pub service_name: String,
    pub service_timeout: Duration,
    pub io_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Defaults for everything except the three things a deployment must decide.
    pub fn with_defaults(media_root: impl Into<PathBuf>, username: impl Into<String>, password: PasswordSource) -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            http_port: DEFAULT_HTTP_PORT,
            media_root: media_root.into(),
            thumbnail_dir: PathBuf::from(DEFAULT_THUMBNAIL_DIR),
            username: username.into(),
            password,
            session_ttl: SESSION_TTL,
            cookie_security: CookieSecurity::Auto,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_timeout: Duration::from_secs(DEFAULT_SERVICE_TIMEOUT_SECS),
            io_timeout: Duration::from_secs(DEFAULT_IO_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }

    pub fn from_env_and_args(args: &[String]) -> Result<Self> {
        Self::resolve(args, |name| std::env::var(name).ok())
    }

    pub fn resolve(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let password = match (env("MEDIAGATE_PASSWORD_HASH"), env("MEDIAGATE_PASSWORD")) {
            (Some(phc), _) if !phc.trim().is_empty() => PasswordSource::Phc(phc.trim().to_string()),
            (_, Some(pw)) if !pw.is_empty() => PasswordSource::Plaintext(pw),
            _ => bail!("no login password configured: set MEDIAGATE_PASSWORD_HASH or MEDIAGATE_PASSWORD"),
        };

        let media_root = setting(args, "--media-root", &env, "MEDIAGATE_MEDIA_ROOT").unwrap_or_else(|| DEFAULT_MEDIA_ROOT.to_string());
        let username = setting(args, "--username", &env, "MEDIAGATE_USERNAME").unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        let mut cfg = Self::with_defaults(media_root, username, password);

        if let Some(b) = setting(args, "--bind", &env, "MEDIAGATE_BIND") {
            cfg.bind = parse_bind(&b)?;
        }
        if let Some(p) = setting(args, "--http-port", &env, "MEDIAGATE_HTTP_PORT") {
            cfg.http_port = parse_port(&p)?;
        }
        if let Some(t) = setting(args, "--thumbnail-dir", &env, "MEDIAGATE_THUMBNAIL_DIR") {
            cfg.thumbnail_dir = PathBuf::from(t);
        }
        if let Some(s) = setting(args, "--service-name", &env, "MEDIAGATE_SERVICE_NAME") {
            cfg.service_name = s;
        }
        if let Some(v) = env("MEDIAGATE_SESSION_TTL_SECS") {
            cfg.session_ttl = Duration::from_secs(parse_positive(&v, "MEDIAGATE_SESSION_TTL_SECS")?);
        }
        if let Some(v) = env("MEDIAGATE_COOKIE_SECURE") {
            cfg.cookie_security = v.parse().map_err(|e| anyhow!("MEDIAGATE_COOKIE_SECURE: {e}"))?;
        }
        if let Some(v) = env("MEDIAGATE_SERVICE_TIMEOUT_SECS") {
            cfg.service_timeout = Duration::from_secs(parse_positive(&v, "MEDIAGATE_SERVICE_TIMEOUT_SECS")?);
        }
        if let Some(v) = env("MEDIAGATE_IO_TIMEOUT_SECS") {
            cfg.io_timeout = Duration::from_secs(parse_positive(&v, "MEDIAGATE_IO_TIMEOUT_SECS")?);
        }
        if let Some(v) = env("MEDIAGATE_MAX_UPLOAD_MB") {
            let mb = parse_positive(&v, "MEDIAGATE_MAX_UPLOAD_MB")? as usize;
            cfg.max_upload_bytes = mb.saturating_mul(1024 * 1024);
        }
        Ok(cfg)
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.bind, self.http_port) }

    /// Build the credential check; plaintext passwords are hashed here (slow, call once).
    pub fn credentials(&self) -> AppResult<SingleCredential> {
        match &self.password {
            PasswordSource::Phc(phc) => SingleCredential::from_phc(self.username.clone(), phc),
            PasswordSource::Plaintext(pw) => SingleCredential::from_plaintext(self.username.clone(), pw),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HoneypotConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for HoneypotConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_HONEYPOT_PORT,
            data_dir: PathBuf::from(DEFAULT_HONEYPOT_DATA),
        }
    }
}

impl HoneypotConfig {
    pub fn from_env_and_args(args: &[String]) -> Result<Self> {
        Self::resolve(args, |name| std::env::var(name).ok())
    }

    pub fn resolve(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(b) = setting(args, "--bind", &env, "MEDIAGATE_BIND") {
            cfg.bind = parse_bind(&b)?;
        }
        if let Some(p) = setting(args, "--port", &env, "MEDIAGATE_HONEYPOT_PORT") {
            cfg.port = parse_port(&p)?;
        }
        if let Some(d) = setting(args, "--data-dir", &env, "MEDIAGATE_HONEYPOT_DATA") {
            cfg.data_dir = PathBuf::from(d);
        }
        Ok(cfg)
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.bind, self.port) }
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn setting(args: &[String], flag: &str, env: &impl Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    parse_arg(args, flag).or_else(|| env(var)).filter(|v| !v.trim().is_empty())
}

fn parse_port(s: &str) -> Result<u16> {
    s.trim().parse::<u16>().with_context(|| format!("invalid port '{s}'"))
}

fn parse_bind(s: &str) -> Result<IpAddr> {
    s.trim().parse::<IpAddr>().with_context(|| format!("invalid bind address '{s}'"))
}

fn parse_positive(s: &str, name: &str) -> Result<u64> {
    let v = s.trim().parse::<u64>().with_context(|| format!("{name}: expected a number, got '{s}'"))?;
    if v == 0 { bail!("{name} must be greater than zero"); }
    Ok(v)
}
