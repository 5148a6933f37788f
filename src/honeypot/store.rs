//! Append-only record of what visitors do to the decoy.
//!
//! Every event lands in two places: a SQLite database (`database/honeypot.db`) for the
//! admin views, and a daily JSON-lines file (`logs/honeypot_YYYYMMDD.log`) for tailing.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttackLogError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AttackLogResult<T> = Result<T, AttackLogError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    LoginAttempt,
    PageVisit,
    DashboardAccess,
    ApiAccess,
}

impl AttackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttackKind::LoginAttempt => "login_attempt",
            AttackKind::PageVisit => "page_visit",
            AttackKind::DashboardAccess => "dashboard_access",
            AttackKind::ApiAccess => "api_access",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackEvent {
    #[serde(rename = "type")]
    pub kind: AttackKind,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AttackEvent {
    fn base(kind: AttackKind, ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            ip_address: ip.into(),
            user_agent: user_agent.into(),
            username: None,
            password: None,
            path: None,
            method: None,
            headers: None,
            endpoint: None,
            note: None,
        }
    }

    pub fn login_attempt(ip: impl Into<String>, user_agent: impl Into<String>, username: &str, password: &str) -> Self {
        Self { username: Some(username.to_string()), password: Some(password.to_string()), ..Self::base(AttackKind::LoginAttempt, ip, user_agent) }
    }

    pub fn page_visit(
        ip: impl Into<String>,
        user_agent: impl Into<String>,
        method: &str,
        path: &str,
        headers: BTreeMap<String, String>,
    ) -> Self {
        Self {
            method: Some(method.to_string()),
            path: Some(path.to_string()),
            headers: Some(headers),
            ..Self::base(AttackKind::PageVisit, ip, user_agent)
        }
    }

    pub fn dashboard_access(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self { note: Some("Attacker accessed fake dashboard".to_string()), ..Self::base(AttackKind::DashboardAccess, ip, user_agent) }
    }

    pub fn api_access(ip: impl Into<String>, user_agent: impl Into<String>, endpoint: &str) -> Self {
        Self { endpoint: Some(endpoint.to_string()), ..Self::base(AttackKind::ApiAccess, ip, user_agent) }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Attacker fingerprint: first 12 hex digits of a hash of `ip:user_agent`.
pub fn attacker_session_id(ip: &str, user_agent: &str) -> String {
    let h = xxhash_rust::xxh3::xxh3_64(format!("{ip}:{user_agent}").as_bytes());
    format!("{h:016x}")[..12].to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttemptRow {
    pub timestamp: String,
    pub ip_address: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackSessionRow {
    pub session_id: String,
    pub ip_address: String,
    pub start_time: String,
    pub last_activity: String,
    pub total_requests: i64,
    pub attack_type: String,
    pub risk_level: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackStats {
    pub total_attempts: i64,
    pub unique_attackers: i64,
    pub active_sessions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackSummary {
    pub login_attempts: Vec<LoginAttemptRow>,
    pub sessions: Vec<AttackSessionRow>,
    pub stats: AttackStats,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS login_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    ip_address TEXT,
    username TEXT,
    password TEXT,
    user_agent TEXT,
    session_id TEXT,
    success BOOLEAN DEFAULT FALSE
);
CREATE TABLE IF NOT EXISTS page_visits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    ip_address TEXT,
    path TEXT,
    method TEXT,
    user_agent TEXT,
    session_id TEXT,
    headers TEXT
);
CREATE TABLE IF NOT EXISTS attack_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT UNIQUE,
    ip_address TEXT,
    start_time TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    total_requests INTEGER DEFAULT 0,
    attack_type TEXT,
    risk_level INTEGER DEFAULT 1
);
";

#[derive(Debug)]
pub struct AttackLog {
    conn: Mutex<Connection>,
    log_dir: PathBuf,
}

impl AttackLog {
    /// Open (creating if needed) `<data_dir>/database/honeypot.db` and `<data_dir>/logs/`.
    pub fn open(data_dir: &Path) -> AttackLogResult<Self> {
        let db_dir = data_dir.join("database");
        let log_dir = data_dir.join("logs");
        std::fs::create_dir_all(&db_dir)?;
        std::fs::create_dir_all(&log_dir)?;
        let conn = Connection::open(db_dir.join("honeypot.db"))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn), log_dir })
    }

    pub fn log_file_for(&self, day: DateTime<Utc>) -> PathBuf {
        self.log_dir.join(format!("honeypot_{}.log", day.format("%Y%m%d")))
    }

    /// Store `event`; returns the attacker session id it was filed under. Blocking.
    pub fn record(&self, event: &AttackEvent) -> AttackLogResult<String> {
        let session_id = attacker_session_id(&event.ip_address, &event.user_agent);
        let ts = event.timestamp.to_rfc3339();
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO attack_sessions (session_id, ip_address, start_time, last_activity, total_requests, attack_type, risk_level)
                 VALUES (?1, ?2, ?3, ?3, 1, ?4, 1)
                 ON CONFLICT(session_id) DO UPDATE SET
                     ip_address = excluded.ip_address,
                     last_activity = excluded.last_activity,
                     total_requests = attack_sessions.total_requests + 1,
                     attack_type = excluded.attack_type",
                params![session_id, event.ip_address, ts, event.kind.as_str()],
            )?;
            match event.kind {
                AttackKind::LoginAttempt => {
                    tx.execute(
                        "INSERT INTO login_attempts (timestamp, ip_address, username, password, user_agent, session_id)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![ts, event.ip_address, event.username, event.password, event.user_agent, session_id],
                    )?;
                }
                AttackKind::PageVisit => {
                    let headers = serde_json::to_string(&event.headers.clone().unwrap_or_default())?;
                    tx.execute(
                        "INSERT INTO page_visits (timestamp, ip_address, path, method, user_agent, session_id, headers)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![ts, event.ip_address, event.path, event.method, event.user_agent, session_id, headers],
                    )?;
                }
                AttackKind::DashboardAccess | AttackKind::ApiAccess => {}
            }
            tx.commit()?;
        }

        #[derive(Serialize)]
        struct LogLine<'a> {
            session_id: &'a str,
            #[serde(flatten)]
            event: &'a AttackEvent,
        }
        let mut line = serde_json::to_string(&LogLine { session_id: &session_id, event })?;
        line.push('\n');
        let mut f = OpenOptions::new().create(true).append(true).open(self.log_file_for(event.timestamp))?;
        f.write_all(line.as_bytes())?;
        Ok(session_id)
    }

    pub fn summary(&self, login_limit: usize, session_limit: usize) -> AttackLogResult<AttackSummary> {
        let conn = self.conn.lock();
        let login_attempts = {
            let mut stmt = conn.prepare(
                "SELECT timestamp, ip_address, username, password, user_agent, session_id
                 FROM login_attempts ORDER BY timestamp DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![login_limit as i64], |row| {
                Ok(LoginAttemptRow {
                    timestamp: row.get(0)?,
                    ip_address: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    username: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    password: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    user_agent: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    session_id: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let sessions = {
            let mut stmt = conn.prepare(
                "SELECT session_id, ip_address, start_time, last_activity, total_requests, attack_type, risk_level
                 FROM attack_sessions ORDER BY last_activity DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![session_limit as i64], |row| {
                Ok(AttackSessionRow {
                    session_id: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    ip_address: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    start_time: row.get(2)?,
                    last_activity: row.get(3)?,
                    total_requests: row.get(4)?,
                    attack_type: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    risk_level: row.get(6)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let (total_attempts, unique_attackers): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT ip_address) FROM login_attempts",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let active_sessions: i64 =
            conn.query_row("SELECT COUNT(*) FROM attack_sessions WHERE total_requests > 1", [], |row| row.get(0))?;
        Ok(AttackSummary {
            login_attempts,
            sessions,
            stats: AttackStats { total_attempts, unique_attackers, active_sessions },
        })
    }

    pub fn page_visit_count(&self) -> AttackLogResult<i64> {
        Ok(self.conn.lock().query_row("SELECT COUNT(*) FROM page_visits", [], |row| row.get(0))?)
    }
}
