use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use crate::error::{AppError, AppResult};
use crate::tprintln;

pub type SessionToken = String;

/// Default lifetime of a session, counted from creation.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// 256 bits of OS entropy per token.
const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// In-memory session table shared by every request of the process.
///
/// A session is valid while `now - created_at < ttl`; `last_activity` is tracked but
/// never extends the lifetime. Expired entries are dropped lazily by `validate`.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionToken, Session>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl Default for SessionStore {
    fn default() -> Self { Self::new(SESSION_TTL) }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self { Self::with_clock(ttl, Arc::new(SystemClock)) }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    pub fn ttl(&self) -> TimeDelta { self.ttl }

    pub fn ttl_secs(&self) -> u64 { self.ttl.num_seconds().max(0) as u64 }

    pub fn create(&self, username: &str) -> AppResult<SessionToken> {
        let token = gen_token()?;
        let now = self.clock.now();
        let session = Session {
            token: token.clone(),
            username: username.to_string(),
            created_at: now,
            last_activity: now,
        };
        let active = {
            let mut map = self.sessions.write();
            if map.contains_key(&token) {
                return Err(AppError::internal("token_collision", "generated session token already in use"));
            }
            map.insert(token.clone(), session);
            map.len()
        };
        tprintln!("session.create user={} active={}", username, active);
        debug!(target: "session", user = %username, active, "session created");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Option<Session> {
        let now = self.clock.now();
        let mut map = self.sessions.write();
        let expired = match map.get(token) {
            None => return None,
            Some(s) => now.signed_duration_since(s.created_at) >= self.ttl,
        };
        if expired {
            if let Some(gone) = map.remove(token) {
                debug!(target: "session", user = %gone.username, "session expired");
            }
            return None;
        }
        let session = map.get_mut(token)?;
        if now > session.last_activity {
            session.last_activity = now;
        }
        Some(session.clone())
    }

    /// Remove `token`; returns whether a session was present. Revoking twice is a no-op.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        if let Some(s) = &removed {
            tprintln!("session.revoke user={}", s.username);
            debug!(target: "session", user = %s.username, "session revoked");
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.sessions.read().is_empty() }
}

fn gen_token() -> AppResult<SessionToken> {
    let mut buf = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut buf)
        .map_err(|e| AppError::internal("entropy_unavailable", e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}
