//! Session-backed identity for the dashboard: one shared credential, in-memory sessions,
//! and the gate that guards protected routes.

mod clock;
mod cookie;
mod credentials;
mod gate;
mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cookie::{clear_session_cookie, parse_cookie, session_cookie, CookieSecurity, SESSION_COOKIE};
pub use credentials::{hash_password, verify_password, CredentialStore, SingleCredential};
pub use gate::{evaluate, require_session, DenyReason, GateDecision};
pub use session::{Session, SessionStore, SessionToken, SESSION_TTL};
