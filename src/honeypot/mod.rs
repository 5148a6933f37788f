//! Decoy copy of the dashboard that accepts no one and remembers everyone.

pub mod pages;
pub mod server;
pub mod store;

pub use server::{router, run, HoneypotState};
pub use store::{attacker_session_id, AttackEvent, AttackKind, AttackLog, AttackLogError, AttackStats, AttackSummary};
