//! Host-facing collaborators of the dashboard: resource diagnostics and service control.

pub mod diagnostics;
pub mod service;

pub use diagnostics::{CpuStats, Diagnostics, ProcProbe, StaticProbe, SystemProbe, UsageStats};
pub use service::{ServiceControl, ServiceError, SystemctlControl};
