//! Restarting a host service (the Samba daemon by default) from the dashboard.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("restart of '{service}' timed out after {}s", .after.as_secs())]
    Timeout { service: String, after: Duration },
    #[error("restart of '{service}' failed: {stderr}")]
    Failed { service: String, stderr: String },
    #[error("could not run restart command: {0}")]
    Spawn(#[from] std::io::Error),
}

#[async_trait]
pub trait ServiceControl: Send + Sync {
    async fn restart(&self, service: &str, timeout: Duration) -> Result<(), ServiceError>;
}

/// Runs `sudo -n systemctl restart <service>`; `-n` makes sudo fail instead of prompting.
#[derive(Debug, Clone)]
pub struct SystemctlControl {
    program: String,
    prefix: Vec<String>,
}

impl Default for SystemctlControl {
    fn default() -> Self {
        Self::with_command("sudo", ["-n", "systemctl", "restart"])
    }
}

impl SystemctlControl {
    /// `program prefix... <service>` is executed for each restart.
    pub fn with_command<I, S>(program: impl Into<String>, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { program: program.into(), prefix: prefix.into_iter().map(Into::into).collect() }
    }
}

#[async_trait]
impl ServiceControl for SystemctlControl {
    async fn restart(&self, service: &str, timeout: Duration) -> Result<(), ServiceError> {
        let child = Command::new(&self.program)
            .args(&self.prefix)
            .arg(service)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(out) => out?,
            Err(_) => {
                warn!(target: "service", service, "restart timed out");
                return Err(ServiceError::Timeout { service: service.to_string(), after: timeout });
            }
        };
        if output.status.success() {
            info!(target: "service", service, "service restarted");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(target: "service", service, status = ?output.status.code(), %stderr, "restart failed");
            Err(ServiceError::Failed { service: service.to_string(), stderr })
        }
    }
}
