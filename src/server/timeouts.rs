use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Await filesystem work, turning an expired `limit` into a 503.
pub async fn with_io_timeout<T, F>(limit: Duration, what: &str, fut: F) -> AppResult<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(r) => r.map_err(AppError::from),
        Err(_) => Err(AppError::io("io_timeout", format!("{what} timed out"))),
    }
}

/// Run blocking work on the blocking pool under `limit`.
///
/// On timeout the task keeps running to completion in the background; only the
/// response is given up on.
pub async fn blocking_with_timeout<T, F>(limit: Duration, what: &str, f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(r)) => r,
        Ok(Err(join)) => Err(AppError::internal("task_failed", format!("{what}: {join}"))),
        Err(_) => Err(AppError::io("io_timeout", format!("{what} timed out"))),
    }
}

/// `metadata`, with a missing path reported as `None` instead of an error.
pub async fn stat(limit: Duration, path: &std::path::Path) -> AppResult<Option<std::fs::Metadata>> {
    match tokio::time::timeout(limit, tokio::fs::metadata(path)).await {
        Ok(Ok(m)) => Ok(Some(m)),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(AppError::io("io_timeout", "stat timed out")),
    }
}
