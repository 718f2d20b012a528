//! Shared filesystem helpers.

pub mod fs;

use crate::error::Result;

/// Run synchronous store work on the blocking pool
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("blocking task failed: {}", e))?
}
