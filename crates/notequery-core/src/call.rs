//! Timeout guard for calls into external backends.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// Await `fut`, failing with a "timed out" error once `limit` elapses.
///
/// `None` waits indefinitely. The error is an ordinary backend failure, so
/// callers apply the same fallback they use for any other failed call.
pub async fn bounded<T, F>(limit: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "{} timed out after {}ms",
                what,
                limit.as_millis()
            )),
        },
    }
}
