//! Async timeout helpers.

use crate::error::{ProtocolError, Result};
use std::future::Future;
use std::time::Duration;

/// Default connect timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut`, mapping an elapsed deadline to [`ProtocolError::ConnectionTimeout`].
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::ConnectionTimeout),
    }
}
