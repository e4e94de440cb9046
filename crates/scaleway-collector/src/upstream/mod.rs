//! Access to the Scaleway APIs: error taxonomy, scrape deadline and clients.

use std::{future::Future, time::Duration};

use tokio::time::{self, Instant};

pub use self::{
    client::{Paginated, ScalewayClient},
    s3::{BucketLister, BucketListing, S3BucketLister},
};

mod client;
mod s3;

/// Errors returned by upstream calls.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Resource family is not available in the requested partition (HTTP 501).
    #[error("resource family is not implemented in this partition")]
    NotImplemented,
    /// Non-successful HTTP status.
    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        /// Response status.
        status: reqwest::StatusCode,
        /// Response body, possibly empty.
        body: String,
    },
    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Response body cannot be decoded.
    #[error("cannot decode response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Scrape deadline was reached before the call completed.
    #[error("scrape deadline exceeded")]
    Timeout,
    /// Failure of the object storage (S3) API.
    #[error("object storage request failed: {0}")]
    ObjectStorage(String),
}

impl UpstreamError {
    /// Checks whether this error signals an unsupported partition rather than a failure.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented)
    }
}

/// Context shared by all upstream calls of a single scrape.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeContext {
    deadline: Instant,
}

impl ScrapeContext {
    /// Creates a context for a scrape starting now.
    pub fn new(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Creates a context with the specified deadline.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline }
    }

    /// Returns the scrape deadline.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Runs an upstream call, cancelling it once the scrape deadline is reached.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Timeout`] if the deadline is reached, or propagates the call error.
    pub async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, UpstreamError>>,
    ) -> Result<T, UpstreamError> {
        time::timeout_at(self.deadline, call)
            .await
            .map_err(|_| UpstreamError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bounded_call_completes_before_deadline() {
        let cx = ScrapeContext::new(Duration::from_secs(5));
        let value = cx
            .bounded(async {
                time::sleep(Duration::from_secs(1)).await;
                Ok(42)
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_call_is_cancelled_at_deadline() {
        let cx = ScrapeContext::new(Duration::from_secs(5));
        let started = Instant::now();
        let err = cx
            .bounded(async {
                time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_matches!(err, UpstreamError::Timeout);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn call_errors_are_propagated() {
        let cx = ScrapeContext::new(Duration::from_secs(5));
        let err = cx
            .bounded(async { Err::<(), _>(UpstreamError::NotImplemented) })
            .await
            .unwrap_err();
        assert!(err.is_not_implemented());
    }
}
