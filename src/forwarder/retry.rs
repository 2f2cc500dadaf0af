//! Fixed-backoff retry around a single delivery.

use std::time::Duration;

use tracing::debug;

use super::item::{Report, WorkItem};
use super::Sender;

/// How often and how far apart failed deliveries are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub retries: u32,
    /// Delay between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Deliver `item` through `sender`, retrying per `policy`, and build its report.
pub async fn deliver(sender: &dyn Sender, item: WorkItem, policy: RetryPolicy) -> Report {
    let mut attempt = 1;

    let result = loop {
        match sender.send(&item).await {
            Ok(()) => break Ok(()),
            Err(e) if attempt < policy.max_attempts() => {
                debug!(
                    attempt,
                    max_attempts = policy.max_attempts(),
                    backoff_secs = policy.backoff.as_secs(),
                    error = %e,
                    "delivery failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => break Err(e),
        }
    };

    match result {
        Ok(()) => Report::success(item.opaque),
        Err(e) => Report::failure(e.code(), e.to_string(), item.opaque),
    }
}
