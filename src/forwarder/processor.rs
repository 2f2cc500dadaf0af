//! Intake dispatcher.
//!
//! Pulls work items off the intake queue and delivers each one on its own
//! task, bounded by the sender's worker count. Every item yields exactly one
//! report.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, Instrument};

use crate::config::MAX_WORKERS;

use super::item::{Report, WorkItem};
use super::retry::{self, RetryPolicy};
use super::Sender;

pub(super) struct Processor {
    intake: mpsc::Receiver<WorkItem>,
    sender: Arc<dyn Sender>,
    report_tx: mpsc::Sender<Report>,
    policy: RetryPolicy,
}

impl Processor {
    pub(super) fn new(
        intake: mpsc::Receiver<WorkItem>,
        sender: Arc<dyn Sender>,
        report_tx: mpsc::Sender<Report>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            intake,
            sender,
            report_tx,
            policy,
        }
    }

    /// Run until every producer is dropped and in-flight deliveries finish.
    ///
    /// The report stream closes when this returns.
    pub(super) async fn run(mut self) {
        let workers = self.sender.workers().clamp(1, MAX_WORKERS);

        info!(
            sender = self.sender.name(),
            workers,
            retries = self.policy.retries,
            backoff_secs = self.policy.backoff.as_secs(),
            "forwarder started"
        );

        let semaphore = Arc::new(Semaphore::new(workers));

        while let Some(item) = self.intake.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let sender = self.sender.clone();
            let report_tx = self.report_tx.clone();
            let policy = self.policy;

            tokio::spawn(
                async move {
                    let _permit = permit;
                    let report = retry::deliver(sender.as_ref(), item, policy).await;
                    if report_tx.send(report).await.is_err() {
                        debug!("report stream closed, report discarded");
                    }
                }
                .in_current_span(),
            );
        }

        info!("intake closed, draining in-flight deliveries");

        // All permits back means every spawned delivery has sent its report.
        // `workers` is at most MAX_WORKERS, so it fits in a u32.
        let _ = semaphore.acquire_many(workers as u32).await;

        info!("forwarder stopped");
    }
}
