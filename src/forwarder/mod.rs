//! Forwarding pipeline.
//!
//! Work item lifecycle:
//! 1. Producer submits an item into the bounded intake queue
//! 2. Processor waits for a free worker slot
//! 3. Sender attempts delivery, retried with a fixed backoff
//! 4. Exactly one report is emitted on the report stream

mod http;
mod item;
mod processor;
mod reports;
mod retry;

pub use http::HttpSender;
pub use item::{Opaque, Report, WorkItem, DESTINATION_HINT};
pub use reports::{ReportConsumer, ReportSummary};
pub use retry::RetryPolicy;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument, Span};

use crate::config::{Overflow, PipelineConfig};

use processor::Processor;

/// Forwarder version, shown by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Report stream handed out by [`Forwarder::take_reports`].
pub type Reports = mpsc::Receiver<Report>;

/// Configuration for the forwarder.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Extra attempts after a failed delivery
    pub retries: u32,
    /// Delay between attempts
    pub backoff: Duration,
    /// Intake queue capacity (also bounds the report stream)
    pub queue_size: usize,
    /// Full-queue policy
    pub overflow: Overflow,
}

impl From<&PipelineConfig> for ForwarderConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            retries: config.retries,
            backoff: config.backoff,
            queue_size: config.queue,
            overflow: config.overflow,
        }
    }
}

/// Delivery failure for a single attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The endpoint answered with a non-success status.
    #[error("{reason}")]
    Status { code: u16, reason: String },

    /// The request never completed.
    #[error("{0}")]
    Transport(String),
}

impl DeliveryError {
    /// Report code for this failure (never 0).
    pub fn code(&self) -> u32 {
        match self {
            Self::Status { code, .. } => u32::from(*code),
            Self::Transport(_) => 1,
        }
    }
}

/// Delivery component driven by the forwarder.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Maximum concurrent deliveries.
    fn workers(&self) -> usize;

    /// Attempt one delivery.
    async fn send(&self, item: &WorkItem) -> Result<(), DeliveryError>;
}

/// Submission failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("intake queue full")]
    QueueFull,

    #[error("forwarder stopped")]
    Closed,
}

/// Handle to submit work items to the forwarder.
#[derive(Debug, Clone)]
pub struct Producer {
    tx: mpsc::Sender<WorkItem>,
    overflow: Overflow,
}

impl Producer {
    pub(crate) fn channel(capacity: usize, overflow: Overflow) -> (Self, mpsc::Receiver<WorkItem>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, overflow }, rx)
    }

    /// Submit an item, applying the overflow policy when the queue is full.
    pub async fn submit(&self, item: WorkItem) -> Result<(), SubmitError> {
        match self.overflow {
            Overflow::Block => self.tx.send(item).await.map_err(|_| SubmitError::Closed),
            Overflow::Reject => self.tx.try_send(item).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
            }),
        }
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Forwarding pipeline: bounded intake, retry/backoff, worker pool, reports.
pub struct Forwarder {
    policy: RetryPolicy,
    sender: Arc<dyn Sender>,
    producer: Producer,
    intake: mpsc::Receiver<WorkItem>,
    report_tx: mpsc::Sender<Report>,
    reports: Option<Reports>,
    span: Span,
}

impl Forwarder {
    pub fn new(config: ForwarderConfig, sender: Arc<dyn Sender>) -> Self {
        let capacity = config.queue_size.max(1);
        let (producer, intake) = Producer::channel(capacity, config.overflow);
        let (report_tx, reports) = mpsc::channel(capacity);

        Self {
            policy: RetryPolicy {
                retries: config.retries,
                backoff: config.backoff,
            },
            sender,
            producer,
            intake,
            report_tx,
            reports: Some(reports),
            span: info_span!("forwarder"),
        }
    }

    /// Get a submission handle.
    pub fn producer(&self) -> Producer {
        self.producer.clone()
    }

    /// Take the report stream. Only the first call returns it.
    pub fn take_reports(&mut self) -> Option<Reports> {
        self.reports.take()
    }

    /// Start processing.
    ///
    /// The task ends once every [`Producer`] is dropped and in-flight
    /// deliveries finish; the report stream closes with it.
    pub fn run(self) -> JoinHandle<()> {
        let Self {
            policy,
            sender,
            producer,
            intake,
            report_tx,
            span,
            ..
        } = self;
        drop(producer);

        let processor = Processor::new(intake, sender, report_tx, policy);
        tokio::spawn(processor.run().instrument(span))
    }
}
