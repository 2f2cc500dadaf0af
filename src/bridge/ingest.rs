use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::forwarder::{Producer, SubmitError, WorkItem, DESTINATION_HINT};
use crate::telemetry::Stats;

/// Turns inbound messages into work items and submits them.
///
/// Runs on the MQTT event loop, one message at a time, so submission order
/// follows the client's delivery order.
#[derive(Debug)]
pub struct Ingest {
    producer: Producer,
    stats: Arc<Stats>,
    debug: bool,
}

impl Ingest {
    pub fn new(producer: Producer, stats: Arc<Stats>, debug: bool) -> Self {
        Self {
            producer,
            stats,
            debug,
        }
    }

    /// Build the work item for a message received on `topic`.
    pub fn work_item(topic: &str, payload: Bytes) -> WorkItem {
        WorkItem::new(payload).with_metadata(DESTINATION_HINT, topic)
    }

    /// Submit one message. Under `Overflow::Block` this waits for queue space.
    pub async fn handle(&self, topic: &str, payload: Bytes) -> Result<(), SubmitError> {
        self.stats.inc_received();

        if self.debug {
            debug!(topic = %topic, payload = %String::from_utf8_lossy(&payload), "message");
        }

        self.producer.submit(Self::work_item(topic, payload)).await?;
        self.stats.inc_submitted();
        Ok(())
    }

    /// [`Ingest::handle`] with failures logged and counted.
    pub async fn dispatch(&self, topic: &str, payload: Bytes) {
        match self.handle(topic, payload).await {
            Ok(()) => {}
            Err(SubmitError::QueueFull) => {
                self.stats.inc_rejected();
                warn!(topic = %topic, "intake queue full, message rejected");
            }
            Err(SubmitError::Closed) => {
                self.stats.inc_rejected();
                warn!(topic = %topic, "forwarder stopped, message rejected");
            }
        }
    }
}
