//! MQTT to forwarder bridge.
//!
//! Every message received on a subscribed topic becomes one work item whose
//! `destination-hint` is the topic and whose payload is the message body.

mod ingest;
mod mqtt;

pub use ingest::Ingest;
pub use mqtt::{MqttBridge, DISCONNECT_LINGER};

use std::time::Duration;
use thiserror::Error;

/// Connection and subscription errors raised by [`MqttBridge::start`].
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to connect to broker: {0}")]
    Connect(#[from] rumqttc::ConnectionError),

    #[error("no CONNACK from broker within {0:?}")]
    ConnectTimeout(Duration),

    #[error("failed to subscribe to '{topic}': {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("broker rejected subscription to '{0}'")]
    Rejected(String),

    #[error("bridge already started")]
    AlreadyStarted,
}
