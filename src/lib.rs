//! MQTT to HTTP bridge.
//!
//! Subscribes to MQTT topics and forwards every message payload to an HTTP
//! endpoint through a bounded, retrying forwarder. The source topic is
//! appended to the endpoint URL.

pub mod admin;
pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod forwarder;
pub mod telemetry;
