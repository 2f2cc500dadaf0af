//! HTTP delivery component.
//!
//! POSTs each payload to the configured base URL with the item's destination
//! hint appended as a path.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info_span, Instrument, Span};

use crate::config::HttpConfig;

use super::item::WorkItem;
use super::{DeliveryError, Sender};

/// Delivers work items over HTTP.
pub struct HttpSender {
    client: Client,
    url: String,
    workers: usize,
    debug: bool,
    span: Span,
}

impl std::fmt::Debug for HttpSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSender")
            .field("url", &self.url)
            .field("workers", &self.workers)
            .field("debug", &self.debug)
            .finish()
    }
}

impl HttpSender {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            workers: config.workers,
            debug: config.debug,
            span: info_span!("http_sender"),
        })
    }

    /// Destination URL for an item.
    ///
    /// The hint is appended as is, without percent-encoding: a topic
    /// containing `?` or `#` becomes part of the query or fragment.
    pub fn endpoint_url(&self, item: &WorkItem) -> String {
        match item.destination_hint() {
            Some(hint) if !hint.is_empty() => format!(
                "{}/{}",
                self.url.trim_end_matches('/'),
                hint.trim_start_matches('/')
            ),
            _ => self.url.clone(),
        }
    }
}

#[async_trait]
impl Sender for HttpSender {
    fn name(&self) -> &'static str {
        "http"
    }

    fn workers(&self) -> usize {
        self.workers
    }

    async fn send(&self, item: &WorkItem) -> Result<(), DeliveryError> {
        let url = self.endpoint_url(item);

        async {
            let response = self
                .client
                .post(&url)
                .body(item.payload.clone())
                .send()
                .await
                .map_err(|e| DeliveryError::Transport(e.to_string()))?;

            let status = response.status();
            if self.debug {
                debug!(url = %url, status = status.as_u16(), bytes = item.payload.len(), "response");
            }

            if status.is_success() {
                Ok(())
            } else {
                Err(DeliveryError::Status {
                    code: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or("unknown status").to_string(),
                })
            }
        }
        .instrument(self.span.clone())
        .await
    }
}
