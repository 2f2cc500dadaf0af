//! MQTT connection owner.
//!
//! Connects once, subscribes to the configured topics in order and then
//! hands the event loop to a dedicated task that feeds [`Ingest`].

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{
    AsyncClient, ClientError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    SubscribeFilter, SubscribeReasonCode,
};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::config::MqttConfig;
use crate::forwarder::Producer;
use crate::telemetry::Stats;

use super::{BridgeError, Ingest};

/// Time granted to the event loop to flush the DISCONNECT.
pub const DISCONNECT_LINGER: Duration = Duration::from_millis(250);

/// Pause before polling again after a transport error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Client request channel capacity.
const REQUEST_CAPACITY: usize = 64;

enum State {
    Idle(Ingest),
    Running {
        client: AsyncClient,
        task: JoinHandle<()>,
    },
    Stopped,
}

/// Owns one MQTT connection and its subscriptions.
pub struct MqttBridge {
    config: MqttConfig,
    state: State,
    span: Span,
}

impl MqttBridge {
    pub fn new(config: MqttConfig, producer: Producer, stats: Arc<Stats>) -> Self {
        let ingest = Ingest::new(producer, stats, config.debug);

        Self {
            config,
            state: State::Idle(ingest),
            span: info_span!("mqtt"),
        }
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    fn options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(&self.config.client_id, &self.config.broker, self.config.port);
        options.set_keep_alive(self.config.keep_alive);
        options
    }

    fn qos(&self) -> QoS {
        match self.config.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }

    /// Connect and subscribe to every configured topic.
    ///
    /// A connect failure is returned as is, without retrying. A failed
    /// subscription is returned immediately; subscriptions made before it
    /// stay active and the connection keeps running until [`stop`].
    ///
    /// [`stop`]: MqttBridge::stop
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        let ingest = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Idle(ingest) => ingest,
            other => {
                self.state = other;
                return Err(BridgeError::AlreadyStarted);
            }
        };

        let span = self.span.clone();
        async move {
            let (client, mut eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);
            let wait = self.config.connect_timeout;

            match timeout(wait, wait_for_connack(&mut eventloop)).await {
                Err(_) => return Err(BridgeError::ConnectTimeout(wait)),
                Ok(Err(e)) => return Err(BridgeError::Connect(e)),
                Ok(Ok(())) => {}
            }
            info!(broker = %self.config.broker, port = self.config.port, "connected to broker");

            if self.config.topics.is_empty() {
                warn!("no topics configured, bridge will stay idle");
            }

            let qos = self.qos();
            let mut result = Ok(());
            for topic in &self.config.topics {
                let subscribed = timeout(wait, subscribe(&client, &mut eventloop, &ingest, topic, qos))
                    .await
                    .unwrap_or_else(|_| {
                        Err(BridgeError::Subscribe {
                            topic: topic.clone(),
                            reason: format!("no SUBACK within {wait:?}"),
                        })
                    });
                if let Err(e) = subscribed {
                    result = Err(e);
                    break;
                }
                info!(topic = %topic, "subscribed to topic");
            }

            let events = EventLoopTask {
                eventloop,
                client: client.clone(),
                ingest,
                topics: self.config.topics.clone(),
                qos,
            };
            let task = tokio::spawn(events.run().in_current_span());
            self.state = State::Running { client, task };

            result
        }
        .instrument(span)
        .await
    }

    /// Disconnect from the broker.
    ///
    /// Waits at most [`DISCONNECT_LINGER`] for the event loop to flush, then
    /// releases the connection. A no-op before `start` or after a previous
    /// `stop`.
    pub async fn stop(&mut self) {
        let (client, mut task) = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Running { client, task } => (client, task),
            other => {
                self.state = other;
                return;
            }
        };

        let span = self.span.clone();
        async move {
            info!("disconnecting");

            if let Err(e) = client.try_disconnect() {
                debug!(error = %e, "disconnect request not queued");
            }

            if timeout(DISCONNECT_LINGER, &mut task).await.is_err() {
                debug!("linger period elapsed, aborting event loop");
                task.abort();
            }

            info!("disconnected");
        }
        .instrument(span)
        .await
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), rumqttc::ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await? {
            return Ok(());
        }
    }
}

/// Subscribe to one topic and wait for its SUBACK.
///
/// Messages on already subscribed topics can arrive meanwhile; they are
/// forwarded like any other.
async fn subscribe(
    client: &AsyncClient,
    eventloop: &mut EventLoop,
    ingest: &Ingest,
    topic: &str,
    qos: QoS,
) -> Result<(), BridgeError> {
    let failed = |reason: String| BridgeError::Subscribe {
        topic: topic.to_string(),
        reason,
    };

    client
        .subscribe(topic, qos)
        .await
        .map_err(|e| failed(e.to_string()))?;

    loop {
        match eventloop.poll().await.map_err(|e| failed(e.to_string()))? {
            Event::Incoming(Packet::SubAck(ack)) => {
                if ack.return_codes.iter().any(|c| matches!(c, SubscribeReasonCode::Failure)) {
                    return Err(BridgeError::Rejected(topic.to_string()));
                }
                return Ok(());
            }
            Event::Incoming(Packet::Publish(publish)) => {
                ingest.dispatch(&publish.topic, publish.payload).await;
            }
            _ => {}
        }
    }
}

/// Polls the connection after startup until a DISCONNECT goes out.
struct EventLoopTask {
    eventloop: EventLoop,
    client: AsyncClient,
    ingest: Ingest,
    topics: Vec<String>,
    qos: QoS,
}

impl EventLoopTask {
    async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.ingest.dispatch(&publish.topic, publish.payload).await;
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("reconnected to broker");
                    if let Err(e) = self.resubscribe() {
                        warn!(topics = self.topics.len(), error = %e, "resubscribe failed");
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack.return_codes.iter().any(|c| matches!(c, SubscribeReasonCode::Failure)) {
                        warn!(pkid = ack.pkid, "broker rejected resubscription");
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("disconnect sent");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "connection error");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    /// Queue one SUBSCRIBE carrying every topic.
    ///
    /// Non-blocking: this task is the one draining the request channel, so a
    /// single request keeps the topic count independent of its capacity.
    fn resubscribe(&self) -> Result<(), ClientError> {
        if self.topics.is_empty() {
            return Ok(());
        }

        let filters = self
            .topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), self.qos));
        self.client.try_subscribe_many(filters)
    }
}
