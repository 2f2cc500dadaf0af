//! Minimal MQTT 3.1.1 broker for a single client.
//!
//! Answers CONNECT, SUBSCRIBE and PINGREQ, and pushes QoS 0 PUBLISH packets
//! on request. Topics listed as rejected get a failure SUBACK code.

use std::sync::{Arc, Mutex};
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use rumqttc::mqttbytes::v4::{
    self, ConnAck, ConnectReturnCode, Packet, PingResp, Publish, SubAck, SubscribeReasonCode,
};
use rumqttc::mqttbytes::{Error, QoS};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const MAX_PACKET_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    Connected,
    Subscribed(String),
    Disconnected,
}

type Writer = Arc<Mutex<Option<mpsc::UnboundedSender<BytesMut>>>>;

pub struct FakeBroker {
    pub addr: SocketAddr,
    events: mpsc::UnboundedReceiver<BrokerEvent>,
    writer: Writer,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeBroker {
    pub async fn start(rejected: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, events) = mpsc::unbounded_channel();
        let writer: Writer = Arc::default();
        let rejected: Arc<Vec<String>> = Arc::new(rejected.iter().map(|t| t.to_string()).collect());

        let handle = {
            let writer = writer.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(serve(
                        stream,
                        rejected.clone(),
                        events_tx.clone(),
                        writer.clone(),
                    ));
                }
            })
        };

        Self {
            addr,
            events,
            writer,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the next client action.
    pub async fn next_event(&mut self) -> BrokerEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("no broker event within 5s")
            .expect("broker stopped")
    }

    /// Client action already seen, if any.
    pub fn try_event(&mut self) -> Option<BrokerEvent> {
        self.events.try_recv().ok()
    }

    /// Send a QoS 0 PUBLISH to the connected client.
    pub fn publish(&self, topic: &str, payload: &[u8]) {
        let publish = Publish::new(topic, QoS::AtMostOnce, payload.to_vec());
        let writer = self.writer.lock().unwrap();
        let tx = writer.as_ref().expect("no client connected");
        tx.send(encode(|buf| publish.write(buf))).unwrap();
    }
}

impl Drop for FakeBroker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn encode(write: impl FnOnce(&mut BytesMut) -> Result<usize, Error>) -> BytesMut {
    let mut buf = BytesMut::new();
    write(&mut buf).unwrap();
    buf
}

async fn serve(
    stream: TcpStream,
    rejected: Arc<Vec<String>>,
    events: mpsc::UnboundedSender<BrokerEvent>,
    writer: Writer,
) {
    let (mut reader, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<BytesMut>();
    *writer.lock().unwrap() = Some(tx.clone());

    tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if write_half.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });

    let mut buf = BytesMut::new();
    'conn: loop {
        let packet = match v4::read(&mut buf, MAX_PACKET_SIZE) {
            Ok(packet) => packet,
            Err(Error::InsufficientBytes(_)) => match reader.read_buf(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            },
            Err(_) => break,
        };

        match packet {
            Packet::Connect(_) => {
                let ack = ConnAck::new(ConnectReturnCode::Success, false);
                let _ = tx.send(encode(|buf| ack.write(buf)));
                let _ = events.send(BrokerEvent::Connected);
            }
            Packet::Subscribe(subscribe) => {
                let codes = subscribe
                    .filters
                    .iter()
                    .map(|filter| {
                        if rejected.contains(&filter.path) {
                            SubscribeReasonCode::Failure
                        } else {
                            SubscribeReasonCode::Success(filter.qos)
                        }
                    })
                    .collect();
                let ack = SubAck::new(subscribe.pkid, codes);
                let _ = tx.send(encode(|buf| ack.write(buf)));
                for filter in subscribe.filters {
                    let _ = events.send(BrokerEvent::Subscribed(filter.path));
                }
            }
            Packet::PingReq => {
                let _ = tx.send(encode(|buf| PingResp.write(buf)));
            }
            Packet::Disconnect => {
                let _ = events.send(BrokerEvent::Disconnected);
                break 'conn;
            }
            _ => {}
        }
    }

    writer.lock().unwrap().take();
}
