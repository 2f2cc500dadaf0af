//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod broker;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A request seen by [`HttpStub`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub body: Bytes,
}

struct StubState {
    status: StatusCode,
    hits: AtomicUsize,
    tx: mpsc::UnboundedSender<Recorded>,
}

/// HTTP endpoint answering every request with a fixed status.
pub struct HttpStub {
    pub addr: SocketAddr,
    state: Arc<StubState>,
    rx: mpsc::UnboundedReceiver<Recorded>,
    handle: tokio::task::JoinHandle<()>,
}

async fn record(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let _ = state.tx.send(Recorded {
        method,
        path: uri.path().to_string(),
        body,
    });
    state.status
}

impl HttpStub {
    pub async fn start(status: StatusCode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(StubState {
            status,
            hits: AtomicUsize::new(0),
            tx,
        });

        let app = Router::new().fallback(record).with_state(state.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            rx,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Wait for the next request.
    pub async fn next(&mut self) -> Recorded {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("no request within 5s")
            .expect("stub stopped")
    }
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
