// Not every test binary uses every helper.
#![allow(dead_code)]

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{body::Bytes, extract::State, http::HeaderMap, routing::post, Router};
use http::StatusCode;
use promwrite::{
    codec::decode,
    proto::{self, Label},
};
use tokio::net::TcpListener;

/// A request as seen by the receiver.
#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ReceivedRequest {
    pub fn decode(&self) -> proto::WriteRequest {
        decode(&self.body).expect("receiver got an invalid payload")
    }
}

#[derive(Clone)]
struct ReceiverState {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
}

/// A mock remote write receiver.
pub struct Receiver {
    addr: SocketAddr,
    state: ReceiverState,
}

impl Receiver {
    /// Starts a receiver answering every write with the given status and body.
    pub async fn start(status: StatusCode, body: &'static str) -> Self {
        Self::start_with_delay(status, body, Duration::ZERO).await
    }

    /// Starts a receiver answering every write with the given status and body, after the given delay.
    pub async fn start_with_delay(status: StatusCode, body: &'static str, delay: Duration) -> Self {
        let state = ReceiverState {
            status,
            body,
            delay,
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/api/v1/write", post(handle_write))
            .with_state(state.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        Self { addr, state }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/api/v1/write", self.addr)
    }

    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn handle_write(
    State(state): State<ReceiverState>, headers: HeaderMap, body: Bytes,
) -> (StatusCode, &'static str) {
    state.requests.lock().unwrap().push(ReceivedRequest { headers, body });
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    (state.status, state.body)
}

/// Returns the label pairs of a wire series, in order.
pub fn label_pairs(labels: &[Label]) -> Vec<(&str, &str)> {
    labels
        .iter()
        .map(|label| (label.name.as_str(), label.value.as_str()))
        .collect()
}
