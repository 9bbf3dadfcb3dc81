use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use log::debug;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const SEND_PATH: &str = "/tx/v1/send";

/// A stand-in for the MailChannels transactional send endpoint.
///
/// Every request it receives is recorded so that tests can assert on what the handler sent, or
/// that it sent nothing at all.
#[derive(Clone)]
pub struct FakeMailChannels {
    status: StatusCode,
    response_body: String,
    received: Arc<Mutex<Vec<ReceivedRequest>>>,
}

#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub api_key: Option<String>,
    pub payload: Value,
}

impl FakeMailChannels {
    /// A fake which accepts every message with `202 Accepted`, as the real service does.
    pub fn new() -> Self {
        Self {
            status: StatusCode::ACCEPTED,
            response_body: String::new(),
            received: Default::default(),
        }
    }

    pub fn fail_with(self, status: u16, response_body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            response_body: response_body.into(),
            ..self
        }
    }

    /// Starts serving on an ephemeral local port and returns the URL of the send endpoint.
    pub async fn serve(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let app = Router::new()
            .route(SEND_PATH, post(send))
            .with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}{SEND_PATH}")
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.received.lock().unwrap().clone()
    }

    pub fn last_received(&self) -> Option<ReceivedRequest> {
        self.received.lock().unwrap().last().cloned()
    }
}

impl Default for FakeMailChannels {
    fn default() -> Self {
        Self::new()
    }
}

async fn send(
    State(state): State<FakeMailChannels>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, String) {
    debug!("Got message:\n{payload}");
    let api_key = headers
        .get("X-Api-Key")
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    state
        .received
        .lock()
        .unwrap()
        .push(ReceivedRequest { api_key, payload });
    (state.status, state.response_body.clone())
}
