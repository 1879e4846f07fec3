//! Test utilities for blok-core
//!
//! This module provides a mock eKasa "find receipt" server for unit and
//! integration tests. Special receipt ids trigger upstream failure modes.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

const FIND_PATH: &str = "/mdu/api/v1/opd/receipt/find";

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<Value>>>,
}

/// Mock eKasa server for testing
pub struct MockFsServer {
    addr: SocketAddr,
    state: MockState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockFsServer {
    /// Answers 404 with `NOT_FOUND_BODY`
    pub const NOT_FOUND_ID: &'static str = "missing";
    pub const NOT_FOUND_BODY: &'static str = "Receipt not found";
    /// Answers 500 with an empty body
    pub const EMPTY_ERROR_ID: &'static str = "empty-error";
    /// Answers 200 with a body that is not JSON
    pub const GARBAGE_ID: &'static str = "garbage";
    /// Answers after five seconds
    pub const SLOW_ID: &'static str = "slow";

    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route(FIND_PATH, post(handle_find))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Full URL of the find endpoint
    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, FIND_PATH)
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockFsServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A realistic eKasa payload for `receipt_id`
///
/// Merchant comes as an `organization` object, one item has no line total and
/// the issue date carries a +01:00 offset.
pub fn sample_payload(receipt_id: &str) -> Value {
    json!({
        "returnValue": 0,
        "receipt": {
            "receiptId": receipt_id,
            "ico": "31321828",
            "issueDate": "2024-03-12T17:45:00+01:00",
            "organization": {
                "name": "TESCO STORES SR, a.s.",
                "ico": "31321828",
                "streetName": "Kamenné nám.",
                "buildingNumber": "1/A",
                "municipality": "Bratislava"
            },
            "totalPrice": 4.9,
            "items": [
                {"name": "Mlieko polotučné 1,5%", "itemType": "K", "quantity": 2, "price": 1.98},
                {"name": "Chlieb konzumný", "itemType": "K", "quantity": 1, "price": 1.49},
                {"name": "Banány", "itemType": "K", "quantity": 1.2, "unitPrice": 1.19}
            ]
        }
    })
}

async fn handle_find(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.requests.lock().unwrap().push(body.clone());

    let receipt_id = body.get("receiptId").and_then(Value::as_str);
    let qr_code = body.get("qrCode").and_then(Value::as_str);

    match receipt_id {
        Some(MockFsServer::NOT_FOUND_ID) => {
            (StatusCode::NOT_FOUND, MockFsServer::NOT_FOUND_BODY).into_response()
        }
        Some(MockFsServer::EMPTY_ERROR_ID) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Some(MockFsServer::GARBAGE_ID) => {
            (StatusCode::OK, "<html>maintenance</html>").into_response()
        }
        Some(MockFsServer::SLOW_ID) => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(sample_payload(MockFsServer::SLOW_ID)).into_response()
        }
        Some(id) => Json(sample_payload(id)).into_response(),
        None => match qr_code {
            Some(qr) => Json(sample_payload(&format!("QR-{}", qr))).into_response(),
            None => (StatusCode::BAD_REQUEST, "receiptId or qrCode required").into_response(),
        },
    }
}
