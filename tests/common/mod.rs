//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::Router;
use serde_json::{json, Value};

use wallet_relay::session::User;

/// Anvil's first account.
#[allow(dead_code)]
pub const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// A request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
}

type Handler = dyn Fn(&str, &Value) -> (u16, String) + Send + Sync;

struct MockState {
    handler: Box<Handler>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Programmable HTTP backend standing in for the chain node, the relay and
/// the registration service.
pub struct MockServer {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

#[allow(dead_code)]
impl MockServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Recorded JSON-RPC requests for `method`, in arrival order.
    pub fn calls(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.body["method"] == method)
            .collect()
    }
}

/// Start a mock backend on an ephemeral port. `handler` maps
/// `(path, JSON body)` to `(status, body)`; non-JSON bodies arrive as `null`.
pub async fn start_mock_server<F>(handler: F) -> MockServer
where
    F: Fn(&str, &Value) -> (u16, String) + Send + Sync + 'static,
{
    let state = Arc::new(MockState {
        handler: Box::new(handler),
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new().fallback(handle).with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer { addr, state }
}

async fn handle(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    state.requests.lock().unwrap().push(RecordedRequest {
        path: uri.path().to_string(),
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: body.clone(),
    });

    let (status, response) = (state.handler)(uri.path(), &body);
    (
        StatusCode::from_u16(status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        response,
    )
}

/// JSON-RPC success response echoing the request id.
#[allow(dead_code)]
pub fn rpc_ok(request: &Value, result: Value) -> (u16, String) {
    (
        200,
        json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }).to_string(),
    )
}

#[allow(dead_code)]
pub fn not_found() -> (u16, String) {
    (404, "not found".to_string())
}

#[allow(dead_code)]
pub fn test_user(wallet: Option<alloy::primitives::Address>) -> User {
    User {
        sub: "email|test".to_string(),
        access_token: "test-token".to_string(),
        email: Some("test@example.com".to_string()),
        wallet_address: wallet,
    }
}
