//! Shared test utilities and fixtures
//!
//! Mock push gateways and fast check settings for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use pushcheck_core::{LoopbackDevice, PollPolicy};
use pushcheck_engine::CheckSettings;
use pushcheck_gateway::{GatewayConfig, PushGateway};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const SEND_PATH: &str = "/--/api/v2/push/send";

/// Start a mock server that simulates the Expo push gateway
pub async fn start_gateway_mock() -> MockServer {
    MockServer::start().await
}

pub fn endpoint_for(server: &MockServer) -> String {
    format!("{}{SEND_PATH}", server.uri())
}

pub fn gateway_for(server: &MockServer) -> PushGateway {
    PushGateway::new(&GatewayConfig::with_endpoint(endpoint_for(server)))
        .expect("loopback endpoint is valid")
}

/// Settings with short waits so failing cases finish quickly in real time.
pub fn fast_settings() -> CheckSettings {
    CheckSettings {
        settle_delay: Duration::from_millis(50),
        poll: PollPolicy::new(Duration::from_millis(20), 3),
        ..CheckSettings::default()
    }
}

fn ok_receipts(count: usize) -> Value {
    let data: Vec<Value> = (0..count)
        .map(|i| json!({"status": "ok", "id": format!("receipt-{i}")}))
        .collect();
    json!({ "data": data })
}

fn sent_messages(request: &Request) -> Vec<Value> {
    serde_json::from_slice::<Vec<Value>>(&request.body).unwrap_or_default()
}

/// Accept every message with an `ok` receipt
pub async fn mount_ok_gateway(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(|request: &Request| {
            ResponseTemplate::new(200).set_body_json(ok_receipts(sent_messages(request).len()))
        })
        .mount(server)
        .await;
}

/// Answer every message with an error receipt carrying `code`
pub async fn mount_error_receipt(server: &MockServer, code: &str) {
    let body = json!({
        "data": [{
            "status": "error",
            "message": "\"ExponentPushToken[xxx]\" is not a registered recipient",
            "details": { "error": code },
            "__debug": { "reason": "test" }
        }]
    });
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Accept every message and hand it to `device` as a received notification,
/// the way the push service would.
pub async fn mount_delivering_gateway(server: &MockServer, device: LoopbackDevice) {
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(move |request: &Request| {
            let messages = sent_messages(request);
            for message in messages.iter().filter_map(Value::as_object) {
                device.deliver_wire(message);
            }
            ResponseTemplate::new(200).set_body_json(ok_receipts(messages.len()))
        })
        .mount(server)
        .await;
}

/// JSON bodies of every request the server has seen
pub async fn sent_bodies(server: &MockServer) -> Vec<Vec<Value>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(sent_messages)
        .collect()
}
