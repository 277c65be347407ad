//! Push gateway client against a mock gateway

use pushcheck_config::{GatewayConfig as GatewaySection, PushcheckConfig};
use pushcheck_engine::gateway_config;
use pushcheck_gateway::{GatewayError, PushGateway};
use pushcheck_types::{DEFAULT_TEST_TITLE, PushMessage};
use serde_json::{Map, Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    SEND_PATH, endpoint_for, gateway_for, mount_error_receipt, start_gateway_mock,
};

#[tokio::test]
async fn test_notification_posts_default_title_and_overrides() {
    let server = start_gateway_mock().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!([{
            "to": "ExponentPushToken[abc]",
            "title": DEFAULT_TEST_TITLE,
            "badge": 3
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"status": "ok", "id": "r-1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut overrides = Map::new();
    overrides.insert("badge".to_string(), Value::from(3));
    let receipts = gateway_for(&server)
        .send_test_notification("ExponentPushToken[abc]", overrides)
        .await
        .unwrap();

    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].id.as_deref(), Some("r-1"));
}

#[tokio::test]
async fn access_token_from_config_is_sent_as_bearer() {
    let server = start_gateway_mock().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(header("authorization", "Bearer from-config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let config = PushcheckConfig {
        gateway: Some(GatewaySection {
            endpoint: Some(endpoint_for(&server)),
            access_token: Some("from-config".to_string()),
            timeout_secs: None,
        }),
        checks: None,
    };
    let gateway = PushGateway::new(&gateway_config(&config)).unwrap();

    let receipts = gateway
        .send(&[PushMessage::test("ExponentPushToken[abc]")])
        .await
        .unwrap();
    assert!(receipts.is_empty());
}

#[tokio::test]
async fn device_not_registered_surfaces_in_error_message() {
    let server = start_gateway_mock().await;
    mount_error_receipt(&server, "DeviceNotRegistered").await;

    let err = gateway_for(&server)
        .send_test_notification("ExponentPushToken[gone]", Map::new())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Receipt { .. }));
    assert_eq!(err.error_code(), Some("DeviceNotRegistered"));
    assert!(err.to_string().contains("DeviceNotRegistered"), "{err}");
}

#[tokio::test]
async fn rejected_request_reports_api_error() {
    let server = start_gateway_mock().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"code": "VALIDATION_ERROR", "message": "\"to\" is required"}]
        })))
        .mount(&server)
        .await;

    let err = gateway_for(&server)
        .send(&[PushMessage::test("")])
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "API error has occurred.");
    assert_eq!(err.error_code(), Some("VALIDATION_ERROR"));
}
