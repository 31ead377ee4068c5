use civic_common::{PushErrorCode, PushMessage, PushProvider, PushTicket, ReceiptStatus};
use civic_config::PushConfig;
use civic_push::{ExpoPushClient, PushError};
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, access_token: Option<&str>) -> ExpoPushClient {
    ExpoPushClient::new(PushConfig {
        api_url: server.uri(),
        access_token: access_token.map(str::to_string),
        request_timeout_secs: 2,
        ..PushConfig::default()
    })
    .unwrap()
}

fn message(to: &str) -> PushMessage {
    PushMessage {
        to: to.to_string(),
        title: "Air quality alert".to_string(),
        body: "AQI 152 in Sioux City".to_string(),
        data: HashMap::from([("alertType".to_string(), "air_quality".to_string())]),
        sound: "default",
        priority: "high",
    }
}

#[tokio::test]
async fn test_send_maps_tickets_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/send"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_json(json!([
            {
                "to": "ExponentPushToken[a]",
                "title": "Air quality alert",
                "body": "AQI 152 in Sioux City",
                "data": {"alertType": "air_quality"},
                "sound": "default",
                "priority": "high"
            },
            {
                "to": "ExponentPushToken[b]",
                "title": "Air quality alert",
                "body": "AQI 152 in Sioux City",
                "data": {"alertType": "air_quality"},
                "sound": "default",
                "priority": "high"
            }
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"status": "ok", "id": "ticket-1"},
                {
                    "status": "error",
                    "message": "\"ExponentPushToken[b]\" is not a registered push notification recipient",
                    "details": {"error": "DeviceNotRegistered"}
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("secret-token"));
    let tickets = client
        .send(&[message("ExponentPushToken[a]"), message("ExponentPushToken[b]")])
        .await
        .unwrap();

    assert_eq!(
        tickets[0],
        PushTicket::Accepted {
            receipt_id: "ticket-1".to_string()
        }
    );
    match &tickets[1] {
        PushTicket::Rejected { code, message } => {
            assert_eq!(*code, PushErrorCode::DeviceNotRegistered);
            assert!(message.as_deref().unwrap_or_default().contains("not a registered"));
        }
        other => panic!("unexpected ticket: {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/send"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let err = client
        .send_batch(&[message("ExponentPushToken[a]")])
        .await
        .unwrap_err();

    assert!(matches!(err, PushError::ApiError { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_ticket_count_mismatch_fails_the_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let err = client
        .send_batch(&[message("ExponentPushToken[a]")])
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::DecodeError(_)));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/send"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [{"status": "ok", "id": "late"}]}))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = ExpoPushClient::new(PushConfig {
        api_url: server.uri(),
        request_timeout_secs: 1,
        ..PushConfig::default()
    })
    .unwrap();

    let err = client
        .send_batch(&[message("ExponentPushToken[a]")])
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_receipts_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/push/getReceipts"))
        .and(body_json(json!({"ids": ["r1", "r2", "r3"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "r1": {"status": "ok"},
                "r2": {
                    "status": "error",
                    "message": "The device cannot receive push notifications anymore",
                    "details": {"error": "DeviceNotRegistered"}
                }
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let ids = vec!["r1".to_string(), "r2".to_string(), "r3".to_string()];
    let receipts = client.check_receipts(&ids).await.unwrap();

    assert_eq!(receipts.get("r1"), Some(&ReceiptStatus::Ok));
    assert!(matches!(
        receipts.get("r2"),
        Some(ReceiptStatus::Error {
            code: PushErrorCode::DeviceNotRegistered,
            ..
        })
    ));
    assert!(!receipts.contains_key("r3"));
}
