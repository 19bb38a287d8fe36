//! sendMessage: payload shape and error mapping

use std::time::Duration;

use hostwatch_core::domain::{ChatId, OutboundMessage};
use hostwatch_telegram::TelegramError;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_send_markdown_message() {
    let (server, client) = common::setup().await;
    Mock::given(method("POST"))
        .and(path(common::api_path("sendMessage")))
        .and(body_json(serde_json::json!({
            "chat_id": 42,
            "text": "✅ *Service started:* nginx (Port 80)",
            "parse_mode": "Markdown"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {"message_id": 7, "date": 0, "chat": {"id": 42, "type": "private"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sent = client
        .send_message(&OutboundMessage::markdown(
            ChatId::new(42),
            "✅ *Service started:* nginx (Port 80)",
        ))
        .await
        .expect("sendMessage failed");

    assert_eq!(sent.message_id, 7);
}

#[tokio::test]
async fn test_plain_message_omits_parse_mode() {
    let (server, client) = common::setup().await;
    Mock::given(method("POST"))
        .and(path(common::api_path("sendMessage")))
        .and(body_json(serde_json::json!({"chat_id": -100, "text": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {"message_id": 1}
        })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .send_message(&OutboundMessage::text(ChatId::new(-100), "hello"))
        .await
        .expect("sendMessage failed");
}

#[tokio::test]
async fn test_flood_control_maps_to_rate_limited() {
    let (server, client) = common::setup().await;
    common::mount_error(
        &server,
        "sendMessage",
        429,
        serde_json::json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 17",
            "parameters": {"retry_after": 17}
        }),
    )
    .await;

    let err = client
        .send_message(&OutboundMessage::text(ChatId::new(42), "x"))
        .await
        .unwrap_err();

    match err {
        TelegramError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(17))
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_request_maps_to_api_error() {
    let (server, client) = common::setup().await;
    common::mount_error(
        &server,
        "sendMessage",
        400,
        serde_json::json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        }),
    )
    .await;

    let err = client
        .send_message(&OutboundMessage::text(ChatId::new(1), "x"))
        .await
        .unwrap_err();

    assert!(matches!(err, TelegramError::Api { code: 400, .. }));
    assert!(err.to_string().contains("chat not found"));
}
