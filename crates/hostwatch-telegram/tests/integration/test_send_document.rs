//! sendDocument: multipart upload

use hostwatch_core::domain::ChatId;
use hostwatch_telegram::TelegramError;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_send_document_uploads_file() {
    let (server, client) = common::setup().await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.pdf");
    std::fs::write(&file, b"%PDF-1.7 hostwatch").unwrap();

    Mock::given(method("POST"))
        .and(path(common::api_path("sendDocument")))
        .and(body_string_contains("name=\"document\"; filename=\"report.pdf\""))
        .and(body_string_contains("%PDF-1.7 hostwatch"))
        .and(body_string_contains("Sent automatically"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {"message_id": 99}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sent = client
        .send_document(ChatId::new(42), &file, "Sent automatically")
        .await
        .expect("sendDocument failed");

    assert_eq!(sent.message_id, 99);
}

#[tokio::test]
async fn test_missing_file_fails_before_request() {
    let (server, client) = common::setup().await;
    common::mount_ok_message(&server, "sendDocument", 1).await;

    let err = client
        .send_document(ChatId::new(42), std::path::Path::new("/nonexistent/x.bin"), "")
        .await
        .unwrap_err();

    assert!(matches!(err, TelegramError::Io { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}
