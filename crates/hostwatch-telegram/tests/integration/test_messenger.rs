//! TelegramMessenger as an IMessenger

use std::sync::Arc;

use hostwatch_core::domain::{ChatId, OutboundMessage};
use hostwatch_core::ports::IMessenger;
use hostwatch_telegram::messenger::TelegramMessenger;

use crate::common;

#[tokio::test]
async fn test_messenger_delivers_text_and_documents() {
    let (server, client) = common::setup().await;
    common::mount_ok_message(&server, "sendMessage", 1).await;
    common::mount_ok_message(&server, "sendDocument", 2).await;
    let messenger: Arc<dyn IMessenger> = Arc::new(TelegramMessenger::new(client));

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.txt");
    std::fs::write(&file, b"a").unwrap();

    messenger
        .send_message(&OutboundMessage::markdown(ChatId::new(42), "*hi*"))
        .await
        .expect("send_message failed");
    messenger
        .send_document(ChatId::new(42), &file, "caption")
        .await
        .expect("send_document failed");

    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_messenger_surfaces_failures() {
    let (server, client) = common::setup().await;
    common::mount_error(
        &server,
        "sendMessage",
        502,
        serde_json::json!({"ok": false, "error_code": 502, "description": "Bad Gateway"}),
    )
    .await;
    let messenger = TelegramMessenger::new(client);

    let err = messenger
        .send_message(&OutboundMessage::text(ChatId::new(42), "x"))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("Bad Gateway"));
}
