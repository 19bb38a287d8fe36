//! Shared wiremock setup for Bot API tests

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hostwatch_telegram::client::TelegramClient;

pub const TOKEN: &str = "123456:TEST-TOKEN";

/// `/bot<token>/<method>`
pub fn api_path(api_method: &str) -> String {
    format!("/bot{TOKEN}/{api_method}")
}

/// Starts a mock server and a client pointing at it
pub async fn setup() -> (MockServer, Arc<TelegramClient>) {
    let server = MockServer::start().await;
    let client = TelegramClient::with_base_url(TOKEN, server.uri(), Duration::from_secs(5))
        .expect("client should build");
    (server, Arc::new(client))
}

/// Mounts an `ok: true` reply carrying a message with the given id
pub async fn mount_ok_message(server: &MockServer, api_method: &str, message_id: i64) {
    Mock::given(method("POST"))
        .and(path(api_path(api_method)))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {
                "message_id": message_id,
                "date": 1_760_000_000,
                "chat": {"id": 42, "type": "private"}
            }
        })))
        .mount(server)
        .await;
}

/// Mounts an `ok: false` reply
#[allow(dead_code)]
pub async fn mount_error(server: &MockServer, api_method: &str, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(api_path(api_method)))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}
