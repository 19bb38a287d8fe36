//! getMe: token verification

use hostwatch_telegram::TelegramError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_get_me_returns_bot_account() {
    let (server, client) = common::setup().await;
    Mock::given(method("POST"))
        .and(path(common::api_path("getMe")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {
                "id": 123456,
                "is_bot": true,
                "first_name": "Hostwatch",
                "username": "hostwatch_bot"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let me = client.get_me().await.expect("getMe failed");

    assert_eq!(me.id, 123456);
    assert!(me.is_bot);
    assert_eq!(me.username.as_deref(), Some("hostwatch_bot"));
}

#[tokio::test]
async fn test_get_me_with_bad_token() {
    let (server, client) = common::setup().await;
    common::mount_error(
        &server,
        "getMe",
        401,
        serde_json::json!({"ok": false, "error_code": 401, "description": "Unauthorized"}),
    )
    .await;

    let err = client.get_me().await.unwrap_err();

    match err {
        TelegramError::Api { code, description } => {
            assert_eq!(code, 401);
            assert_eq!(description, "Unauthorized");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_error_hides_token() {
    let (server, client) = common::setup().await;
    drop(server);

    let err = client.get_me().await.unwrap_err();

    assert!(matches!(err, TelegramError::Http(_)));
    assert!(!err.to_string().contains(common::TOKEN));
    assert!(!format!("{err:?}").contains(common::TOKEN));
}
