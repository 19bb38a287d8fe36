//! Telegram Bot API client
//!
//! Every method is a `POST {base}/bot{token}/{method}` returning the standard
//! envelope:
//!
//! ```text
//! { "ok": true,  "result": ... }
//! { "ok": false, "error_code": 429, "description": "...",
//!   "parameters": { "retry_after": 5 } }
//! ```
//!
//! The client never retries. Callers decide what a failed delivery means.

use std::path::Path;
use std::time::Duration;

use hostwatch_core::domain::{ChatId, OutboundMessage};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::TelegramError;

/// Public Bot API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Bot API payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

/// The bot's own account, from `getMe`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub username: Option<String>,
}

/// The part of a sent `Message` the client reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

// ============================================================================
// TelegramClient
// ============================================================================

pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TelegramClient {
    /// Creates a client for the public API
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend)
    pub fn new(token: impl Into<String>) -> Result<Self, TelegramError> {
        Self::with_base_url(token, DEFAULT_API_BASE, DEFAULT_TIMEOUT)
    }

    /// Creates a client against a custom endpoint (local Bot API server, tests)
    ///
    /// # Arguments
    /// * `token` - Bot token from @BotFather
    /// * `base_url` - Endpoint without trailing `/bot<token>`
    /// * `timeout` - Per-request timeout
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn endpoint(&self, method: &str) -> RequestBuilder {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        self.client.post(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: RequestBuilder,
    ) -> Result<T, TelegramError> {
        let response = request.send().await?;
        let status = response.status();
        let body: ApiResponse<T> = response.json().await?;

        if body.ok {
            return body.result.ok_or_else(|| TelegramError::Api {
                code: i64::from(status.as_u16()),
                description: format!("{method}: response without result"),
            });
        }

        if let Some(secs) = body.parameters.and_then(|p| p.retry_after) {
            return Err(TelegramError::RateLimited {
                retry_after: Duration::from_secs(secs),
            });
        }

        Err(TelegramError::Api {
            code: body.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
            description: body.description.unwrap_or_else(|| status.to_string()),
        })
    }

    /// Verifies the token and returns the bot account
    pub async fn get_me(&self) -> Result<BotUser, TelegramError> {
        self.call("getMe", self.endpoint("getMe")).await
    }

    /// Sends a text message
    pub async fn send_message(&self, message: &OutboundMessage) -> Result<SentMessage, TelegramError> {
        let payload = SendMessageRequest {
            chat_id: message.chat_id.get(),
            text: &message.text,
            parse_mode: message.parse_mode.map(|m| m.as_str()),
        };
        let sent: SentMessage = self
            .call("sendMessage", self.endpoint("sendMessage").json(&payload))
            .await?;
        debug!(chat_id = %message.chat_id, message_id = sent.message_id, "Message sent");
        Ok(sent)
    }

    /// Uploads a local file as a document
    ///
    /// The file is read into memory before the request is built.
    pub async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<SentMessage, TelegramError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| TelegramError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let size = bytes.len();

        let form = Form::new()
            .text("chat_id", chat_id.get().to_string())
            .text("caption", caption.to_string())
            .part("document", Part::bytes(bytes).file_name(file_name));

        let sent: SentMessage = self
            .call("sendDocument", self.endpoint("sendDocument").multipart(form))
            .await?;
        debug!(chat_id = %chat_id, path = %path.display(), size, "Document sent");
        Ok(sent)
    }
}
