//! [`IMessenger`] adapter over the Bot API client

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use hostwatch_core::domain::{ChatId, OutboundMessage};
use hostwatch_core::ports::IMessenger;
use tracing::warn;

use crate::client::TelegramClient;
use crate::TelegramError;

/// Delivers notifications and attachments through Telegram
#[derive(Debug, Clone)]
pub struct TelegramMessenger {
    client: Arc<TelegramClient>,
}

impl TelegramMessenger {
    pub fn new(client: Arc<TelegramClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &TelegramClient {
        &self.client
    }
}

fn log_rate_limit(err: TelegramError) -> TelegramError {
    if let TelegramError::RateLimited { retry_after } = &err {
        warn!(retry_after_secs = retry_after.as_secs(), "Telegram flood control hit");
    }
    err
}

#[async_trait::async_trait]
impl IMessenger for TelegramMessenger {
    async fn send_message(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        self.client
            .send_message(message)
            .await
            .map_err(log_rate_limit)
            .context("sendMessage failed")?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> anyhow::Result<()> {
        self.client
            .send_document(chat_id, path, caption)
            .await
            .map_err(log_rate_limit)
            .with_context(|| format!("sendDocument failed for {}", path.display()))?;
        Ok(())
    }
}
