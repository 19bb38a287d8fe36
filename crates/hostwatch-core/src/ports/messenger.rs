//! Messenger port (driven/secondary port)
//!
//! Delivery of administrator notifications and file attachments to the chat
//! platform.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because failure modes are adapter-specific
//!   (HTTP errors, API rejections, rate limits).
//! - A failed send is never retried by the adapter. Callers decide whether
//!   to queue the message for later.

use std::path::Path;

use crate::domain::{ChatId, OutboundMessage};

/// Port trait for chat delivery
#[async_trait::async_trait]
pub trait IMessenger: Send + Sync {
    /// Delivers a text message
    ///
    /// # Arguments
    /// * `message` - Recipient, text and formatting
    async fn send_message(&self, message: &OutboundMessage) -> anyhow::Result<()>;

    /// Uploads a local file as a document attachment
    ///
    /// # Arguments
    /// * `chat_id` - Recipient chat
    /// * `path` - File to upload; it is read in full at call time
    /// * `caption` - Text shown under the attachment
    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> anyhow::Result<()>;
}
