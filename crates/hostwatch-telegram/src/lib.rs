//! Hostwatch Telegram - Bot API delivery for administrator notifications
//!
//! - [`client::TelegramClient`] - typed calls to `sendMessage`, `sendDocument`
//!   and `getMe`
//! - [`messenger::TelegramMessenger`] - the
//!   [`IMessenger`](hostwatch_core::ports::IMessenger) adapter over the client

pub mod client;
pub mod messenger;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors returned by the Bot API client
///
/// Transport errors never carry the request URL, which embeds the token.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Connection, timeout or body decoding failure
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// The API answered `ok: false`
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Flood control; the request may be retried after the given delay
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// A file to upload could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        TelegramError::Http(e.without_url())
    }
}
