//! Outbound chat messages
//!
//! An [`OutboundMessage`] is the opaque unit the send-gate delivers or
//! queues. It carries everything needed to retry delivery later.

use serde::{Deserialize, Serialize};

use super::newtypes::ChatId;

/// Text formatting mode understood by the chat platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    Markdown,
}

impl ParseMode {
    /// Wire name used by the Telegram Bot API
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseMode::Markdown => "Markdown",
        }
    }
}

/// Escapes operator or host supplied text for a legacy Markdown message
///
/// The platform rejects the whole message when an entity is left unclosed,
/// so a lone `_` in a service label would make it undeliverable.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Wraps `text` in a legacy Markdown code span
///
/// Nothing can be escaped inside a code span, so backticks are replaced.
pub fn code_span(text: &str) -> String {
    format!("`{}`", text.replace('`', "'"))
}

/// A text message addressed to one chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub parse_mode: Option<ParseMode>,
}

impl OutboundMessage {
    /// Plain text, no formatting
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
        }
    }

    /// Text rendered with legacy Markdown (`*bold*`, `_italic_`)
    pub fn markdown(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: Some(ParseMode::Markdown),
        }
    }
}
