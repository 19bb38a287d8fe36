//! Integration tests for hostwatch-telegram
//!
//! Uses wiremock to stand in for the Bot API and checks requests, envelope
//! handling and the messenger adapter end to end.

mod common;

mod test_get_me;
mod test_messenger;
mod test_send_document;
mod test_send_message;
