//! Slash-command response payloads, in the chat platform's webhook format.

use serde::Serialize;

/// An attachment rendered under a message, used for pull request links.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Attachment {
    pub title: String,
    pub title_link: String,
}

/// A webhook reply. `ephemeral` responses are shown only to the requester,
/// `in_channel` responses are announced to everyone.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlashResponse {
    pub response_type: &'static str,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl SlashResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: "ephemeral",
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn in_channel(text: impl Into<String>) -> Self {
        Self {
            response_type: "in_channel",
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

/// Escape the chat platform's control characters in user-supplied text.
pub fn escape_message(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
