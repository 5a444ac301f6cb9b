//! Rendered messages: the canonical, provider-neutral transcript entries.

use serde::{Deserialize, Serialize};

use crate::media::MediaInput;
use crate::template::{MediaKind, Role};

/// Content of a rendered message. Plain text unless the message carries media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One ordered piece of a multimodal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text { text: String },
    Media { slot_name: String, kind: MediaKind, media: MediaInput },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn is_media(&self) -> bool {
        matches!(self, ContentBlock::Media { .. })
    }
}

/// A fully substituted message, as sent to a provider and as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl RenderedMessage {
    pub fn new(role: impl Into<Role>, content: MessageContent) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }

    pub fn text(role: impl Into<Role>, text: impl Into<String>) -> Self {
        Self::new(role, MessageContent::Text(text.into()))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// Concatenated text of the message; media blocks contribute nothing.
    pub fn text_content(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::Media { .. } => None,
                })
                .collect(),
        }
    }

    pub fn has_media(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Blocks(blocks) => blocks.iter().any(ContentBlock::is_media),
        }
    }

    /// Blocks of the message; a text message is one text block.
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match &self.content {
            MessageContent::Text(text) => vec![ContentBlock::text(text.clone())],
            MessageContent::Blocks(blocks) => blocks.clone(),
        }
    }
}

/// A completion as returned by a provider, in the plain role/content form used by
/// chat-array payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<ChatMessage> for RenderedMessage {
    fn from(message: ChatMessage) -> Self {
        RenderedMessage::text(message.role, message.content)
    }
}
