//! Conversation history: merging it in front of rendered messages, and a caller-owned
//! accumulator for multi-turn use.

use log::warn;

use crate::bind::BindRequest;
use crate::formatted::FormattedPrompt;
use crate::message::RenderedMessage;
use crate::template::{Role, TemplateDefinition};
use crate::utils::JsonMap;

/// `history ++ rendered`. History is kept verbatim: no dedup, reorder or truncation.
pub fn merge_history(history: Option<&[RenderedMessage]>, rendered: Vec<RenderedMessage>) -> Vec<RenderedMessage> {
    match history {
        Some(history) if !history.is_empty() => {
            let mut merged = Vec::with_capacity(history.len() + rendered.len());
            merged.extend_from_slice(history);
            merged.extend(rendered);
            merged
        }
        _ => rendered,
    }
}

/// Warns when supplied history and the template's history placeholder disagree.
pub(crate) fn check_history_placeholder(template: &TemplateDefinition, history: Option<&[RenderedMessage]>) {
    let has_history = history.is_some_and(|history| !history.is_empty());
    if has_history && !template.has_history_placeholder {
        warn!(
            "History supplied to template '{}' (version {}) which has no history placeholder, prepending it anyway",
            template.info.template_name, template.info.prompt_template_version_id
        );
    } else if !has_history && template.has_history_placeholder {
        warn!(
            "Template '{}' (version {}) has a history placeholder but no history was supplied",
            template.info.template_name, template.info.prompt_template_version_id
        );
    }
}

/// A transcript owned by the caller and threaded through successive binds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<RenderedMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<RenderedMessage>) -> Self {
        Self { messages }
    }

    #[inline]
    pub fn messages(&self) -> &[RenderedMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: RenderedMessage) {
        self.messages.push(message);
    }

    /// A bind request carrying `variables` and the accumulated history.
    pub fn request(&self, variables: JsonMap) -> BindRequest {
        BindRequest::new(variables).with_history(self.messages.clone())
    }

    /// Appends one turn: the non-system messages `formatted` rendered from its template, then
    /// `completion`. `formatted` should have been bound with this conversation's history.
    /// System messages stay out, since the template renders them again on every turn.
    pub fn advance(&mut self, formatted: &FormattedPrompt, completion: RenderedMessage) {
        self.messages.extend(
            formatted
                .rendered_messages()
                .iter()
                .filter(|message| message.role != Role::System)
                .cloned(),
        );
        self.messages.push(completion);
    }

    /// Keeps only the last `n` messages.
    pub fn truncate_to_last(&mut self, n: usize) {
        let excess = self.messages.len().saturating_sub(n);
        self.messages.drain(..excess);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn into_messages(self) -> Vec<RenderedMessage> {
        self.messages
    }
}
