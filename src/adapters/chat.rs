//! Chat-array prompts: one `{role, content}` pair per message, content always a string.

use crate::adapters::{require_text_only, split_system, Dialect, Payload};
use crate::error::FormatError;
use crate::message::{ChatMessage, RenderedMessage};
use crate::template::PromptInfo;

pub(crate) fn format(
    dialect: Dialect,
    info: &PromptInfo,
    messages: &[RenderedMessage],
) -> Result<(Payload, Option<String>), FormatError> {
    require_text_only(info, messages)?;
    let (system_content, messages) = split_system(dialect, info, messages)?;
    let chat = messages
        .into_iter()
        .map(|message| ChatMessage {
            role: message.role.clone(),
            content: message.text_content(),
        })
        .collect();
    Ok((Payload::Chat(chat), system_content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Role;

    #[test]
    fn test_one_entry_per_message() {
        let info = PromptInfo::new("qa", "v1", "baseten_mistral_chat", "mistral").unwrap();
        let messages = vec![
            RenderedMessage::system("You are helpful."),
            RenderedMessage::user("Hi"),
            RenderedMessage::assistant("Hello!"),
            RenderedMessage::user("What color is the sky?"),
        ];
        let (payload, system) = format(Dialect::Baseten, &info, &messages).unwrap();
        let Payload::Chat(chat) = payload else {
            panic!("expected a chat payload");
        };

        assert!(system.is_none());
        assert_eq!(chat.len(), messages.len());
        assert_eq!(chat[0].role, Role::System);
        assert_eq!(chat[3].content, "What color is the sky?");
    }
}
