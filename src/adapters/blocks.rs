//! Structured-block prompts: every message is an ordered list of text and media blocks.

use crate::adapters::{split_system, BlockMessage, Dialect, Payload, PayloadBlock};
use crate::error::FormatError;
use crate::message::{ContentBlock, MessageContent, RenderedMessage};
use crate::template::PromptInfo;

pub(crate) fn format(
    dialect: Dialect,
    info: &PromptInfo,
    messages: &[RenderedMessage],
) -> Result<(Payload, Option<String>), FormatError> {
    let (system_content, messages) = split_system(dialect, info, messages)?;
    let formatted = messages
        .into_iter()
        .map(|message| block_message(dialect, info, message))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((Payload::Blocks(formatted), system_content))
}

fn block_message(dialect: Dialect, info: &PromptInfo, message: &RenderedMessage) -> Result<BlockMessage, FormatError> {
    let role = dialect.role(info, &message.role)?;
    let content = match &message.content {
        MessageContent::Text(text) => vec![PayloadBlock::Text { value: text.clone() }],
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => Ok(PayloadBlock::Text { value: text.clone() }),
                ContentBlock::Media { slot_name, kind, media } => {
                    dialect.check_media(info, *kind, media)?;
                    Ok(PayloadBlock::Media {
                        slot_name: slot_name.clone(),
                        kind: *kind,
                        media: media.clone(),
                    })
                }
            })
            .collect::<Result<Vec<_>, FormatError>>()?,
    };
    Ok(BlockMessage { role, content })
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::media::MediaInput;
    use crate::template::{MediaKind, Role};

    fn photo_message(media: MediaInput) -> RenderedMessage {
        RenderedMessage::new(
            Role::User,
            MessageContent::Blocks(vec![
                ContentBlock::text("before"),
                ContentBlock::Media {
                    slot_name: "photo".into(),
                    kind: MediaKind::Image,
                    media,
                },
                ContentBlock::text("after"),
            ]),
        )
    }

    #[test]
    fn test_block_order_preserved() {
        let info = PromptInfo::new("vision", "v2", "anthropic_chat", "claude").unwrap();
        let media = MediaInput::bytes("image/png", vec![1, 2]);
        let messages = vec![RenderedMessage::system("Describe images."), photo_message(media.clone())];

        let (payload, system) = format(Dialect::Anthropic, &info, &messages).unwrap();
        assert_eq!(system.as_deref(), Some("Describe images."));
        assert_eq!(
            payload,
            Payload::Blocks(vec![BlockMessage {
                role: "user".into(),
                content: vec![
                    PayloadBlock::Text { value: "before".into() },
                    PayloadBlock::Media {
                        slot_name: "photo".into(),
                        kind: MediaKind::Image,
                        media,
                    },
                    PayloadBlock::Text { value: "after".into() },
                ],
            }])
        );
    }

    #[test]
    fn test_openai_keeps_system_inline() {
        let info = PromptInfo::new("qa", "v1", "openai_chat", "gpt-4o").unwrap();
        let messages = vec![RenderedMessage::system("sys"), RenderedMessage::user("q")];
        let (payload, system) = format(Dialect::OpenAi, &info, &messages).unwrap();
        assert!(system.is_none());
        let Payload::Blocks(blocks) = payload else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].role, "system");
        assert_eq!(blocks[0].content, vec![PayloadBlock::Text { value: "sys".into() }]);
    }

    #[test]
    fn test_gemini_rejects_uri_media() {
        let info = PromptInfo::new("vision", "v2", "gemini_api_chat", "gemini-2.0").unwrap();
        let remote = MediaInput::uri("image/png", Url::parse("https://example.com/p.png").unwrap());
        let result = format(Dialect::GeminiApi, &info, &[photo_message(remote)]);
        assert!(matches!(result, Err(FormatError::UnsupportedContentForProvider { .. })));
    }

    #[test]
    fn test_gemini_assistant_becomes_model() {
        let info = PromptInfo::new("qa", "v1", "gemini_chat", "gemini-1.5").unwrap();
        let messages = vec![
            RenderedMessage::user("hi"),
            RenderedMessage::assistant("hello"),
            RenderedMessage::user("again"),
            RenderedMessage::text("model", "hello again"),
        ];
        let (payload, _) = format(Dialect::Vertex, &info, &messages).unwrap();
        let Payload::Blocks(blocks) = payload else {
            panic!("expected blocks");
        };
        assert_eq!(blocks[1].role, "model");
        assert_eq!(blocks[3].role, "model");
    }
}
