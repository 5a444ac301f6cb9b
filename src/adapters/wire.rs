//! Provider request JSON.
//!
//! This is the only place media bytes get base64 encoded. The returned object holds the
//! prompt-related fields of a request body (`messages`, `system`, `contents`, `tools`, ...);
//! the caller adds model and sampling parameters.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Value};

use crate::adapters::{BlockMessage, Dialect, Payload, PayloadBlock};
use crate::media::{MediaInput, MediaPayload};
use crate::template::MediaKind;

/// Standard base64 with padding.
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// `data:{content_type};base64,{data}`
pub fn data_url(content_type: &str, data: &[u8]) -> String {
    format!("data:{content_type};base64,{}", encode_base64(data))
}

/// Subtype of a content type without parameters: `image/png; q=1` gives `png`.
pub fn media_format(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .and_then(|essence| essence.split_once('/'))
        .map(|(_, subtype)| subtype.trim())
        .filter(|subtype| !subtype.is_empty())
        .unwrap_or("jpeg")
}

/// Request body fragment for `payload` in the dialect's wire format.
pub fn encode(
    dialect: Dialect,
    payload: &Payload,
    system_content: Option<&str>,
    tool_schema: Option<&Value>,
    output_schema: Option<&Value>,
) -> Value {
    let mut body = Map::new();
    match payload {
        Payload::Text(prompt) => {
            body.insert("prompt".to_string(), Value::String(prompt.clone()));
        }
        Payload::Chat(messages) => {
            body.insert("messages".to_string(), json!(messages));
        }
        Payload::Blocks(messages) => match dialect {
            Dialect::Vertex | Dialect::GeminiApi => {
                body.insert("contents".to_string(), messages.iter().map(gemini_message).collect());
            }
            Dialect::Anthropic => {
                body.insert("messages".to_string(), messages.iter().map(anthropic_message).collect());
            }
            Dialect::Bedrock => {
                body.insert("messages".to_string(), messages.iter().map(bedrock_message).collect());
            }
            _ => {
                body.insert("messages".to_string(), messages.iter().map(openai_message).collect());
            }
        },
    }

    if let Some(system) = system_content {
        let system = match dialect {
            Dialect::Vertex | Dialect::GeminiApi => ("system_instruction", json!({"parts": [{"text": system}]})),
            Dialect::Bedrock => ("system", json!([{ "text": system }])),
            _ => ("system", Value::String(system.to_string())),
        };
        body.insert(system.0.to_string(), system.1);
    }
    if let Some(tools) = tool_schema {
        body.insert("tools".to_string(), tools.clone());
    }
    if let Some(schema) = output_schema {
        body.insert("response_format".to_string(), schema.clone());
    }
    Value::Object(body)
}

fn openai_message(message: &BlockMessage) -> Value {
    let content: Vec<Value> = message.content.iter().map(openai_block).collect();
    json!({"role": message.role, "content": content})
}

fn openai_block(block: &PayloadBlock) -> Value {
    let (slot_name, kind, media) = match block {
        PayloadBlock::Text { value } => return json!({"type": "text", "text": value}),
        PayloadBlock::Media { slot_name, kind, media } => (slot_name, kind, media),
    };
    let MediaInput { content_type, payload } = media;
    match (kind, payload) {
        (MediaKind::Image, MediaPayload::Uri(url)) => json!({"type": "image_url", "image_url": {"url": url.as_str()}}),
        (MediaKind::Image, MediaPayload::Inline(data)) => {
            json!({"type": "image_url", "image_url": {"url": data_url(content_type, data)}})
        }
        (MediaKind::Audio, MediaPayload::Inline(data)) => {
            let format = match media_format(content_type) {
                "mpeg" => "mp3",
                other => other,
            };
            json!({"type": "input_audio", "input_audio": {"data": encode_base64(data), "format": format}})
        }
        (_, MediaPayload::Inline(data)) => json!({
            "type": "file",
            "file": {
                "filename": format!("{slot_name}.{}", media_format(content_type)),
                "file_data": data_url(content_type, data),
            }
        }),
        (_, MediaPayload::Uri(url)) => json!({"type": "file", "file": {"file_url": url.as_str()}}),
    }
}

fn anthropic_message(message: &BlockMessage) -> Value {
    let content: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            PayloadBlock::Text { value } => json!({"type": "text", "text": value}),
            PayloadBlock::Media { kind, media, .. } => {
                let block_type = if *kind == MediaKind::Image { "image" } else { "document" };
                let source = match &media.payload {
                    MediaPayload::Inline(data) => json!({
                        "type": "base64",
                        "media_type": media.content_type,
                        "data": encode_base64(data),
                    }),
                    MediaPayload::Uri(url) => json!({"type": "url", "url": url.as_str()}),
                };
                json!({"type": block_type, "source": source})
            }
        })
        .collect();
    json!({"role": message.role, "content": content})
}

fn bedrock_message(message: &BlockMessage) -> Value {
    let content: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            PayloadBlock::Text { value } => json!({ "text": value }),
            PayloadBlock::Media { slot_name, kind, media } => {
                let bytes = match &media.payload {
                    MediaPayload::Inline(data) => Value::String(encode_base64(data)),
                    // bedrock only takes bytes; URIs never get past format checks
                    MediaPayload::Uri(url) => Value::String(url.to_string()),
                };
                let format = media_format(&media.content_type);
                if *kind == MediaKind::Image {
                    json!({"image": {"format": format, "source": {"bytes": bytes}}})
                } else {
                    json!({"document": {"format": format, "name": slot_name, "source": {"bytes": bytes}}})
                }
            }
        })
        .collect();
    json!({"role": message.role, "content": content})
}

fn gemini_message(message: &BlockMessage) -> Value {
    let parts: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            PayloadBlock::Text { value } => json!({ "text": value }),
            PayloadBlock::Media { media, .. } => match &media.payload {
                MediaPayload::Inline(data) => json!({
                    "inline_data": {"mime_type": media.content_type, "data": encode_base64(data)}
                }),
                MediaPayload::Uri(url) => json!({
                    "file_data": {"mime_type": media.content_type, "file_uri": url.as_str()}
                }),
            },
        })
        .collect();
    json!({"role": message.role, "parts": parts})
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::message::ChatMessage;
    use crate::template::Role;

    fn media_message(kind: MediaKind, media: MediaInput) -> BlockMessage {
        BlockMessage {
            role: "user".into(),
            content: vec![
                PayloadBlock::Text { value: "see".into() },
                PayloadBlock::Media {
                    slot_name: "attachment".into(),
                    kind,
                    media,
                },
            ],
        }
    }

    #[test]
    fn test_media_format() {
        assert_eq!(media_format("image/png"), "png");
        assert_eq!(media_format("application/pdf; charset=binary"), "pdf");
        assert_eq!(media_format("garbage"), "jpeg");
    }

    #[test]
    fn test_openai_parts() {
        let payload = Payload::Blocks(vec![
            media_message(MediaKind::Image, MediaInput::bytes("image/png", b"png".to_vec())),
            media_message(MediaKind::Audio, MediaInput::bytes("audio/mpeg", b"mp3".to_vec())),
            media_message(MediaKind::File, MediaInput::bytes("application/pdf", b"pdf".to_vec())),
        ]);
        let body = encode(Dialect::OpenAi, &payload, None, None, None);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages[0]["content"][0], json!({"type": "text", "text": "see"}));
        assert_eq!(messages[0]["content"][1]["image_url"]["url"], "data:image/png;base64,cG5n");
        assert_eq!(messages[1]["content"][1]["input_audio"], json!({"data": "bXAz", "format": "mp3"}));
        assert_eq!(messages[2]["content"][1]["file"]["filename"], "attachment.pdf");
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_anthropic_sources() {
        let url = Url::parse("https://example.com/doc.pdf").unwrap();
        let payload = Payload::Blocks(vec![
            media_message(MediaKind::Image, MediaInput::bytes("image/jpeg", vec![0xff])),
            media_message(MediaKind::File, MediaInput::uri("application/pdf", url)),
        ]);
        let body = encode(Dialect::Anthropic, &payload, Some("be kind"), None, None);

        assert_eq!(body["system"], "be kind");
        assert_eq!(
            body["messages"][0]["content"][1],
            json!({"type": "image", "source": {"type": "base64", "media_type": "image/jpeg", "data": "/w=="}})
        );
        assert_eq!(
            body["messages"][1]["content"][1],
            json!({"type": "document", "source": {"type": "url", "url": "https://example.com/doc.pdf"}})
        );
    }

    #[test]
    fn test_bedrock_and_gemini() {
        let payload = Payload::Blocks(vec![media_message(MediaKind::Image, MediaInput::bytes("image/png", b"png".to_vec()))]);

        let bedrock = encode(Dialect::Bedrock, &payload, Some("sys"), None, None);
        assert_eq!(bedrock["system"], json!([{"text": "sys"}]));
        assert_eq!(
            bedrock["messages"][0]["content"][1],
            json!({"image": {"format": "png", "source": {"bytes": "cG5n"}}})
        );

        let gemini = encode(Dialect::GeminiApi, &payload, Some("sys"), None, None);
        assert_eq!(gemini["system_instruction"]["parts"][0]["text"], "sys");
        assert_eq!(
            gemini["contents"][0]["parts"][1],
            json!({"inline_data": {"mime_type": "image/png", "data": "cG5n"}})
        );
    }

    #[test]
    fn test_text_and_chat() {
        let flat = encode(Dialect::Llama3, &Payload::Text("<|begin_of_text|>".into()), None, None, None);
        assert_eq!(flat, json!({"prompt": "<|begin_of_text|>"}));

        let chat = Payload::Chat(vec![ChatMessage {
            role: Role::User,
            content: "hi".into(),
        }]);
        let body = encode(Dialect::Baseten, &chat, None, None, None);
        assert_eq!(body, json!({"messages": [{"role": "user", "content": "hi"}]}));
    }
}
