//! # Adapters
//! A [ProviderAdapter] shapes a [BoundPrompt] into what one provider dialect expects:
//! - [OutputShape::FlatString]: one prompt string with the dialect's control tokens,
//! - [OutputShape::ChatArray]: `{role, content}` pairs with string content,
//! - [OutputShape::StructuredBlocks]: messages made of ordered text and media blocks.
//!
//! The adapter is chosen once from the template's flavor. Turning the neutral payload into
//! provider JSON happens in [wire].

use serde_json::{json, Value};

use crate::bind::BoundPrompt;
use crate::error::FormatError;
use crate::media::{MediaInput, MediaPayload};
use crate::message::{ChatMessage, RenderedMessage};
use crate::template::{MediaKind, PromptInfo, Role, ToolSchema};

pub mod blocks;
pub mod chat;
pub mod flat;
pub mod wire;

/// Provider dialects with a known request format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    OpenAi,
    Anthropic,
    Bedrock,
    Vertex,
    GeminiApi,
    Baseten,
    Llama3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    FlatString,
    ChatArray,
    StructuredBlocks,
}

/// The closed set of payload shapes, each carrying its dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderAdapter {
    FlatString(Dialect),
    ChatArray(Dialect),
    StructuredBlocks(Dialect),
}

/// Neutral provider payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Chat(Vec<ChatMessage>),
    Blocks(Vec<BlockMessage>),
}

/// A message in structured-blocks form. `role` is already in the dialect's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMessage {
    pub role: String,
    pub content: Vec<PayloadBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadBlock {
    Text { value: String },
    Media { slot_name: String, kind: MediaKind, media: MediaInput },
}

/// What an adapter produced for one bound prompt.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Shaped {
    pub payload: Payload,
    pub system_content: Option<String>,
    pub tool_schema: Option<Value>,
    pub output_schema: Option<Value>,
}

impl ProviderAdapter {
    pub fn for_flavor(flavor: &str) -> Result<Self, FormatError> {
        let adapter = match flavor {
            "openai_chat" => ProviderAdapter::StructuredBlocks(Dialect::OpenAi),
            "anthropic_chat" => ProviderAdapter::StructuredBlocks(Dialect::Anthropic),
            "amazon_bedrock_converse" | "bedrock_converse" => ProviderAdapter::StructuredBlocks(Dialect::Bedrock),
            "gemini_chat" => ProviderAdapter::StructuredBlocks(Dialect::Vertex),
            "gemini_api_chat" => ProviderAdapter::StructuredBlocks(Dialect::GeminiApi),
            "baseten_mistral_chat" => ProviderAdapter::ChatArray(Dialect::Baseten),
            "llama_3_chat" => ProviderAdapter::FlatString(Dialect::Llama3),
            other => return Err(FormatError::UnknownFlavor(other.to_string())),
        };
        Ok(adapter)
    }

    pub fn dialect(&self) -> Dialect {
        match *self {
            ProviderAdapter::FlatString(dialect)
            | ProviderAdapter::ChatArray(dialect)
            | ProviderAdapter::StructuredBlocks(dialect) => dialect,
        }
    }

    pub fn shape(&self) -> OutputShape {
        match self {
            ProviderAdapter::FlatString(_) => OutputShape::FlatString,
            ProviderAdapter::ChatArray(_) => OutputShape::ChatArray,
            ProviderAdapter::StructuredBlocks(_) => OutputShape::StructuredBlocks,
        }
    }

    #[inline]
    pub fn provider(&self) -> &'static str {
        self.dialect().provider()
    }

    pub(crate) fn shape_prompt(&self, bound: &BoundPrompt) -> Result<Shaped, FormatError> {
        let dialect = self.dialect();
        let info = &bound.info;
        let (payload, system_content) = match self {
            ProviderAdapter::FlatString(_) => (flat::format(dialect, info, &bound.messages)?, None),
            ProviderAdapter::ChatArray(_) => chat::format(dialect, info, &bound.messages)?,
            ProviderAdapter::StructuredBlocks(_) => blocks::format(dialect, info, &bound.messages)?,
        };
        let tool_schema = match &bound.tool_schema {
            Some(tools) => Some(dialect.format_tools(info, tools)?),
            None => None,
        };
        let output_schema = match &bound.output_schema {
            Some(schema) if dialect == Dialect::OpenAi => Some(Value::Object(schema.clone())),
            Some(_) => return Err(FormatError::unsupported(info, "structured output schemas are not supported")),
            None => None,
        };
        Ok(Shaped {
            payload,
            system_content,
            tool_schema,
            output_schema,
        })
    }
}

impl Dialect {
    pub fn provider(&self) -> &'static str {
        match self {
            Dialect::OpenAi => "openai",
            Dialect::Anthropic => "anthropic",
            Dialect::Bedrock => "bedrock",
            Dialect::Vertex => "vertex",
            Dialect::GeminiApi => "gemini",
            Dialect::Baseten => "baseten",
            Dialect::Llama3 => "sagemaker",
        }
    }

    /// Whether system messages move out of the message list into a separate field.
    pub fn promotes_system(&self) -> bool {
        matches!(
            self,
            Dialect::Anthropic | Dialect::Bedrock | Dialect::Vertex | Dialect::GeminiApi
        )
    }

    fn is_gemini(&self) -> bool {
        matches!(self, Dialect::Vertex | Dialect::GeminiApi)
    }

    /// Translates a role to the dialect's vocabulary.
    pub(crate) fn role(&self, info: &PromptInfo, role: &Role) -> Result<String, FormatError> {
        if !self.is_gemini() {
            return Ok(role.as_str().to_string());
        }
        match role {
            Role::User => Ok("user".to_string()),
            Role::Assistant => Ok("model".to_string()),
            Role::Other(name) if name == "model" => Ok("model".to_string()),
            other => Err(FormatError::unsupported(info, format!("role '{other}' has no Gemini equivalent"))),
        }
    }

    /// Fails unless this dialect can carry `kind` media delivered as `media.payload`.
    pub(crate) fn check_media(&self, info: &PromptInfo, kind: MediaKind, media: &MediaInput) -> Result<(), FormatError> {
        let inline = matches!(media.payload, MediaPayload::Inline(_));
        let (kind_ok, delivery_ok) = match self {
            Dialect::OpenAi => match kind {
                MediaKind::Image => (true, true),
                MediaKind::File | MediaKind::Audio => (true, inline),
                MediaKind::Video => (false, false),
            },
            Dialect::Anthropic => (matches!(kind, MediaKind::Image | MediaKind::File), true),
            Dialect::Bedrock => (matches!(kind, MediaKind::Image | MediaKind::File), inline),
            Dialect::Vertex | Dialect::GeminiApi => (true, inline),
            Dialect::Baseten | Dialect::Llama3 => (false, false),
        };
        if !kind_ok {
            return Err(FormatError::unsupported(info, format!("{kind} media is not supported")));
        }
        if !delivery_ok {
            return Err(FormatError::unsupported(
                info,
                format!("{kind} media must be supplied as bytes, not a URI"),
            ));
        }
        Ok(())
    }

    /// Tool declarations in the dialect's request format.
    pub(crate) fn format_tools(&self, info: &PromptInfo, tools: &[ToolSchema]) -> Result<Value, FormatError> {
        let complete = || {
            tools
                .iter()
                .filter_map(|tool| Some((tool.name.as_str(), tool.description.as_deref()?, tool.parameters.as_ref()?)))
        };
        let formatted = match self {
            Dialect::OpenAi => Value::Array(
                tools
                    .iter()
                    .map(|tool| json!({"type": "function", "function": tool}))
                    .collect(),
            ),
            Dialect::Anthropic => Value::Array(
                complete()
                    .map(|(name, description, parameters)| {
                        json!({"name": name, "description": description, "input_schema": parameters})
                    })
                    .collect(),
            ),
            Dialect::Bedrock => Value::Array(
                complete()
                    .map(|(name, description, parameters)| {
                        json!({"name": name, "description": description, "inputSchema": parameters})
                    })
                    .collect(),
            ),
            Dialect::Vertex | Dialect::GeminiApi => {
                let declarations: Vec<Value> = tools.iter().map(|tool| json!(tool)).collect();
                json!([{ "functionDeclarations": declarations }])
            }
            Dialect::Baseten | Dialect::Llama3 => {
                return Err(FormatError::unsupported(info, "tool schemas are not supported"));
            }
        };
        Ok(formatted)
    }
}

/// Splits promoted system messages off. System texts are joined with a blank line.
pub(crate) fn split_system<'m>(
    dialect: Dialect,
    info: &PromptInfo,
    messages: &'m [RenderedMessage],
) -> Result<(Option<String>, Vec<&'m RenderedMessage>), FormatError> {
    if !dialect.promotes_system() {
        return Ok((None, messages.iter().collect()));
    }
    let mut system = Vec::new();
    let mut rest = Vec::with_capacity(messages.len());
    for message in messages {
        if message.role != Role::System {
            rest.push(message);
            continue;
        }
        if message.has_media() {
            return Err(FormatError::unsupported(info, "system messages cannot carry media"));
        }
        system.push(message.text_content());
    }
    let system_content = (!system.is_empty()).then(|| system.join("\n\n"));
    Ok((system_content, rest))
}

/// Fails if any message carries media; for shapes that only transport text.
pub(crate) fn require_text_only(info: &PromptInfo, messages: &[RenderedMessage]) -> Result<(), FormatError> {
    match messages.iter().find(|message| message.has_media()) {
        Some(message) => Err(FormatError::unsupported(
            info,
            format!("a {} message carries media but the provider only accepts text", message.role),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use url::Url;

    fn info(flavor: &str) -> PromptInfo {
        PromptInfo::new("t", "v1", flavor, "m").unwrap()
    }

    #[test]
    fn test_flavor_table() {
        let cases = [
            ("openai_chat", "openai", OutputShape::StructuredBlocks),
            ("anthropic_chat", "anthropic", OutputShape::StructuredBlocks),
            ("amazon_bedrock_converse", "bedrock", OutputShape::StructuredBlocks),
            ("bedrock_converse", "bedrock", OutputShape::StructuredBlocks),
            ("gemini_chat", "vertex", OutputShape::StructuredBlocks),
            ("gemini_api_chat", "gemini", OutputShape::StructuredBlocks),
            ("baseten_mistral_chat", "baseten", OutputShape::ChatArray),
            ("llama_3_chat", "sagemaker", OutputShape::FlatString),
        ];
        for (flavor, provider, shape) in cases {
            let adapter = ProviderAdapter::for_flavor(flavor).unwrap();
            assert_eq!(adapter.provider(), provider, "{flavor}");
            assert_eq!(adapter.shape(), shape, "{flavor}");
        }
        assert!(ProviderAdapter::for_flavor("azure_openai_chat").is_err());
    }

    #[test]
    fn test_gemini_roles() {
        let info = info("gemini_chat");
        assert_eq!(Dialect::Vertex.role(&info, &Role::Assistant).unwrap(), "model");
        assert_eq!(Dialect::Vertex.role(&info, &Role::User).unwrap(), "user");
        assert_eq!(Dialect::Vertex.role(&info, &Role::parse("model")).unwrap(), "model");
        assert_eq!(Dialect::GeminiApi.role(&info, &Role::Other("model".to_string())).unwrap(), "model");
        assert!(Dialect::GeminiApi.role(&info, &Role::Tool).is_err());
        assert_eq!(Dialect::Anthropic.role(&info, &Role::Assistant).unwrap(), "assistant");
    }

    #[test]
    fn test_media_capabilities() {
        let info = info("openai_chat");
        let bytes = MediaInput::bytes("image/png", vec![1]);
        let remote = MediaInput::uri("image/png", Url::parse("https://example.com/a.png").unwrap());

        assert!(Dialect::OpenAi.check_media(&info, MediaKind::Image, &remote).is_ok());
        assert!(Dialect::OpenAi.check_media(&info, MediaKind::File, &remote).is_err());
        assert!(Dialect::OpenAi.check_media(&info, MediaKind::Video, &bytes).is_err());
        assert!(Dialect::Anthropic.check_media(&info, MediaKind::File, &remote).is_ok());
        assert!(Dialect::Anthropic.check_media(&info, MediaKind::Audio, &bytes).is_err());
        assert!(Dialect::Bedrock.check_media(&info, MediaKind::Image, &remote).is_err());
        assert!(Dialect::Vertex.check_media(&info, MediaKind::Video, &bytes).is_ok());
        assert!(Dialect::Llama3.check_media(&info, MediaKind::Image, &bytes).is_err());
    }

    #[test]
    fn test_split_system_joins_and_requires_text() {
        let info = info("anthropic_chat");
        let messages = vec![
            RenderedMessage::system("one"),
            RenderedMessage::user("q"),
            RenderedMessage::system("two"),
        ];
        let (system, rest) = split_system(Dialect::Anthropic, &info, &messages).unwrap();
        assert_eq!(system.as_deref(), Some("one\n\ntwo"));
        assert_eq!(rest, vec![&messages[1]]);

        let (system, rest) = split_system(Dialect::OpenAi, &info, &messages).unwrap();
        assert!(system.is_none());
        assert_eq!(rest.len(), 3);
    }

    #[test]
    fn test_tool_formats() {
        let tools = vec![
            ToolSchema {
                name: "get_weather".into(),
                description: Some("Weather lookup".into()),
                parameters: Some(json!({"type": "object"})),
            },
            ToolSchema {
                name: "incomplete".into(),
                description: None,
                parameters: None,
            },
        ];
        let info = info("openai_chat");

        let openai = Dialect::OpenAi.format_tools(&info, &tools).unwrap();
        assert_eq!(openai[0]["type"], "function");
        assert_eq!(openai[0]["function"]["name"], "get_weather");
        assert_eq!(openai.as_array().unwrap().len(), 2);

        let anthropic = Dialect::Anthropic.format_tools(&info, &tools).unwrap();
        assert_eq!(
            anthropic,
            json!([{"name": "get_weather", "description": "Weather lookup", "input_schema": {"type": "object"}}])
        );

        let bedrock = Dialect::Bedrock.format_tools(&info, &tools).unwrap();
        assert_eq!(bedrock[0]["inputSchema"], json!({"type": "object"}));

        let gemini = Dialect::GeminiApi.format_tools(&info, &tools).unwrap();
        assert_eq!(gemini[0]["functionDeclarations"].as_array().unwrap().len(), 2);

        assert!(Dialect::Llama3.format_tools(&info, &tools).is_err());
    }
}
