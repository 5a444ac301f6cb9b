//! # Template
//! A template is one immutable version of a stored prompt: an ordered list of [MessageSpec]s
//! plus the provider, model and parameters that travel with that version.
//!
//! ## MessageSpec
//! A message has a role and an ordered list of parts. A text part is a mustache string with
//! `{{placeholders}}`; a media part is a [MediaSlot] naming an attachment supplied at bind
//! time. Parts keep the order they were authored in, all the way to the provider payload.
//!
//! ## Sharing
//! A [TemplateDefinition] is created once per fetch and then only read, so resolvers hand it
//! out as `Arc<TemplateDefinition>` and any number of binds may run on it at once.

use std::collections::BTreeSet;
use std::fmt;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::adapters::ProviderAdapter;
use crate::error::FormatError;
use crate::utils::prompt_processing::get_placeholders;
use crate::utils::JsonMap;

/// Kind of media a slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    File,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::File => "file",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named hole for an attachment inside a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaSlot {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub placeholder_name: String,
}

impl MediaSlot {
    pub fn new(kind: MediaKind, placeholder_name: impl Into<String>) -> Self {
        Self {
            kind,
            placeholder_name: placeholder_name.into(),
        }
    }
}

/// Message role. Providers with roles outside the common four use [Role::Other].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Other(String),
}

impl Role {
    /// Parses a stored role. Legacy `Human`/`Assistant` spellings map onto the common roles.
    pub fn parse(role: &str) -> Self {
        match role {
            "system" => Role::System,
            "user" | "Human" => Role::User,
            "assistant" | "Assistant" => Role::Assistant,
            "tool" => Role::Tool,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Other(role) => role,
        }
    }
}

impl From<&str> for Role {
    fn from(role: &str) -> Self {
        Role::parse(role)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::parse(&raw))
    }
}

/// One authored piece of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Text(String),
    Media(MediaSlot),
}

/// A message skeleton inside a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSpec {
    pub role: Role,
    pub parts: Vec<TemplatePart>,
}

impl MessageSpec {
    /// A text-only message.
    pub fn text(role: impl Into<Role>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: vec![TemplatePart::Text(content.into())],
        }
    }

    /// Appends a media slot after the parts authored so far.
    pub fn with_media(mut self, slot: MediaSlot) -> Self {
        self.parts.push(TemplatePart::Media(slot));
        self
    }

    /// Appends another text part after the parts authored so far.
    pub fn with_text(mut self, content: impl Into<String>) -> Self {
        self.parts.push(TemplatePart::Text(content.into()));
        self
    }

    pub fn media_slots(&self) -> impl Iterator<Item = &MediaSlot> {
        self.parts.iter().filter_map(|part| match part {
            TemplatePart::Media(slot) => Some(slot),
            TemplatePart::Text(_) => None,
        })
    }

    pub fn placeholders(&self) -> BTreeSet<String> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                TemplatePart::Text(text) => Some(get_placeholders(text)),
                TemplatePart::Media(_) => None,
            })
            .flatten()
            .collect()
    }
}

/// A function/tool declaration stored with a template version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

/// Identity and model metadata of a template version. Formatting copies it into every
/// [FormattedPrompt](crate::formatted::FormattedPrompt), so later refetches never leak into
/// prompts that were already produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptInfo {
    pub project_id: String,
    pub prompt_template_id: String,
    pub prompt_template_version_id: String,
    pub template_name: String,
    pub environment: Option<String>,
    pub provider: String,
    pub flavor: String,
    pub model: String,
    pub model_parameters: JsonMap,
    pub provider_info: JsonMap,
}

impl PromptInfo {
    /// Fails when no adapter exists for `flavor`; the provider name is taken from that adapter.
    pub fn new(
        template_name: impl Into<String>,
        version_id: impl Into<String>,
        flavor: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, FormatError> {
        let flavor = flavor.into();
        let adapter = ProviderAdapter::for_flavor(&flavor)?;
        Ok(Self {
            project_id: String::new(),
            prompt_template_id: String::new(),
            prompt_template_version_id: version_id.into(),
            template_name: template_name.into(),
            environment: None,
            provider: adapter.provider().to_string(),
            flavor,
            model: model.into(),
            model_parameters: JsonMap::new(),
            provider_info: JsonMap::new(),
        })
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_template_id(mut self, template_id: impl Into<String>) -> Self {
        self.prompt_template_id = template_id.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_model_parameters(mut self, parameters: JsonMap) -> Self {
        self.model_parameters = parameters;
        self
    }

    pub fn with_provider_info(mut self, provider_info: JsonMap) -> Self {
        self.provider_info = provider_info;
        self
    }
}

/// One immutable, fetched template version.
#[derive(Debug, Clone)]
#[readonly::make]
pub struct TemplateDefinition {
    /// Identity and model metadata, readonly
    #[readonly]
    pub info: PromptInfo,

    /// The message skeleton in authored order, readonly
    #[readonly]
    pub messages: Vec<MessageSpec>,

    /// Function/tool declarations, readonly
    #[readonly]
    pub tool_schema: Option<Vec<ToolSchema>>,

    /// Structured output schema, readonly
    #[readonly]
    pub output_schema: Option<JsonMap>,

    /// Values used for placeholders the caller leaves out, readonly
    #[readonly]
    pub variable_defaults: JsonMap,

    /// Whether the stored template marked where history belongs, readonly
    #[readonly]
    pub has_history_placeholder: bool,

    adapter: ProviderAdapter,
}

impl TemplateDefinition {
    /// Creates a template version. The provider adapter is chosen here, once, from the flavor.
    /// Warns if the template does not have any placeholder or media slot.
    pub fn new(mut info: PromptInfo, messages: Vec<MessageSpec>) -> Result<Self, FormatError> {
        let adapter = ProviderAdapter::for_flavor(&info.flavor)?;
        info.provider = adapter.provider().to_string();

        let definition = Self {
            info,
            messages,
            tool_schema: None,
            output_schema: None,
            variable_defaults: JsonMap::new(),
            has_history_placeholder: false,
            adapter,
        };
        if definition.placeholders().is_empty() && definition.media_slots().next().is_none() {
            warn!(
                "Prompt template '{}' (version {}) does not have a placeholder. If this is intended, \
                ignore this message. Otherwise, check whether you have written placeholders correctly.",
                definition.info.template_name, definition.info.prompt_template_version_id
            );
        }
        Ok(definition)
    }

    pub fn with_tool_schema(mut self, tool_schema: Vec<ToolSchema>) -> Self {
        self.tool_schema = Some(tool_schema);
        self
    }

    pub fn with_output_schema(mut self, output_schema: JsonMap) -> Self {
        self.output_schema = Some(output_schema);
        self
    }

    pub fn with_variable_defaults(mut self, defaults: JsonMap) -> Self {
        self.variable_defaults = defaults;
        self
    }

    pub fn with_history_placeholder(mut self, has_placeholder: bool) -> Self {
        self.has_history_placeholder = has_placeholder;
        self
    }

    /// The adapter that shapes every prompt bound from this version.
    #[inline]
    pub fn adapter(&self) -> ProviderAdapter {
        self.adapter
    }

    /// Every variable name referenced by any message, sorted.
    pub fn placeholders(&self) -> BTreeSet<String> {
        self.messages.iter().flat_map(MessageSpec::placeholders).collect()
    }

    pub fn media_slots(&self) -> impl Iterator<Item = &MediaSlot> {
        self.messages.iter().flat_map(MessageSpec::media_slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::OutputShape;

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!(Role::parse("Human"), Role::User);
        assert_eq!(Role::parse("Assistant"), Role::Assistant);
        assert_eq!(Role::parse("model"), Role::Other("model".to_string()));
        assert_eq!(Role::Tool.to_string(), "tool");

        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
        assert_eq!(serde_json::to_string(&Role::Other("developer".into())).unwrap(), "\"developer\"");
    }

    #[test]
    fn test_definition_picks_adapter_from_flavor() {
        let info = PromptInfo::new("qa", "v1", "llama_3_chat", "llama-3-8b").unwrap();
        assert_eq!(info.provider, "sagemaker");

        let definition = TemplateDefinition::new(info, vec![MessageSpec::text("user", "Q: {{question}}")]).unwrap();
        assert_eq!(definition.adapter().shape(), OutputShape::FlatString);
        assert_eq!(definition.placeholders(), BTreeSet::from(["question".to_string()]));
    }

    #[test]
    fn test_unknown_flavor_is_rejected() {
        let err = PromptInfo::new("qa", "v1", "carrier_pigeon", "none").unwrap_err();
        assert_eq!(err, FormatError::UnknownFlavor("carrier_pigeon".to_string()));
    }

    #[test]
    fn test_media_slots_keep_authored_order() {
        let spec = MessageSpec::text("user", "Compare")
            .with_media(MediaSlot::new(MediaKind::Image, "left"))
            .with_text("with")
            .with_media(MediaSlot::new(MediaKind::Image, "right"));
        let names: Vec<_> = spec.media_slots().map(|slot| slot.placeholder_name.as_str()).collect();
        assert_eq!(names, vec!["left", "right"]);
    }
}
