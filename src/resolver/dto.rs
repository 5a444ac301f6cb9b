//! Stored template JSON, as served by the API and as written in filesystem bundles.

use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::error::FetchError;
use crate::template::{MediaSlot, MessageSpec, PromptInfo, Role, TemplateDefinition, TemplatePart, ToolSchema};
use crate::utils::JsonMap;

#[derive(Debug, Deserialize)]
pub(crate) struct TemplatesDto {
    pub prompt_templates: Vec<TemplateDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TemplateDto {
    pub prompt_template_id: String,
    pub prompt_template_version_id: String,
    #[serde(alias = "name")]
    pub prompt_template_name: String,
    pub content: ContentDto,
    #[serde(default)]
    pub metadata: MetadataDto,
    #[serde(default)]
    pub format_version: Option<i64>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tool_schema: Option<Vec<ToolSchema>>,
    #[serde(default)]
    pub output_schema: Option<JsonMap>,
    #[serde(default)]
    pub variable_defaults: Option<JsonMap>,
}

/// Current formats store the messages inline; the legacy format stores them as a JSON string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ContentDto {
    Messages(Vec<MessageDto>),
    Encoded(String),
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MetadataDto {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub flavor_name: Option<String>,
    #[serde(default)]
    pub params: Option<JsonMap>,
    #[serde(default)]
    pub provider_info: Option<JsonMap>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageDto {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub media_slots: Vec<MediaSlot>,
    /// Explicit part order; overrides `content` + `media_slots` when present.
    #[serde(default)]
    pub blocks: Option<Vec<BlockDto>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum BlockDto {
    Text { text: String },
    Media(MediaSlot),
}

impl TemplateDto {
    /// Converts a stored template into a definition. `environment` is the label it was fetched
    /// under, if any.
    pub fn into_definition(self, project_id: &str, environment: Option<&str>) -> Result<TemplateDefinition, FetchError> {
        let name = self.prompt_template_name;
        let invalid = |detail: String| FetchError::InvalidTemplate {
            name: name.clone(),
            detail,
        };

        let MetadataDto {
            provider,
            model,
            flavor,
            flavor_name,
            params,
            provider_info,
        } = self.metadata;
        let mut params = params.unwrap_or_default();

        let (messages, flavor, model) = match self.format_version {
            Some(2) | Some(3) => {
                let ContentDto::Messages(messages) = self.content else {
                    return Err(invalid("content must be a list of messages".to_string()));
                };
                let flavor = flavor.ok_or_else(|| invalid("metadata.flavor is missing".to_string()))?;
                let model = model.ok_or_else(|| invalid("metadata.model is missing".to_string()))?;
                (messages, flavor, model)
            }
            None => {
                let messages = match self.content {
                    ContentDto::Encoded(encoded) => serde_json::from_str::<Vec<MessageDto>>(&encoded)?,
                    ContentDto::Messages(messages) => messages,
                };
                let flavor = flavor_name
                    .or(flavor)
                    .ok_or_else(|| invalid("a flavor must be configured for this template".to_string()))?;
                let model = match params.remove("model") {
                    Some(Value::String(model)) => model,
                    _ => model.ok_or_else(|| invalid("a model must be configured for this template".to_string()))?,
                };
                (messages, flavor, model)
            }
            Some(other) => return Err(invalid(format!("unsupported format_version {other}"))),
        };

        let mut has_history_placeholder = false;
        let mut specs = Vec::with_capacity(messages.len());
        for message in messages {
            match message.kind.as_deref() {
                Some("history") => {
                    has_history_placeholder = true;
                    continue;
                }
                Some(other) => return Err(invalid(format!("unknown message kind '{other}'"))),
                None => {}
            }
            let role = message.role.ok_or_else(|| invalid("a message has no role".to_string()))?;
            let parts = match message.blocks {
                Some(blocks) => blocks
                    .into_iter()
                    .map(|block| match block {
                        BlockDto::Text { text } => TemplatePart::Text(text),
                        BlockDto::Media(slot) => TemplatePart::Media(slot),
                    })
                    .collect(),
                None => std::iter::once(TemplatePart::Text(message.content.unwrap_or_default()))
                    .chain(message.media_slots.into_iter().map(TemplatePart::Media))
                    .collect(),
            };
            specs.push(MessageSpec { role, parts });
        }

        let mut info = PromptInfo::new(name.clone(), self.prompt_template_version_id, flavor, model)
            .map_err(|e| invalid(e.to_string()))?
            .with_project_id(self.project_id.unwrap_or_else(|| project_id.to_string()))
            .with_template_id(self.prompt_template_id)
            .with_model_parameters(params)
            .with_provider_info(provider_info.unwrap_or_default());
        if let Some(environment) = environment {
            info = info.with_environment(environment);
        }

        let mut definition = TemplateDefinition::new(info, specs)
            .map_err(|e| invalid(e.to_string()))?
            .with_history_placeholder(has_history_placeholder)
            .with_variable_defaults(self.variable_defaults.unwrap_or_default());
        if let Some(tools) = self.tool_schema {
            definition = definition.with_tool_schema(tools);
        }
        if let Some(schema) = self.output_schema {
            definition = definition.with_output_schema(schema);
        }
        if let Some(stored) = provider.filter(|stored| *stored != definition.info.provider) {
            warn!(
                "Template '{}' (version {}) is stored with provider '{}' but its flavor '{}' belongs to '{}'",
                definition.info.template_name,
                definition.info.prompt_template_version_id,
                stored,
                definition.info.flavor,
                definition.info.provider
            );
        }
        Ok(definition)
    }
}
