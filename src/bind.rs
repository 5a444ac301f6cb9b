//! # Bind
//! Binding turns a [TemplateDefinition] plus a [BindRequest] into a [BoundPrompt]:
//! 1. every text part is substituted with the request's variables, falling back to the
//!    template's variable defaults,
//! 2. every media slot is resolved against the request's media inputs,
//! 3. the request's history is put in front of the rendered messages.
//!
//! Any failure aborts the whole bind; there is no partially bound prompt.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::Value;

use crate::adapters::ProviderAdapter;
use crate::error::BindError;
use crate::history::{check_history_placeholder, merge_history};
use crate::media::{resolve_slot, unused_inputs, MediaInputCollection};
use crate::message::{ContentBlock, MessageContent, RenderedMessage};
use crate::substitution::render_with_defaults;
use crate::template::{MessageSpec, PromptInfo, TemplateDefinition, TemplatePart, ToolSchema};
use crate::utils::JsonMap;

/// Everything a caller supplies for one bind.
#[derive(Debug, Clone, Default)]
pub struct BindRequest {
    variables: JsonMap,
    history: Option<Vec<RenderedMessage>>,
    media_inputs: Option<MediaInputCollection>,
}

impl BindRequest {
    pub fn new(variables: JsonMap) -> Self {
        Self {
            variables,
            ..Default::default()
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_history(mut self, history: Vec<RenderedMessage>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_media_inputs(mut self, media_inputs: MediaInputCollection) -> Self {
        self.media_inputs = Some(media_inputs);
        self
    }

    #[inline]
    pub fn variables(&self) -> &JsonMap {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut JsonMap {
        &mut self.variables
    }

    pub fn history(&self) -> Option<&[RenderedMessage]> {
        self.history.as_deref()
    }

    pub fn history_mut(&mut self) -> &mut Vec<RenderedMessage> {
        self.history.get_or_insert_with(Vec::new)
    }

    pub fn media_inputs(&self) -> Option<&MediaInputCollection> {
        self.media_inputs.as_ref()
    }

    pub fn media_inputs_mut(&mut self) -> &mut MediaInputCollection {
        self.media_inputs.get_or_insert_with(MediaInputCollection::new)
    }
}

/// Advisory conditions found while binding. They never stop a bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindWarning {
    /// A media input no slot of the template refers to.
    UnusedMediaInput(String),
}

impl fmt::Display for BindWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindWarning::UnusedMediaInput(name) => write!(f, "media input '{name}' is not used by the template"),
        }
    }
}

/// A template with every placeholder and media slot filled, history first.
/// Owns snapshots of everything it needs, so it outlives the template it was bound from.
#[derive(Debug, Clone)]
#[readonly::make]
pub struct BoundPrompt {
    /// Metadata of the template version, readonly
    #[readonly]
    pub info: PromptInfo,

    /// History followed by the rendered template messages, readonly
    #[readonly]
    pub messages: Vec<RenderedMessage>,

    /// How many of `messages` came from the supplied history, readonly
    #[readonly]
    pub history_len: usize,

    #[readonly]
    pub tool_schema: Option<Vec<ToolSchema>>,

    #[readonly]
    pub output_schema: Option<JsonMap>,

    #[readonly]
    pub warnings: Vec<BindWarning>,

    /// The variables the prompt was bound with, readonly
    #[readonly]
    pub inputs: JsonMap,

    #[readonly]
    pub media_inputs: Option<MediaInputCollection>,

    pub(crate) adapter: ProviderAdapter,
}

impl TemplateDefinition {
    /// Binds `request` into this template. See the [module docs](crate::bind).
    pub fn bind(&self, request: BindRequest) -> Result<BoundPrompt, BindError> {
        check_history_placeholder(self, request.history());

        let rendered = self
            .messages
            .iter()
            .enumerate()
            .map(|(index, spec)| self.render_message(index, spec, &request))
            .collect::<Result<Vec<_>, _>>()?;

        let referenced: BTreeSet<&str> = self.media_slots().map(|slot| slot.placeholder_name.as_str()).collect();
        let warnings = unused_inputs(request.media_inputs(), &referenced)
            .into_iter()
            .map(BindWarning::UnusedMediaInput)
            .collect();

        let BindRequest {
            variables,
            history,
            media_inputs,
        } = request;
        let history_len = history.as_ref().map_or(0, Vec::len);
        Ok(BoundPrompt {
            info: self.info.clone(),
            messages: merge_history(history.as_deref(), rendered),
            history_len,
            tool_schema: self.tool_schema.clone(),
            output_schema: self.output_schema.clone(),
            warnings,
            inputs: variables,
            media_inputs,
            adapter: self.adapter(),
        })
    }

    fn render_message(&self, index: usize, spec: &MessageSpec, request: &BindRequest) -> Result<RenderedMessage, BindError> {
        if spec.parts.is_empty() {
            return Err(BindError::InvalidTemplate {
                template: self.info.template_name.clone(),
                version: self.info.prompt_template_version_id.clone(),
                detail: format!("message {index} ({}) has no content", spec.role),
            });
        }

        let mut blocks = Vec::with_capacity(spec.parts.len());
        for part in &spec.parts {
            match part {
                TemplatePart::Text(text) => {
                    let text = render_with_defaults(text, request.variables(), &self.variable_defaults)
                        .map_err(|e| e.in_template(&self.info))?;
                    blocks.push(ContentBlock::Text { text });
                }
                TemplatePart::Media(slot) => {
                    let block = resolve_slot(request.media_inputs(), slot).ok_or_else(|| {
                        BindError::UnresolvedMediaReference {
                            template: self.info.template_name.clone(),
                            version: self.info.prompt_template_version_id.clone(),
                            name: slot.placeholder_name.clone(),
                        }
                    })?;
                    blocks.push(block);
                }
            }
        }

        let content = if blocks.iter().any(ContentBlock::is_media) {
            blocks.retain(|block| !matches!(block, ContentBlock::Text { text } if text.is_empty()));
            MessageContent::Blocks(blocks)
        } else {
            MessageContent::Text(
                blocks
                    .into_iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } => Some(text),
                        ContentBlock::Media { .. } => None,
                    })
                    .collect(),
            )
        };
        Ok(RenderedMessage::new(spec.role.clone(), content))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::media::MediaInput;
    use crate::template::{MediaKind, MediaSlot, Role};

    fn template(flavor: &str, messages: Vec<MessageSpec>) -> TemplateDefinition {
        let info = PromptInfo::new("sky", "v7", flavor, "some-model").unwrap();
        TemplateDefinition::new(info, messages).unwrap()
    }

    fn variables(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_bind_renders_text_messages() {
        let template = template(
            "openai_chat",
            vec![
                MessageSpec::text("system", "You answer questions about {{topic}}."),
                MessageSpec::text("user", "{{question}}"),
            ],
        );
        let bound = template
            .bind(BindRequest::new(variables(json!({"topic": "the sky", "question": "What color is the sky?"}))))
            .unwrap();

        assert_eq!(
            bound.messages,
            vec![
                RenderedMessage::system("You answer questions about the sky."),
                RenderedMessage::user("What color is the sky?"),
            ]
        );
        assert!(bound.warnings.is_empty());
        assert_eq!(bound.info.template_name, "sky");
    }

    #[test]
    fn test_missing_variable_names_template() {
        let template = template("openai_chat", vec![MessageSpec::text("user", "{{question}}")]);
        let err = template.bind(BindRequest::default()).unwrap_err();
        assert_eq!(
            err,
            BindError::MissingVariable {
                template: "sky".into(),
                version: "v7".into(),
                name: "question".into()
            }
        );

        let err = template
            .bind(BindRequest::default().with_variable("question", Value::Null))
            .unwrap_err();
        assert!(matches!(err, BindError::MissingVariable { name, .. } if name == "question"));
    }

    #[test]
    fn test_defaults_used_when_variable_absent() {
        let template = template("openai_chat", vec![MessageSpec::text("user", "{{greeting}}, {{name}}")])
            .with_variable_defaults(variables(json!({"greeting": "Hello"})));
        let bound = template.bind(BindRequest::default().with_variable("name", "Ada")).unwrap();
        assert_eq!(bound.messages, vec![RenderedMessage::user("Hello, Ada")]);
    }

    #[test]
    fn test_history_goes_first() {
        let template = template("openai_chat", vec![MessageSpec::text("user", "{{question}}")])
            .with_history_placeholder(true);
        let history = vec![RenderedMessage::user("earlier"), RenderedMessage::assistant("reply")];
        let bound = template
            .bind(BindRequest::default().with_variable("question", "now?").with_history(history.clone()))
            .unwrap();

        assert_eq!(bound.messages.len(), 3);
        assert_eq!(&bound.messages[..2], &history[..]);
        assert_eq!(bound.messages[2], RenderedMessage::user("now?"));
    }

    #[test]
    fn test_media_slots_resolved_in_order() {
        let template = template(
            "anthropic_chat",
            vec![MessageSpec::text("user", "Describe {{what}}").with_media(MediaSlot::new(MediaKind::Image, "photo"))],
        );
        let inputs = MediaInputCollection::new()
            .with("photo", MediaInput::bytes("image/png", vec![7, 7]))
            .with("spare", MediaInput::bytes("image/png", vec![8]));
        let bound = template
            .bind(BindRequest::default().with_variable("what", "this").with_media_inputs(inputs))
            .unwrap();

        assert_eq!(
            bound.messages[0].content,
            MessageContent::Blocks(vec![
                ContentBlock::text("Describe this"),
                ContentBlock::Media {
                    slot_name: "photo".into(),
                    kind: MediaKind::Image,
                    media: MediaInput::bytes("image/png", vec![7, 7]),
                },
            ])
        );
        assert_eq!(bound.warnings, vec![BindWarning::UnusedMediaInput("spare".into())]);
    }

    #[test]
    fn test_missing_media_is_fatal() {
        let template = template(
            "anthropic_chat",
            vec![MessageSpec::text("user", "").with_media(MediaSlot::new(MediaKind::File, "report"))],
        );
        let err = template.bind(BindRequest::default()).unwrap_err();
        assert_eq!(
            err,
            BindError::UnresolvedMediaReference {
                template: "sky".into(),
                version: "v7".into(),
                name: "report".into()
            }
        );
    }

    #[test]
    fn test_media_only_message_drops_empty_text() {
        let template = template(
            "anthropic_chat",
            vec![MessageSpec::text("user", "").with_media(MediaSlot::new(MediaKind::Image, "photo"))],
        );
        let inputs = MediaInputCollection::new().with("photo", MediaInput::bytes("image/jpeg", vec![1]));
        let bound = template.bind(BindRequest::default().with_media_inputs(inputs)).unwrap();
        let MessageContent::Blocks(blocks) = &bound.messages[0].content else {
            panic!("expected blocks");
        };
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_media());
    }

    #[test]
    fn test_empty_message_rejected() {
        let template = template(
            "openai_chat",
            vec![MessageSpec {
                role: Role::User,
                parts: Vec::new(),
            }],
        );
        assert!(matches!(template.bind(BindRequest::default()), Err(BindError::InvalidTemplate { .. })));
    }

    #[test]
    fn test_bind_is_deterministic() {
        let template = template("openai_chat", vec![MessageSpec::text("user", "{{#xs}}{{.}},{{/xs}}")]);
        let request = BindRequest::new(variables(json!({"xs": [1, 2, 3]})));
        let first = template.bind(request.clone()).unwrap();
        let second = template.bind(request).unwrap();
        assert_eq!(first.messages, second.messages);
        assert_eq!(first.messages[0], RenderedMessage::user("1,2,3,"));
    }
}
