//! # Formatted prompt
//! The final product of a template: the provider payload plus everything needed to record the
//! call later. A [FormattedPrompt] owns all of its data; it stays valid and unchanged no matter
//! what happens to the template or resolver it came from.

use serde_json::Value;

use crate::adapters::{wire, Payload, ProviderAdapter};
use crate::bind::{BindRequest, BindWarning, BoundPrompt};
use crate::error::{Error, FormatError};
use crate::media::MediaInputCollection;
use crate::message::RenderedMessage;
use crate::template::{PromptInfo, TemplateDefinition};
use crate::utils::JsonMap;

#[derive(Debug, Clone)]
#[readonly::make]
pub struct FormattedPrompt {
    /// What to send to the provider, readonly
    #[readonly]
    pub payload: Payload,

    /// System text promoted out of the messages, for dialects that take it separately, readonly
    #[readonly]
    pub system_content: Option<String>,

    /// Snapshot of the template version's metadata, readonly
    #[readonly]
    pub prompt_info: PromptInfo,

    /// History followed by the rendered messages, provider neutral, readonly
    #[readonly]
    pub bound_messages: Vec<RenderedMessage>,

    /// How many of `bound_messages` came from the supplied history, readonly
    #[readonly]
    pub history_len: usize,

    #[readonly]
    pub tool_schema: Option<Value>,

    #[readonly]
    pub output_schema: Option<Value>,

    #[readonly]
    pub warnings: Vec<BindWarning>,

    /// Variables used to bind, kept for recording, readonly
    #[readonly]
    pub inputs: JsonMap,

    #[readonly]
    pub media_inputs: Option<MediaInputCollection>,

    adapter: ProviderAdapter,
}

impl BoundPrompt {
    /// Shapes the bound messages with the template's adapter.
    pub fn format(&self) -> Result<FormattedPrompt, FormatError> {
        let shaped = self.adapter.shape_prompt(self)?;
        Ok(FormattedPrompt {
            payload: shaped.payload,
            system_content: shaped.system_content,
            prompt_info: self.info.clone(),
            bound_messages: self.messages.clone(),
            history_len: self.history_len,
            tool_schema: shaped.tool_schema,
            output_schema: shaped.output_schema,
            warnings: self.warnings.clone(),
            inputs: self.inputs.clone(),
            media_inputs: self.media_inputs.clone(),
            adapter: self.adapter,
        })
    }
}

impl TemplateDefinition {
    /// Binds and formats in one step.
    pub fn format(&self, request: BindRequest) -> Result<FormattedPrompt, Error> {
        Ok(self.bind(request)?.format()?)
    }
}

impl FormattedPrompt {
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[inline]
    pub fn system_content(&self) -> Option<&str> {
        self.system_content.as_deref()
    }

    #[inline]
    pub fn prompt_info(&self) -> &PromptInfo {
        &self.prompt_info
    }

    #[inline]
    pub fn bound_messages(&self) -> &[RenderedMessage] {
        &self.bound_messages
    }

    /// The messages rendered from the template this turn, without the history in front.
    #[inline]
    pub fn rendered_messages(&self) -> &[RenderedMessage] {
        &self.bound_messages[self.history_len..]
    }

    #[inline]
    pub fn tool_schema(&self) -> Option<&Value> {
        self.tool_schema.as_ref()
    }

    #[inline]
    pub fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    #[inline]
    pub fn warnings(&self) -> &[BindWarning] {
        &self.warnings
    }

    #[inline]
    pub fn adapter(&self) -> ProviderAdapter {
        self.adapter
    }

    /// The full transcript for recording: bound messages followed by `completion`.
    /// Returns a new vector every call; nothing shared is touched.
    pub fn all_messages(&self, completion: RenderedMessage) -> Vec<RenderedMessage> {
        let mut messages = Vec::with_capacity(self.bound_messages.len() + 1);
        messages.extend_from_slice(&self.bound_messages);
        messages.push(completion);
        messages
    }

    /// The prompt part of a provider request body.
    pub fn to_wire(&self) -> Value {
        wire::encode(
            self.adapter.dialect(),
            &self.payload,
            self.system_content(),
            self.tool_schema(),
            self.output_schema(),
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::template::{MessageSpec, ToolSchema};

    fn sky_template(flavor: &str) -> TemplateDefinition {
        let info = PromptInfo::new("sky-qa", "v3", flavor, "model-x").unwrap();
        TemplateDefinition::new(
            info,
            vec![
                MessageSpec::text("system", "You are a helpful assistant."),
                MessageSpec::text("user", "{{question}}"),
            ],
        )
        .unwrap()
    }

    fn question() -> BindRequest {
        BindRequest::default().with_variable("question", "What color is the sky?")
    }

    #[test]
    fn test_anthropic_promotes_system() {
        let formatted = sky_template("anthropic_chat").format(question()).unwrap();
        assert_eq!(formatted.system_content(), Some("You are a helpful assistant."));
        let Payload::Blocks(messages) = formatted.payload() else {
            panic!("expected blocks");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(formatted.bound_messages().len(), 2);
        assert_eq!(formatted.prompt_info().provider, "anthropic");
    }

    #[test]
    fn test_all_messages_is_fresh() {
        let formatted = sky_template("openai_chat").format(question()).unwrap();
        let first = formatted.all_messages(RenderedMessage::assistant("Blue."));
        let second = formatted.all_messages(RenderedMessage::assistant("Still blue."));

        assert_eq!(first.len(), 3);
        assert_eq!(first[2], RenderedMessage::assistant("Blue."));
        assert_eq!(second[2], RenderedMessage::assistant("Still blue."));
        assert_eq!(formatted.bound_messages().len(), 2);
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let template = sky_template("gemini_api_chat");
        let first = template.format(question()).unwrap();
        let second = template.format(question()).unwrap();
        assert_eq!(first.payload(), second.payload());
        assert_eq!(first.to_wire(), second.to_wire());
    }

    #[test]
    fn test_output_schema_only_for_openai() {
        let schema = json!({"type": "json_schema"}).as_object().cloned().unwrap();
        let openai = sky_template("openai_chat").with_output_schema(schema.clone());
        let formatted = openai.format(question()).unwrap();
        assert_eq!(formatted.to_wire()["response_format"], json!({"type": "json_schema"}));

        let anthropic = sky_template("anthropic_chat").with_output_schema(schema);
        assert!(matches!(
            anthropic.format(question()),
            Err(Error::Format(FormatError::UnsupportedContentForProvider { .. }))
        ));
    }

    #[test]
    fn test_tools_rejected_for_flat_prompts() {
        let template = sky_template("llama_3_chat").with_tool_schema(vec![ToolSchema {
            name: "lookup".into(),
            description: None,
            parameters: None,
        }]);
        assert!(matches!(template.format(question()), Err(Error::Format(_))));
    }
}
