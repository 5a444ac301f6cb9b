//! # Fillers
//! Anything that contributes to a [BindRequest]: variables, media inputs or history.
//!
//! A filler implements [FillPlaceholders] plus at least one of [Fill], [FillMut],
//! [FillWith<CTX>] and [FillWithMut<CTX>]. Fillers compose: a request can be filled by many
//! fillers in stages before it is handed to [TemplateDefinition::bind].

use std::collections::BTreeSet;

use anyhow::{anyhow, Result};

use crate::bind::BindRequest;
use crate::history::Conversation;
use crate::media::{MediaInput, MediaInputCollection};
use crate::template::TemplateDefinition;
use crate::utils::JsonMap;

pub trait FillPlaceholders {
    /// Names of the variables or media slots this filler provides.
    fn placeholders_to_fill(&self) -> &[String];
}

pub trait Fill: FillPlaceholders {
    fn fill(&self, request: &mut BindRequest) -> Result<()>;
}

pub trait FillMut: FillPlaceholders {
    fn fill_mut(&mut self, request: &mut BindRequest) -> Result<()>;
}

pub trait FillWith<CTX>: FillPlaceholders {
    fn fill_with(&self, request: &mut BindRequest, context: CTX) -> Result<CTX>;
}

pub trait FillWithMut<CTX>: FillPlaceholders {
    fn fill_with_mut(&mut self, request: &mut BindRequest, context: CTX) -> Result<CTX>;
}

impl<T: FillWith<()>> Fill for T {
    fn fill(&self, request: &mut BindRequest) -> Result<()> {
        self.fill_with(request, ())
    }
}

impl<T: FillWithMut<()>> FillMut for T {
    fn fill_mut(&mut self, request: &mut BindRequest) -> Result<()> {
        self.fill_with_mut(request, ())
    }
}

impl BindRequest {
    /// Applies `filler` and returns the request for chaining.
    pub fn fill_by(&mut self, filler: &impl Fill) -> Result<&mut Self> {
        filler.fill(self)?;
        Ok(self)
    }

    /// Placeholders and media slots of `template` this request does not provide yet, after
    /// taking the template's variable defaults into account.
    pub fn unfilled(&self, template: &TemplateDefinition) -> BTreeSet<String> {
        let variables = template
            .placeholders()
            .into_iter()
            .filter(|name| !self.variables().contains_key(name) && !template.variable_defaults.contains_key(name));
        let media = template
            .media_slots()
            .map(|slot| slot.placeholder_name.clone())
            .filter(|name| self.media_inputs().and_then(|inputs| inputs.get(name)).is_none());
        variables.chain(media).collect()
    }
}

/// Fills variables with fixed values. Existing values of the same names are replaced.
#[derive(Debug, Clone, Default)]
pub struct ConstantFiller {
    names: Vec<String>,
    values: JsonMap,
}

impl ConstantFiller {
    pub fn new(values: JsonMap) -> Self {
        Self {
            names: values.keys().cloned().collect(),
            values,
        }
    }
}

impl FillPlaceholders for ConstantFiller {
    fn placeholders_to_fill(&self) -> &[String] {
        &self.names
    }
}

impl FillWith<()> for ConstantFiller {
    fn fill_with(&self, request: &mut BindRequest, _context: ()) -> Result<()> {
        let variables = request.variables_mut();
        for (name, value) in &self.values {
            variables.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

/// Fills the named media slots from a collection it holds.
#[derive(Debug, Clone)]
pub struct MediaFiller {
    names: Vec<String>,
    inputs: MediaInputCollection,
}

impl MediaFiller {
    /// Fills every input of `inputs`.
    pub fn new(inputs: MediaInputCollection) -> Self {
        Self {
            names: inputs.names().map(String::from).collect(),
            inputs,
        }
    }

    /// Fills only `names`; each must be present in `inputs` when filling.
    pub fn only(inputs: MediaInputCollection, names: Vec<String>) -> Self {
        Self { names, inputs }
    }
}

impl FillPlaceholders for MediaFiller {
    fn placeholders_to_fill(&self) -> &[String] {
        &self.names
    }
}

impl FillWith<()> for MediaFiller {
    fn fill_with(&self, request: &mut BindRequest, _context: ()) -> Result<()> {
        let selected: Vec<(&String, &MediaInput)> = self
            .names
            .iter()
            .map(|name| {
                self.inputs
                    .get(name)
                    .map(|input| (name, input))
                    .ok_or_else(|| anyhow!("media filler has no input named '{}'", name))
            })
            .collect::<Result<_>>()?;
        let media = request.media_inputs_mut();
        for (name, input) in selected {
            media.insert(name.clone(), input.clone());
        }
        Ok(())
    }
}

/// A conversation fills no variables; it supplies the history.
impl FillPlaceholders for Conversation {
    fn placeholders_to_fill(&self) -> &[String] {
        &[]
    }
}

impl FillWith<()> for Conversation {
    fn fill_with(&self, request: &mut BindRequest, _context: ()) -> Result<()> {
        *request.history_mut() = self.messages().to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::message::RenderedMessage;
    use crate::template::{MediaKind, MediaSlot, MessageSpec, PromptInfo};

    /// Counts how many times it filled, through a context.
    struct TurnFiller {
        names: Vec<String>,
    }

    impl FillPlaceholders for TurnFiller {
        fn placeholders_to_fill(&self) -> &[String] {
            &self.names
        }
    }

    impl FillWith<usize> for TurnFiller {
        fn fill_with(&self, request: &mut BindRequest, turn: usize) -> Result<usize> {
            request.variables_mut().insert("turn".into(), json!(turn));
            Ok(turn + 1)
        }
    }

    fn template() -> TemplateDefinition {
        let info = PromptInfo::new("t", "v1", "openai_chat", "gpt").unwrap();
        TemplateDefinition::new(
            info,
            vec![MessageSpec::text("user", "{{greeting}} turn {{turn}}").with_media(MediaSlot::new(MediaKind::Image, "photo"))],
        )
        .unwrap()
    }

    #[test]
    fn test_fillers_compose() {
        let template = template();
        let mut request = BindRequest::default();
        assert_eq!(
            request.unfilled(&template),
            BTreeSet::from(["greeting", "turn", "photo"].map(String::from))
        );

        let greeting = ConstantFiller::new(json!({"greeting": "hi"}).as_object().cloned().unwrap());
        let media = MediaFiller::new(MediaInputCollection::new().with("photo", MediaInput::bytes("image/png", vec![1])));
        request.fill_by(&greeting).unwrap().fill_by(&media).unwrap();

        let turns = TurnFiller {
            names: vec!["turn".into()],
        };
        let next = turns.fill_with(&mut request, 1).unwrap();
        assert_eq!(next, 2);
        assert!(request.unfilled(&template).is_empty());

        let bound = template.bind(request).unwrap();
        assert_eq!(bound.messages[0].text_content(), "hi turn 1");
    }

    #[test]
    fn test_unfilled_skips_section_scoped_names() {
        let info = PromptInfo::new("roster", "v1", "openai_chat", "gpt").unwrap();
        let template = TemplateDefinition::new(
            info,
            vec![MessageSpec::text("user", "{{title}}: {{#people}}{{name}} {{/people}}")],
        )
        .unwrap();
        let request = BindRequest::default().with_variable("people", json!([{"name": "Ada"}]));
        assert_eq!(request.unfilled(&template), BTreeSet::from(["title".to_string()]));
    }

    #[test]
    fn test_media_filler_requires_named_inputs() {
        let filler = MediaFiller::only(MediaInputCollection::new(), vec!["photo".into()]);
        assert!(filler.fill(&mut BindRequest::default()).is_err());
    }

    #[test]
    fn test_conversation_fills_history() {
        let conversation = Conversation::from_messages(vec![RenderedMessage::user("before")]);
        let mut request = BindRequest::default();
        conversation.fill(&mut request).unwrap();
        assert_eq!(request.history(), Some(&[RenderedMessage::user("before")][..]));
        assert!(conversation.placeholders_to_fill().is_empty());
    }
}
