//! Flat-string prompts for models served without a chat API.

use crate::adapters::{require_text_only, Dialect, Payload};
use crate::error::FormatError;
use crate::message::RenderedMessage;
use crate::template::PromptInfo;

const LLAMA3_BEGIN: &str = "<|begin_of_text|>";
const LLAMA3_END_OF_TURN: &str = "<|eot_id|>";

fn llama3_header(role: &str) -> String {
    format!("<|start_header_id|>{role}<|end_header_id|>")
}

pub(crate) fn format(dialect: Dialect, info: &PromptInfo, messages: &[RenderedMessage]) -> Result<Payload, FormatError> {
    require_text_only(info, messages)?;
    match dialect {
        Dialect::Llama3 => Ok(Payload::Text(llama3_prompt(messages))),
        other => Err(FormatError::unsupported(
            info,
            format!("{} has no flat prompt format", other.provider()),
        )),
    }
}

/// Every message as a header, a newline, its text and an end-of-turn token, then an open
/// assistant header for the model to continue from.
fn llama3_prompt(messages: &[RenderedMessage]) -> String {
    let mut prompt = String::from(LLAMA3_BEGIN);
    for message in messages {
        prompt.push_str(&llama3_header(message.role.as_str()));
        prompt.push('\n');
        prompt.push_str(&message.text_content());
        prompt.push_str(LLAMA3_END_OF_TURN);
    }
    prompt.push_str(&llama3_header("assistant"));
    prompt
}
