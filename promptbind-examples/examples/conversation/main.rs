//! A three-turn conversation against an in-memory template. Each turn binds the running
//! transcript as history, prints the wire payload for two providers, then appends a canned
//! reply in place of a real model call.

use anyhow::Result;
use chrono::Utc;
use serde_json::json;

use promptbind::bind::BindRequest;
use promptbind::history::Conversation;
use promptbind::message::RenderedMessage;
use promptbind::recording::{CallInfo, RecordInfo, ResponseInfo};
use promptbind::session::Session;
use promptbind::template::{MessageSpec, PromptInfo, TemplateDefinition};

fn tutor(flavor: &str, model: &str) -> Result<TemplateDefinition> {
    let info = PromptInfo::new("tutor", "tutor-v3", flavor, model)?.with_environment("latest");
    let messages = vec![
        MessageSpec::text("system", "You are a patient {{subject}} tutor."),
        MessageSpec::text("user", "{{question}}"),
    ];
    let defaults = json!({"subject": "physics"}).as_object().cloned().unwrap_or_default();
    Ok(TemplateDefinition::new(info, messages)?
        .with_history_placeholder(true)
        .with_variable_defaults(defaults))
}

fn main() -> Result<()> {
    let openai = tutor("openai_chat", "gpt-4o-mini")?;
    let anthropic = tutor("anthropic_chat", "claude-3-5-haiku")?;
    let session = Session::new();
    let mut conversation = Conversation::new();

    let turns = [
        ("Why is the sky blue?", "Rayleigh scattering favours short wavelengths."),
        ("And sunsets?", "Light crosses more air, so the blue is scattered away."),
        ("What about Mars?", "Dust scatters red light, so its sky is butterscotch."),
    ];

    for (question, reply) in turns {
        let request = BindRequest::default()
            .with_variable("question", question)
            .with_history(conversation.messages().to_vec());
        let started = Utc::now();
        let formatted = openai.format(request.clone())?;
        println!("openai    => {}", formatted.to_wire());
        println!("anthropic => {}", anthropic.format(request)?.to_wire());

        let completion = RenderedMessage::assistant(reply);
        let record = RecordInfo::from_formatted(
            "demo-project",
            &formatted,
            completion.clone(),
            CallInfo::from_prompt_info(formatted.prompt_info(), started, Utc::now()),
        )
        .with_session(&session)
        .with_response_info(ResponseInfo::complete());
        println!("record    => {}", serde_json::to_string(&record.to_payload()?)?);

        conversation.advance(&formatted, completion);
    }

    println!("{} messages in the final transcript", conversation.len());
    Ok(())
}
