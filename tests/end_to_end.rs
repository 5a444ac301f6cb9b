use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use promptbind::adapters::{Payload, PayloadBlock};
use promptbind::bind::BindRequest;
use promptbind::client::{Client, GetFormattedRequest};
use promptbind::error::{BindError, Error};
use promptbind::history::Conversation;
use promptbind::media::{MediaInput, MediaInputCollection};
use promptbind::message::{ChatMessage, RenderedMessage};
use promptbind::recording::{CallInfo, RecordInfo, ResponseInfo};
use promptbind::session::Session;
use promptbind::template::Role;
use promptbind::utils::timing::from_epoch_millis;

fn write_template(root: &Path, name: &str, body: Value) {
    let dir = root.join("prompts").join("proj").join("prod");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{name}.json")), body.to_string()).unwrap();
}

fn bundle() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    write_template(
        root.path(),
        "sky",
        json!({
            "format_version": 3,
            "prompt_template_id": "sky-id",
            "prompt_template_version_id": "sky-v1",
            "prompt_template_name": "sky",
            "content": [{"role": "user", "content": "Q: {{question}}"}],
            "metadata": {"provider": "baseten", "flavor": "baseten_mistral_chat", "model": "mistral-7b", "params": {}}
        }),
    );
    write_template(
        root.path(),
        "assistant",
        json!({
            "format_version": 3,
            "prompt_template_id": "assistant-id",
            "prompt_template_version_id": "assistant-v4",
            "prompt_template_name": "assistant",
            "content": [
                {"role": "system", "content": "You answer questions about {{topic}}."},
                {"kind": "history"},
                {"role": "user", "content": "{{question}}"}
            ],
            "metadata": {"provider": "anthropic", "flavor": "anthropic_chat", "model": "claude-3-5-sonnet", "params": {"max_tokens": 512}}
        }),
    );
    write_template(
        root.path(),
        "vision",
        json!({
            "format_version": 3,
            "prompt_template_id": "vision-id",
            "prompt_template_version_id": "vision-v2",
            "prompt_template_name": "vision",
            "content": [{
                "role": "user",
                "content": "What is in {{subject}}?",
                "media_slots": [{"type": "image", "placeholder_name": "img1"}]
            }],
            "metadata": {"provider": "openai", "flavor": "openai_chat", "model": "gpt-4o", "params": {}}
        }),
    );
    root
}

fn sky_request() -> GetFormattedRequest {
    GetFormattedRequest::new("proj", "sky", "prod")
        .with_bind_request(BindRequest::default().with_variable("question", "sky color?"))
}

#[tokio::test]
async fn sky_color_question_round_trip() {
    let root = bundle();
    let client = Client::filesystem(root.path()).unwrap();

    let formatted = client.get_formatted(sky_request()).await.unwrap();
    assert_eq!(
        formatted.payload(),
        &Payload::Chat(vec![ChatMessage {
            role: Role::User,
            content: "Q: sky color?".to_string()
        }])
    );

    let all = formatted.all_messages(RenderedMessage::assistant("blue"));
    assert_eq!(
        all,
        vec![RenderedMessage::user("Q: sky color?"), RenderedMessage::assistant("blue")]
    );
    assert_eq!(formatted.bound_messages().len(), 1);
}

#[tokio::test]
async fn formatting_is_idempotent() {
    let root = bundle();
    let client = Client::filesystem(root.path()).unwrap();

    let first = client.get_formatted(sky_request()).await.unwrap();
    let second = client.get_formatted(sky_request()).await.unwrap();
    assert_eq!(first.payload(), second.payload());
    assert_eq!(first.to_wire().to_string(), second.to_wire().to_string());
}

#[tokio::test]
async fn missing_variable_fails_the_whole_format() {
    let root = bundle();
    let client = Client::filesystem(root.path()).unwrap();

    let result = client.get_formatted(GetFormattedRequest::new("proj", "sky", "prod")).await;
    assert!(matches!(
        result,
        Err(Error::Bind(BindError::MissingVariable { ref name, ref version, .. })) if name == "question" && version == "sky-v1"
    ));
}

#[tokio::test]
async fn history_goes_in_front_of_rendered_messages() {
    let root = bundle();
    let client = Client::filesystem(root.path()).unwrap();
    let template = client.get("proj", "assistant", "prod").await.unwrap();

    let mut conversation = Conversation::new();
    conversation.push(RenderedMessage::user("What is Rust?"));
    conversation.push(RenderedMessage::assistant("A systems language."));

    let mut variables = serde_json::Map::new();
    variables.insert("topic".to_string(), json!("programming"));
    variables.insert("question".to_string(), json!("Who maintains it?"));
    let formatted = template.format(conversation.request(variables)).unwrap();

    let bound = formatted.bound_messages();
    assert_eq!(bound.len(), 2 + 2);
    assert_eq!(&bound[..2], conversation.messages());
    assert_eq!(bound[2].role, Role::System);
    assert_eq!(bound[3].text_content(), "Who maintains it?");

    assert_eq!(formatted.system_content(), Some("You answer questions about programming."));
    let wire = formatted.to_wire();
    assert_eq!(wire["system"], "You answer questions about programming.");
    assert_eq!(wire["messages"].as_array().unwrap().len(), 3);

    conversation.advance(&formatted, RenderedMessage::assistant("The Rust project."));
    assert_eq!(conversation.len(), 4);
    assert!(conversation.messages().iter().all(|message| message.role != Role::System));
}

#[tokio::test]
async fn media_round_trip_and_recording() {
    let root = bundle();
    let client = Client::filesystem(root.path()).unwrap();
    let template = client.get("proj", "vision", "prod").await.unwrap();

    let photo = MediaInput::bytes("image/png", vec![0x89, 0x50, 0x4e, 0x47]);
    let request = BindRequest::default()
        .with_variable("subject", "this photo")
        .with_media_inputs(MediaInputCollection::new().with("img1", photo.clone()));
    let formatted = template.format(request.clone()).unwrap();

    let Payload::Blocks(messages) = formatted.payload() else {
        panic!("expected structured blocks, got {:?}", formatted.payload());
    };
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].content[0],
        PayloadBlock::Text {
            value: "What is in this photo?".to_string()
        }
    );
    match &messages[0].content[1] {
        PayloadBlock::Media { slot_name, media, .. } => {
            assert_eq!(slot_name, "img1");
            assert_eq!(media, &photo);
        }
        other => panic!("expected a media block, got {other:?}"),
    }
    assert_eq!(
        formatted.to_wire()["messages"][0]["content"][1]["image_url"]["url"],
        "data:image/png;base64,iVBORw=="
    );

    let without_media = BindRequest::default().with_variable("subject", "this photo");
    assert!(matches!(
        template.format(without_media),
        Err(Error::Bind(BindError::UnresolvedMediaReference { ref name, .. })) if name == "img1"
    ));

    let session = Session::new();
    let start = from_epoch_millis(1_700_000_000_000).unwrap();
    let end = from_epoch_millis(1_700_000_002_000).unwrap();
    let record = RecordInfo::from_formatted(
        "proj",
        &formatted,
        RenderedMessage::assistant("A PNG header."),
        CallInfo::from_prompt_info(formatted.prompt_info(), start, end),
    )
    .with_session(&session)
    .with_response_info(ResponseInfo::complete());

    let payload = serde_json::to_value(record.to_payload().unwrap()).unwrap();
    assert_eq!(payload["messages"].as_array().unwrap().len(), 2);
    assert_eq!(payload["messages"][1]["content"], "A PNG header.");
    assert_eq!(payload["inputs"]["subject"], "this photo");
    assert_eq!(payload["prompt_info"]["prompt_template_version_id"], "vision-v2");
    assert_eq!(payload["call_info"]["model"], "gpt-4o");
    assert_eq!(payload["call_info"]["end_time"], json!(1_700_000_002.0));
    assert_eq!(payload["media_inputs"]["img1"]["data"], "iVBORw==");
    assert_eq!(payload["response_info"]["is_complete"], true);
}
