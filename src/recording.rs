//! # Recording
//! After the caller has run the provider call, a [RecordInfo] describes it: the full transcript
//! (from [FormattedPrompt::all_messages]), the variables, timing, and session/trace/test-run
//! links. [Recordings] posts it to the recording API.
//!
//! Media bytes are base64 encoded here, while serializing, and nowhere earlier.

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::adapters::wire::encode_base64;
use crate::config::ClientConfig;
use crate::error::RecordError;
use crate::formatted::FormattedPrompt;
use crate::http::ApiHttp;
use crate::media::{MediaInput, MediaInputCollection, MediaPayload};
use crate::message::{ContentBlock, MessageContent, RenderedMessage};
use crate::session::{Session, SessionInfo, SpanKind, TestRunInfo, TraceInfo};
use crate::template::PromptInfo;
use crate::utils::timing::{as_epoch_seconds, CallTime};
use crate::utils::JsonMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageTokens {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStyle {
    Batch,
    Default,
}

/// Provider, model and timing of one call. Times serialize as fractional epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallInfo {
    pub provider: String,
    pub model: String,
    #[serde(serialize_with = "as_epoch_seconds::serialize")]
    pub start_time: CallTime,
    #[serde(serialize_with = "as_epoch_seconds::serialize")]
    pub end_time: CallTime,
    pub model_parameters: JsonMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_info: Option<JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageTokens>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_style: Option<ApiStyle>,
}

impl CallInfo {
    pub fn from_prompt_info(info: &PromptInfo, start_time: CallTime, end_time: CallTime) -> Self {
        Self {
            provider: info.provider.clone(),
            model: info.model.clone(),
            start_time,
            end_time,
            model_parameters: info.model_parameters.clone(),
            provider_info: (!info.provider_info.is_empty()).then(|| info.provider_info.clone()),
            usage: None,
            api_style: None,
        }
    }

    pub fn with_usage(mut self, usage: UsageTokens) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_api_style(mut self, api_style: ApiStyle) -> Self {
        self.api_style = Some(api_style);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseInfo {
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_tokens: Option<u32>,
}

impl ResponseInfo {
    pub fn complete() -> Self {
        Self {
            is_complete: true,
            function_call: None,
            prompt_tokens: None,
            response_tokens: None,
        }
    }
}

/// Everything recorded about one call.
#[derive(Debug, Clone)]
pub struct RecordInfo {
    pub project_id: String,
    pub all_messages: Vec<RenderedMessage>,
    pub inputs: JsonMap,
    pub session_info: SessionInfo,
    pub prompt_version_id: Option<String>,
    pub environment: Option<String>,
    pub call_info: Option<CallInfo>,
    pub response_info: Option<ResponseInfo>,
    pub test_run_info: Option<TestRunInfo>,
    pub eval_results: Option<JsonMap>,
    pub trace_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub tool_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub completion_id: Option<Uuid>,
    pub media_inputs: Option<MediaInputCollection>,
}

impl RecordInfo {
    /// A record of `formatted` answered by `completion`, in a new session.
    pub fn from_formatted(
        project_id: impl Into<String>,
        formatted: &FormattedPrompt,
        completion: RenderedMessage,
        call_info: CallInfo,
    ) -> Self {
        let info = formatted.prompt_info();
        Self {
            project_id: project_id.into(),
            all_messages: formatted.all_messages(completion),
            inputs: formatted.inputs.clone(),
            session_info: Session::new().info(),
            prompt_version_id: Some(info.prompt_template_version_id.clone()),
            environment: info.environment.clone(),
            call_info: Some(call_info),
            response_info: None,
            test_run_info: None,
            eval_results: None,
            trace_id: None,
            parent_id: None,
            tool_schema: formatted.tool_schema().cloned(),
            output_schema: formatted.output_schema().cloned(),
            completion_id: None,
            media_inputs: formatted.media_inputs.clone(),
        }
    }

    pub fn with_session(mut self, session: &Session) -> Self {
        self.session_info = session.info();
        self
    }

    /// Attaches the record to `trace`, and to the trace's session.
    pub fn with_trace(mut self, trace: &TraceInfo) -> Self {
        self.session_info = SessionInfo {
            session_id: trace.session_id,
            custom_metadata: self.session_info.custom_metadata.take(),
        };
        self.trace_id = Some(trace.trace_id);
        self
    }

    pub fn with_response_info(mut self, response_info: ResponseInfo) -> Self {
        self.response_info = Some(response_info);
        self
    }

    pub fn with_test_run_info(mut self, test_run_info: TestRunInfo) -> Self {
        self.test_run_info = Some(test_run_info);
        self
    }

    pub fn with_eval_results(mut self, eval_results: JsonMap) -> Self {
        self.eval_results = Some(eval_results);
        self
    }

    pub fn with_parent_id(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_completion_id(mut self, completion_id: Uuid) -> Self {
        self.completion_id = Some(completion_id);
        self
    }

    /// The request body. Fails on an empty transcript.
    pub fn to_payload(&self) -> Result<RecordPayload<'_>, RecordError> {
        if self.all_messages.is_empty() {
            return Err(RecordError::EmptyTranscript);
        }
        Ok(RecordPayload {
            messages: self.all_messages.iter().map(message_json).collect(),
            inputs: &self.inputs,
            session_info: &self.session_info,
            prompt_info: self.prompt_version_id.as_deref().map(|version_id| PromptVersionPayload {
                prompt_template_version_id: version_id,
                environment: self.environment.as_deref(),
                project_id: &self.project_id,
            }),
            call_info: self.call_info.as_ref(),
            response_info: self.response_info.as_ref(),
            test_run_info: self.test_run_info.as_ref(),
            eval_results: self.eval_results.as_ref(),
            trace_info: self.trace_id.map(|trace_id| json!({ "trace_id": trace_id })),
            parent_id: self.parent_id,
            tool_schema: self.tool_schema.as_ref(),
            output_schema: self.output_schema.as_ref(),
            completion_id: self.completion_id,
            media_inputs: self
                .media_inputs
                .as_ref()
                .map(|inputs| inputs.iter().map(|(name, input)| (name.clone(), media_input_json(input))).collect()),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PromptVersionPayload<'a> {
    prompt_template_version_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<&'a str>,
    project_id: &'a str,
}

/// Serialized body of a completion recording.
#[derive(Debug, Serialize)]
pub struct RecordPayload<'a> {
    messages: Vec<Value>,
    inputs: &'a JsonMap,
    session_info: &'a SessionInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_info: Option<PromptVersionPayload<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_info: Option<&'a CallInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_info: Option<&'a ResponseInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_run_info: Option<&'a TestRunInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eval_results: Option<&'a JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_schema: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_schema: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completion_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_inputs: Option<JsonMap>,
}

fn message_json(message: &RenderedMessage) -> Value {
    match &message.content {
        MessageContent::Text(text) => json!({"role": message.role, "content": text}),
        MessageContent::Blocks(blocks) => {
            let content: Vec<Value> = blocks
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => json!({"type": "text", "text": text}),
                    ContentBlock::Media { slot_name, kind, media } => {
                        let mut part = media_input_json(media);
                        if let Value::Object(fields) = &mut part {
                            fields.insert("slot_name".to_string(), json!(slot_name));
                            fields.insert("media_type".to_string(), json!(kind));
                        }
                        part
                    }
                })
                .collect();
            json!({"role": message.role, "content": content})
        }
    }
}

fn media_input_json(input: &MediaInput) -> Value {
    match &input.payload {
        MediaPayload::Inline(data) => json!({
            "type": "base64",
            "content_type": input.content_type,
            "data": encode_base64(data),
        }),
        MediaPayload::Uri(url) => json!({
            "type": "url",
            "content_type": input.content_type,
            "url": url.as_str(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordResponse {
    #[serde(default)]
    pub completion_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct TracePayload<'a> {
    input: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_metadata: Option<&'a JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eval_results: Option<&'a JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_run_info: Option<&'a TestRunInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<SpanKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    start_time: CallTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<CallTime>,
}

impl<'a> TracePayload<'a> {
    fn new(trace: &'a TraceInfo, test_run_info: Option<&'a TestRunInfo>) -> Result<Self, RecordError> {
        if trace.input.is_null() {
            return Err(RecordError::MissingTraceInput);
        }
        Ok(Self {
            input: &trace.input,
            output: trace.output.as_ref(),
            agent_name: trace.agent_name.as_deref(),
            custom_metadata: trace.custom_metadata.as_ref(),
            eval_results: trace.eval_results.as_ref(),
            test_run_info,
            parent_id: trace.parent_id,
            kind: trace.kind,
            name: trace.name.as_deref(),
            start_time: trace.start_time,
            end_time: trace.end_time,
        })
    }
}

/// Client for the recording API.
#[derive(Debug, Clone)]
pub struct Recordings {
    api: ApiHttp,
}

impl Recordings {
    pub fn new(config: ClientConfig) -> Result<Self, RecordError> {
        Ok(Self {
            api: ApiHttp::new(config)?,
        })
    }

    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self {
            api: ApiHttp::with_http_client(config, http),
        }
    }

    /// Records a completion. The API answers 201 with the id it assigned.
    pub async fn create(&self, record: &RecordInfo) -> Result<RecordResponse, RecordError> {
        let payload = record.to_payload()?;
        let session_id = record.session_info.session_id.to_string();
        let url = self
            .api
            .project_url(&record.project_id, &["sessions", &session_id, "completions"])?;
        let body = self.api.send_json(Method::POST, url, &payload, StatusCode::CREATED).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Records a trace; its input must be set.
    pub async fn record_trace(
        &self,
        project_id: &str,
        trace: &TraceInfo,
        test_run_info: Option<&TestRunInfo>,
    ) -> Result<(), RecordError> {
        let payload = TracePayload::new(trace, test_run_info)?;
        let session_id = trace.session_id.to_string();
        let trace_id = trace.trace_id.to_string();
        let url = self
            .api
            .project_url(project_id, &["sessions", &session_id, "traces", "id", &trace_id])?;
        self.api.send_json(Method::POST, url, &payload, StatusCode::CREATED).await?;
        Ok(())
    }
}
