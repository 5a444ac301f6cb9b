//! Sessions, traces and test runs: the tags that group recorded calls.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::RecordError;
use crate::utils::timing::CallTime;
use crate::utils::JsonMap;

/// Custom metadata is flat: every value a string, number or boolean.
pub(crate) fn validate_metadata(metadata: &JsonMap) -> Result<(), RecordError> {
    match metadata
        .iter()
        .find(|(_, value)| !matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)))
    {
        Some((key, _)) => Err(RecordError::InvalidMetadata(key.clone())),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Tool,
    Agent,
}

/// What a recording carries about its session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<JsonMap>,
}

/// A group of related calls, identified by a random UUID.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    session_id: Uuid,
    custom_metadata: Option<JsonMap>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// Continues an existing session.
    pub fn with_id(session_id: Uuid) -> Self {
        Self {
            session_id,
            custom_metadata: None,
        }
    }

    pub fn with_custom_metadata(mut self, metadata: JsonMap) -> Result<Self, RecordError> {
        validate_metadata(&metadata)?;
        self.custom_metadata = Some(metadata);
        Ok(self)
    }

    #[inline]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn custom_metadata(&self) -> Option<&JsonMap> {
        self.custom_metadata.as_ref()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id,
            custom_metadata: self.custom_metadata.clone(),
        }
    }

    /// Starts a trace in this session now.
    pub fn trace(&self, input: impl Into<Value>) -> TraceInfo {
        TraceInfo {
            session_id: self.session_id,
            trace_id: Uuid::new_v4(),
            input: input.into(),
            output: None,
            agent_name: None,
            parent_id: None,
            kind: None,
            name: None,
            custom_metadata: None,
            eval_results: None,
            start_time: Utc::now(),
            end_time: None,
        }
    }
}

/// One traced unit of work inside a session, such as an agent step or a tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceInfo {
    pub session_id: Uuid,
    pub trace_id: Uuid,
    pub input: Value,
    pub output: Option<Value>,
    pub agent_name: Option<String>,
    pub parent_id: Option<Uuid>,
    pub kind: Option<SpanKind>,
    pub name: Option<String>,
    pub custom_metadata: Option<JsonMap>,
    pub eval_results: Option<JsonMap>,
    pub start_time: CallTime,
    pub end_time: Option<CallTime>,
}

impl TraceInfo {
    pub fn with_agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    pub fn with_parent_id(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_custom_metadata(mut self, metadata: JsonMap) -> Result<Self, RecordError> {
        validate_metadata(&metadata)?;
        self.custom_metadata = Some(metadata);
        Ok(self)
    }

    pub fn with_eval_results(mut self, eval_results: JsonMap) -> Self {
        self.eval_results = Some(eval_results);
        self
    }

    /// Sets the output and stamps the end time.
    pub fn finish(&mut self, output: impl Into<Value>) {
        self.output = Some(output.into());
        self.end_time = Some(Utc::now());
    }

    /// A child trace in the same session, started now.
    pub fn child(&self, input: impl Into<Value>) -> TraceInfo {
        Session::with_id(self.session_id).trace(input).with_parent_id(self.trace_id)
    }
}

/// Links a recording to a test run and, optionally, one of its test cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRunInfo {
    pub test_run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<String>,
}

impl TestRunInfo {
    pub fn new(test_run_id: impl Into<String>) -> Self {
        Self {
            test_run_id: test_run_id.into(),
            test_case_id: None,
        }
    }

    pub fn with_test_case(mut self, test_case_id: impl Into<String>) -> Self {
        self.test_case_id = Some(test_case_id.into());
        self
    }
}
