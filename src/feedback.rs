//! Annotations attached after a call has been recorded: customer feedback on completions and
//! traces, and metadata updates on sessions and traces.
//!
//! Every map sent here must be flat, the same rule as session metadata. Metadata updates merge:
//! keys sent overwrite stored keys, other stored keys are kept.

use reqwest::{Method, StatusCode};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::RecordError;
use crate::http::ApiHttp;
use crate::session::validate_metadata;
use crate::utils::JsonMap;

#[derive(Debug, Clone)]
pub struct CustomerFeedback {
    api: ApiHttp,
}

impl CustomerFeedback {
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

    /// Feedback on one recorded completion, by the id the recording API returned.
    pub async fn update(&self, project_id: &str, completion_id: &str, feedback: &JsonMap) -> Result<(), RecordError> {
        validate_metadata(feedback)?;
        let url = self.api.project_url(project_id, &["completion-feedback", "id", completion_id])?;
        self.api.send_json(Method::POST, url, feedback, StatusCode::CREATED).await?;
        Ok(())
    }

    pub async fn update_trace(&self, project_id: &str, trace_id: Uuid, feedback: &JsonMap) -> Result<(), RecordError> {
        validate_metadata(feedback)?;
        let trace_id = trace_id.to_string();
        let url = self.api.project_url(project_id, &["trace-feedback", "id", &trace_id])?;
        self.api.send_json(Method::POST, url, feedback, StatusCode::CREATED).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Metadata {
    api: ApiHttp,
}

impl Metadata {
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

    pub async fn update_session(&self, project_id: &str, session_id: Uuid, metadata: &JsonMap) -> Result<(), RecordError> {
        let url = self.session_url(project_id, session_id)?;
        validate_metadata(metadata)?;
        self.api.send_json(Method::PATCH, url, metadata, StatusCode::OK).await?;
        Ok(())
    }

    pub async fn update_trace(
        &self,
        project_id: &str,
        session_id: Uuid,
        trace_id: Uuid,
        metadata: &JsonMap,
    ) -> Result<(), RecordError> {
        let url = self.trace_url(project_id, session_id, trace_id)?;
        validate_metadata(metadata)?;
        self.api.send_json(Method::PATCH, url, metadata, StatusCode::OK).await?;
        Ok(())
    }

    fn session_url(&self, project_id: &str, session_id: Uuid) -> Result<url::Url, RecordError> {
        let session_id = session_id.to_string();
        self.api.project_url(project_id, &["sessions", "id", &session_id, "metadata"])
    }

    fn trace_url(&self, project_id: &str, session_id: Uuid, trace_id: Uuid) -> Result<url::Url, RecordError> {
        let session_id = session_id.to_string();
        let trace_id = trace_id.to_string();
        self.api
            .project_url(project_id, &["sessions", &session_id, "traces", "id", &trace_id, "metadata"])
    }
}
