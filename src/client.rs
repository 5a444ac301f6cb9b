//! # Client
//! One entry point over a resolver, a snapshot cache and, optionally, the write-side API.
//!
//! ```no_run
//! # async fn run() -> Result<(), promptbind::error::Error> {
//! use promptbind::bind::BindRequest;
//! use promptbind::client::{Client, GetFormattedRequest};
//!
//! let client = Client::filesystem("./bundle")?;
//! let request = GetFormattedRequest::new("my-project", "sky-qa", "prod")
//!     .with_bind_request(BindRequest::default().with_variable("question", "Why is the sky blue?"));
//! let formatted = client.get_formatted(request).await?;
//! println!("{}", formatted.to_wire());
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::bind::BindRequest;
use crate::config::ClientConfig;
use crate::error::{ConfigError, Error, FetchError};
use crate::feedback::{CustomerFeedback, Metadata};
use crate::formatted::FormattedPrompt;
use crate::recording::{RecordInfo, RecordResponse, Recordings};
use crate::resolver::{ApiTemplateResolver, FilesystemTemplateResolver, SnapshotCache, TemplateResolver};
use crate::template::TemplateDefinition;
use crate::testruns::TestRuns;

/// Which template version to fetch and what to bind into it.
#[derive(Debug, Clone)]
pub struct GetFormattedRequest {
    pub project_id: String,
    pub template_name: String,
    pub environment: String,
    pub bind_request: BindRequest,
}

impl GetFormattedRequest {
    pub fn new(project_id: impl Into<String>, template_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            template_name: template_name.into(),
            environment: environment.into(),
            bind_request: BindRequest::default(),
        }
    }

    pub fn with_bind_request(mut self, bind_request: BindRequest) -> Self {
        self.bind_request = bind_request;
        self
    }
}

pub struct Client<R> {
    templates: SnapshotCache<R>,
    recordings: Option<Recordings>,
    customer_feedback: Option<CustomerFeedback>,
    metadata: Option<Metadata>,
    test_runs: Option<TestRuns>,
}

impl Client<FilesystemTemplateResolver> {
    /// Serves templates from a bundle directory, without recording.
    pub fn filesystem(root: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self::new(FilesystemTemplateResolver::new(root)?))
    }
}

impl Client<ApiTemplateResolver> {
    /// Fetches templates from the API and writes back to it, sharing one HTTP client.
    pub fn api(config: ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(FetchError::from)?;
        let resolver = ApiTemplateResolver::with_http_client(config.clone(), http.clone());
        let mut client = Self::new(resolver).with_recordings(Recordings::with_http_client(config.clone(), http.clone()));
        client.customer_feedback = Some(CustomerFeedback::with_http_client(config.clone(), http.clone()));
        client.metadata = Some(Metadata::with_http_client(config.clone(), http.clone()));
        client.test_runs = Some(TestRuns::with_http_client(config, http));
        Ok(client)
    }
}

impl<R: TemplateResolver> Client<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            templates: SnapshotCache::new(resolver),
            recordings: None,
            customer_feedback: None,
            metadata: None,
            test_runs: None,
        }
    }

    pub fn with_recordings(mut self, recordings: Recordings) -> Self {
        self.recordings = Some(recordings);
        self
    }

    #[inline]
    pub fn templates(&self) -> &SnapshotCache<R> {
        &self.templates
    }

    #[inline]
    pub fn recordings(&self) -> Option<&Recordings> {
        self.recordings.as_ref()
    }

    #[inline]
    pub fn customer_feedback(&self) -> Option<&CustomerFeedback> {
        self.customer_feedback.as_ref()
    }

    #[inline]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    #[inline]
    pub fn test_runs(&self) -> Option<&TestRuns> {
        self.test_runs.as_ref()
    }

    pub async fn get(
        &self,
        project_id: &str,
        template_name: &str,
        environment: &str,
    ) -> Result<Arc<TemplateDefinition>, Error> {
        Ok(self.templates.get(project_id, template_name, environment).await?)
    }

    pub async fn get_by_version_id(
        &self,
        project_id: &str,
        template_id: &str,
        version_id: &str,
    ) -> Result<Arc<TemplateDefinition>, Error> {
        Ok(self.templates.get_by_version_id(project_id, template_id, version_id).await?)
    }

    /// Fetches (or reuses) the deployed version, then binds and formats it.
    pub async fn get_formatted(&self, request: GetFormattedRequest) -> Result<FormattedPrompt, Error> {
        let template = self
            .get(&request.project_id, &request.template_name, &request.environment)
            .await?;
        template.format(request.bind_request)
    }

    pub async fn record(&self, record: &RecordInfo) -> Result<RecordResponse, Error> {
        let recordings = self.recordings.as_ref().ok_or(ConfigError::RecordingDisabled)?;
        Ok(recordings.create(record).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;
    use crate::message::RenderedMessage;
    use crate::recording::CallInfo;

    fn bundle() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("prompts").join("proj").join("prod");
        fs::create_dir_all(&dir).unwrap();
        let body = json!({
            "format_version": 3,
            "prompt_template_id": "qa-id",
            "prompt_template_version_id": "qa-v1",
            "prompt_template_name": "qa",
            "content": [{"role": "user", "content": "{{question}}"}],
            "metadata": {"provider": "openai", "flavor": "openai_chat", "model": "gpt-4o-mini", "params": {}}
        });
        fs::write(dir.join("qa.json"), body.to_string()).unwrap();
        root
    }

    #[tokio::test]
    async fn test_get_formatted_reuses_snapshot() {
        let root = bundle();
        let client = Client::filesystem(root.path()).unwrap();

        let request = GetFormattedRequest::new("proj", "qa", "prod")
            .with_bind_request(BindRequest::default().with_variable("question", "2+2?"));
        let formatted = client.get_formatted(request.clone()).await.unwrap();
        assert_eq!(formatted.bound_messages()[0].text_content(), "2+2?");

        let first = client.get("proj", "qa", "prod").await.unwrap();
        let second = client.get("proj", "qa", "prod").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(client.templates().len(), 1);

        assert!(matches!(
            client.get("proj", "other", "prod").await,
            Err(Error::Fetch(FetchError::TemplateNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_record_without_recordings() {
        let root = bundle();
        let client = Client::filesystem(root.path()).unwrap();
        let formatted = client
            .get_formatted(
                GetFormattedRequest::new("proj", "qa", "prod")
                    .with_bind_request(BindRequest::default().with_variable("question", "hi")),
            )
            .await
            .unwrap();
        let now = chrono::Utc::now();
        let record = RecordInfo::from_formatted(
            "proj",
            &formatted,
            RenderedMessage::assistant("hello"),
            CallInfo::from_prompt_info(formatted.prompt_info(), now, now),
        );
        assert!(client.recordings().is_none());
        assert!(client.test_runs().is_none());
        assert!(matches!(
            client.record(&record).await,
            Err(Error::Config(ConfigError::RecordingDisabled))
        ));
    }

    #[test]
    fn test_api_client_writes_back() {
        let config = ClientConfig::new("https://api.example.com/api", "key").unwrap();
        let client = Client::api(config).unwrap();
        assert!(client.recordings().is_some());
        assert!(client.customer_feedback().is_some());
        assert!(client.metadata().is_some());
        assert!(client.test_runs().is_some());
    }
}
