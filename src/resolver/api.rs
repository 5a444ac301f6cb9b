use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use url::Url;

use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::resolver::dto::{TemplateDto, TemplatesDto};
use crate::resolver::TemplateResolver;
use crate::template::TemplateDefinition;

/// Fetches templates from the HTTP API with a bearer key.
#[derive(Debug, Clone)]
pub struct ApiTemplateResolver {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiTemplateResolver {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config })
    }

    /// Shares an existing HTTP client, e.g. with [Recordings](crate::recording::Recordings).
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    fn project_url(&self, project_id: &str, segments: &[&str]) -> Result<Url, FetchError> {
        let mut all = vec!["v2", "projects", project_id, "prompt-templates"];
        all.extend_from_slice(segments);
        Ok(self.config.endpoint(&all)?)
    }

    /// GETs `url`. `Ok(None)` means the store answered 404.
    async fn get_body(&self, url: Url) -> Result<Option<String>, FetchError> {
        debug!("Fetching prompt templates from {}", url);
        let response = self.http.get(url).bearer_auth(self.config.api_key()).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(body))
    }
}

#[async_trait]
impl TemplateResolver for ApiTemplateResolver {
    async fn get_prompt(
        &self,
        project_id: &str,
        template_name: &str,
        environment: &str,
    ) -> Result<TemplateDefinition, FetchError> {
        let mut url = self.project_url(project_id, &["name", template_name])?;
        url.query_pairs_mut().append_pair("environment", environment);

        let body = self.get_body(url).await?.ok_or_else(|| FetchError::TemplateNotFound {
            project: project_id.to_string(),
            name: template_name.to_string(),
            environment: environment.to_string(),
        })?;
        let dto: TemplateDto = serde_json::from_str(&body)?;
        dto.into_definition(project_id, Some(environment))
    }

    async fn get_prompt_by_version_id(
        &self,
        project_id: &str,
        template_id: &str,
        version_id: &str,
    ) -> Result<TemplateDefinition, FetchError> {
        let url = self.project_url(project_id, &["id", template_id, "versions", version_id])?;
        let body = self.get_body(url).await?.ok_or_else(|| FetchError::VersionNotFound {
            project: project_id.to_string(),
            template_id: template_id.to_string(),
            version_id: version_id.to_string(),
        })?;
        let dto: TemplateDto = serde_json::from_str(&body)?;
        dto.into_definition(project_id, None)
    }

    async fn get_prompts(&self, project_id: &str, environment: &str) -> Result<Vec<TemplateDefinition>, FetchError> {
        let url = self.project_url(project_id, &["all", environment])?;
        let body = self
            .get_body(url)
            .await?
            .ok_or_else(|| FetchError::TemplateFetch(format!("no templates for project {project_id} in {environment}")))?;
        let templates: TemplatesDto = serde_json::from_str(&body)?;
        templates
            .prompt_templates
            .into_iter()
            .map(|dto| dto.into_definition(project_id, Some(environment)))
            .collect()
    }
}
