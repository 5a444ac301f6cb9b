//! Authenticated JSON calls to the API, shared by the write-side resources.

use log::debug;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use url::Url;

use crate::config::ClientConfig;
use crate::error::RecordError;

#[derive(Debug, Clone)]
pub(crate) struct ApiHttp {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiHttp {
    pub(crate) fn new(config: ClientConfig) -> Result<Self, RecordError> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config })
    }

    pub(crate) fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    /// `{base}/v2/projects/{project_id}/{segments...}`
    pub(crate) fn project_url(&self, project_id: &str, segments: &[&str]) -> Result<Url, RecordError> {
        let mut all = vec!["v2", "projects", project_id];
        all.extend_from_slice(segments);
        Ok(self.config.endpoint(&all)?)
    }

    /// Sends `payload` as JSON and returns the body, or fails unless the status is `expected`.
    pub(crate) async fn send_json(
        &self,
        method: Method,
        url: Url,
        payload: &impl Serialize,
        expected: StatusCode,
    ) -> Result<String, RecordError> {
        debug!("{} {}", method, url);
        let request = self.http.request(method, url).json(payload);
        self.finish(request, expected).await
    }

    pub(crate) async fn get(&self, url: Url) -> Result<String, RecordError> {
        debug!("GET {}", url);
        let request = self.http.get(url);
        self.finish(request, StatusCode::OK).await
    }

    async fn finish(&self, request: reqwest::RequestBuilder, expected: StatusCode) -> Result<String, RecordError> {
        let response = request.bearer_auth(self.config.api_key()).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status != expected {
            return Err(RecordError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_url() {
        let config = ClientConfig::new("https://api.example.com/api/", "key").unwrap();
        let api = ApiHttp::new(config).unwrap();
        let url = api.project_url("p-1", &["sessions", "id", "s 1", "metadata"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/api/v2/projects/p-1/sessions/id/s%201/metadata");
    }
}
