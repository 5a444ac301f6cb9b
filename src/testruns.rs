//! # Test runs
//! Start an evaluation run over a stored dataset, then replay each test case through your own
//! pipeline and record the result against it.
//!
//! A run holds either completion test cases (variables plus history, bound into a template) or
//! trace test cases (a free-form input for agent code), never both.
//!
//! ```no_run
//! # async fn run(client: &promptbind::client::Client<promptbind::resolver::ApiTemplateResolver>) -> Result<(), promptbind::error::Error> {
//! use promptbind::testruns::{TestCases, TestRunRequest};
//!
//! let test_runs = client.test_runs().expect("api client");
//! let run = test_runs.create(&TestRunRequest::new("my-project", "golden-set")).await?;
//! if let TestCases::Completion(cases) = &run.cases {
//!     for case in cases {
//!         let template = client.get("my-project", "sky-qa", "prod").await?;
//!         let formatted = template.format(case.bind_request())?;
//!         // call the provider, then record with run.test_run_info(&case.test_case_id)
//! #       let _ = formatted;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;

use log::debug;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bind::BindRequest;
use crate::config::ClientConfig;
use crate::error::RecordError;
use crate::http::ApiHttp;
use crate::message::{ChatMessage, RenderedMessage};
use crate::session::TestRunInfo;
use crate::utils::JsonMap;

/// What to run: a dataset, plus optional naming and evaluation targeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunRequest {
    pub project_id: String,
    pub dataset_name: String,
    pub include_outputs: bool,
    pub name: Option<String>,
    pub description: Option<String>,
    pub flavor_name: Option<String>,
    pub target_evaluation_ids: Option<Vec<String>>,
}

impl TestRunRequest {
    pub fn new(project_id: impl Into<String>, dataset_name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_name: dataset_name.into(),
            include_outputs: false,
            name: None,
            description: None,
            flavor_name: None,
            target_evaluation_ids: None,
        }
    }

    /// Also return the dataset's reference outputs with each test case.
    pub fn with_outputs(mut self) -> Self {
        self.include_outputs = true;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Formats the dataset's history for this flavor on the server side.
    pub fn with_flavor_name(mut self, flavor_name: impl Into<String>) -> Self {
        self.flavor_name = Some(flavor_name.into());
        self
    }

    pub fn with_target_evaluation_ids(mut self, ids: Vec<String>) -> Self {
        self.target_evaluation_ids = Some(ids);
        self
    }

    fn body(&self) -> TestRunBody<'_> {
        TestRunBody {
            dataset_name: &self.dataset_name,
            include_outputs: self.include_outputs,
            test_run_name: self.name.as_deref(),
            test_run_description: self.description.as_deref(),
            flavor_name: self.flavor_name.as_deref(),
            target_evaluation_ids: self.target_evaluation_ids.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TestRunBody<'a> {
    dataset_name: &'a str,
    include_outputs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_run_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_run_description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flavor_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_evaluation_ids: Option<&'a [String]>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionTestCase {
    pub test_case_id: String,
    #[serde(default)]
    pub variables: JsonMap,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub custom_metadata: Option<BTreeMap<String, String>>,
}

impl CompletionTestCase {
    /// The variables and history of this case, ready to bind into a template.
    pub fn bind_request(&self) -> BindRequest {
        let request = BindRequest::new(self.variables.clone());
        if self.history.is_empty() {
            return request;
        }
        request.with_history(self.history.iter().cloned().map(RenderedMessage::from).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceTestCase {
    pub test_case_id: String,
    pub input: Value,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub custom_metadata: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestCases {
    Completion(Vec<CompletionTestCase>),
    Trace(Vec<TraceTestCase>),
}

impl TestCases {
    pub fn len(&self) -> usize {
        match self {
            TestCases::Completion(cases) => cases.len(),
            TestCases::Trace(cases) => cases.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestRun {
    pub test_run_id: String,
    pub cases: TestCases,
}

impl TestRun {
    /// Attach to the recording of one test case's answer.
    pub fn test_run_info(&self, test_case_id: impl Into<String>) -> TestRunInfo {
        TestRunInfo::new(self.test_run_id.clone()).with_test_case(test_case_id)
    }
}

#[derive(Debug, Deserialize)]
struct TestRunDto {
    test_run_id: String,
    #[serde(default)]
    test_cases: Vec<CompletionTestCase>,
    #[serde(default)]
    trace_test_cases: Vec<TraceTestCase>,
}

impl TestRunDto {
    fn into_test_run(self) -> Result<TestRun, RecordError> {
        let cases = match (self.test_cases.is_empty(), self.trace_test_cases.is_empty()) {
            (false, false) => return Err(RecordError::MixedTestCases(self.test_run_id)),
            (true, false) => TestCases::Trace(self.trace_test_cases),
            _ => TestCases::Completion(self.test_cases),
        };
        Ok(TestRun {
            test_run_id: self.test_run_id,
            cases,
        })
    }
}

/// Summary of a finished (or running) test run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestRunResults {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub summary_statistics: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct TestRuns {
    api: ApiHttp,
}

impl TestRuns {
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

    pub async fn create(&self, request: &TestRunRequest) -> Result<TestRun, RecordError> {
        let url = self.api.project_url(&request.project_id, &["test-runs"])?;
        let body = self
            .api
            .send_json(Method::POST, url, &request.body(), StatusCode::CREATED)
            .await?;
        let run = serde_json::from_str::<TestRunDto>(&body)?.into_test_run()?;
        debug!("test run {} started with {} cases", run.test_run_id, run.cases.len());
        Ok(run)
    }

    pub async fn get(&self, project_id: &str, test_run_id: &str) -> Result<TestRunResults, RecordError> {
        let url = self.api.project_url(project_id, &["test-runs", "id", test_run_id])?;
        let body = self.api.get(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
