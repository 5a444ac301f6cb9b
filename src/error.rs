//! Error types.
//!
//! Every fatal condition names the template and version it came from, plus the offending
//! variable, attachment or capability, so the caller can fix its input.

use std::path::PathBuf;

use crate::template::PromptInfo;

/// Errors from the mustache renderer. These carry no template context; [BindError] adds it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionError {
    #[error("variable '{0}' is referenced but has no value")]
    MissingVariable(String),

    #[error("{0}")]
    Syntax(String),

    #[error("unsupported template directive '{0}'")]
    UnsupportedDirective(String),
}

impl SubstitutionError {
    pub(crate) fn in_template(self, info: &PromptInfo) -> BindError {
        let template = info.template_name.clone();
        let version = info.prompt_template_version_id.clone();
        match self {
            SubstitutionError::MissingVariable(name) => BindError::MissingVariable { template, version, name },
            SubstitutionError::Syntax(detail) => BindError::TemplateSyntax { template, version, detail },
            SubstitutionError::UnsupportedDirective(directive) => {
                BindError::UnsupportedDirective { template, version, directive }
            }
        }
    }
}

/// Errors that abort a bind. A failed bind never yields a partially substituted prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("template '{template}' (version {version}) references variable '{name}' but it was not supplied")]
    MissingVariable { template: String, version: String, name: String },

    #[error("template '{template}' (version {version}) references media input '{name}' but it was not supplied")]
    UnresolvedMediaReference { template: String, version: String, name: String },

    #[error("template '{template}' (version {version}) is malformed: {detail}")]
    TemplateSyntax { template: String, version: String, detail: String },

    #[error("template '{template}' (version {version}) uses unsupported directive '{directive}'")]
    UnsupportedDirective { template: String, version: String, directive: String },

    #[error("template '{template}' (version {version}) cannot be bound: {detail}")]
    InvalidTemplate { template: String, version: String, detail: String },
}

/// Errors raised while shaping a bound prompt for a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("template '{template}' (version {version}) cannot be formatted for '{flavor}': {detail}")]
    UnsupportedContentForProvider {
        template: String,
        version: String,
        flavor: String,
        detail: String,
    },

    #[error("no provider adapter exists for flavor '{0}'")]
    UnknownFlavor(String),
}

impl FormatError {
    pub(crate) fn unsupported(info: &PromptInfo, detail: impl Into<String>) -> Self {
        FormatError::UnsupportedContentForProvider {
            template: info.template_name.clone(),
            version: info.prompt_template_version_id.clone(),
            flavor: info.flavor.clone(),
            detail: detail.into(),
        }
    }
}

/// Errors from a template store. Propagated to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("template '{name}' not found for project {project} and environment {environment}")]
    TemplateNotFound {
        project: String,
        name: String,
        environment: String,
    },

    #[error("template version {version_id} of template {template_id} not found for project {project}")]
    VersionNotFound {
        project: String,
        template_id: String,
        version_id: String,
    },

    #[error("templates directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("invalid template '{name}': {detail}")]
    InvalidTemplate { name: String, detail: String },

    #[error("template store returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("template fetch failed: {0}")]
    TemplateFetch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors from the write-side API resources: recordings, feedback, metadata and test runs.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("a recording needs at least one message; the last one should be the completion")]
    EmptyTranscript,

    #[error("a trace recording needs an input")]
    MissingTraceInput,

    #[error("custom metadata value for '{0}' must be a string, number or boolean")]
    InvalidMetadata(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("test run {0} returned both completion and trace test cases")]
    MixedTestCases(String),

    #[error("API returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors from loading client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("invalid API base URL '{value}': {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("API base URL '{0}' cannot carry path segments")]
    CannotBeABase(String),

    #[error("invalid timeout '{0}', expected whole seconds")]
    InvalidTimeout(String),

    #[error("this client has no API access configured; recording, feedback and test runs need one")]
    RecordingDisabled,
}

/// Umbrella error for the [Client](crate::client::Client) facade.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
