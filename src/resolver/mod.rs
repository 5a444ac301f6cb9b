//! # Resolvers
//! A [TemplateResolver] fetches template versions from a store. Two stores are provided:
//! - [FilesystemTemplateResolver] reads a bundle of JSON files laid out as
//!   `<root>/prompts/<project>/<environment>/<template name>.json`,
//! - [ApiTemplateResolver] asks the HTTP API.
//!
//! [SnapshotCache] sits in front of either and hands out shared, immutable snapshots.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::template::TemplateDefinition;

pub mod api;
pub mod cache;
pub(crate) mod dto;
pub mod filesystem;

pub use api::ApiTemplateResolver;
pub use cache::SnapshotCache;
pub use filesystem::FilesystemTemplateResolver;

#[async_trait]
pub trait TemplateResolver: Send + Sync {
    /// The version of `template_name` currently deployed to `environment`.
    async fn get_prompt(
        &self,
        project_id: &str,
        template_name: &str,
        environment: &str,
    ) -> Result<TemplateDefinition, FetchError>;

    /// One exact version, independent of environments.
    async fn get_prompt_by_version_id(
        &self,
        project_id: &str,
        template_id: &str,
        version_id: &str,
    ) -> Result<TemplateDefinition, FetchError>;

    /// Every template deployed to `environment`.
    async fn get_prompts(&self, project_id: &str, environment: &str) -> Result<Vec<TemplateDefinition>, FetchError>;
}
