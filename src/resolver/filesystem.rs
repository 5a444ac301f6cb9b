use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use tokio::fs;

use crate::error::FetchError;
use crate::resolver::dto::TemplateDto;
use crate::resolver::TemplateResolver;
use crate::template::TemplateDefinition;

const PROMPTS_DIR: &str = "prompts";

/// Reads templates from a bundle directory. Files are read on every call; put a
/// [SnapshotCache](crate::resolver::SnapshotCache) in front to share snapshots.
#[derive(Debug, Clone)]
pub struct FilesystemTemplateResolver {
    prompts_dir: PathBuf,
}

impl FilesystemTemplateResolver {
    /// Fails if `root` or `root/prompts` is not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FetchError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(FetchError::MissingDirectory(root.to_path_buf()));
        }
        let prompts_dir = root.join(PROMPTS_DIR);
        if !prompts_dir.is_dir() {
            return Err(FetchError::MissingDirectory(prompts_dir));
        }
        Ok(Self { prompts_dir })
    }

    async fn environment_dir(&self, project_id: &str, environment: &str) -> Result<PathBuf, FetchError> {
        let dir = self.prompts_dir.join(project_id).join(environment);
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(FetchError::MissingDirectory(dir)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::MissingDirectory(dir)),
            Err(e) => Err(e.into()),
        }
    }

    /// Template files of one directory, sorted by file name.
    async fn template_files(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
        let mut entries = fs::read_dir(dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_template(path: &Path, project_id: &str, environment: &str) -> Result<TemplateDefinition, FetchError> {
        debug!("Reading prompt template from {}", path.display());
        let raw = fs::read_to_string(path).await?;
        let dto: TemplateDto = serde_json::from_str(&raw)?;
        dto.into_definition(project_id, Some(environment))
    }
}

#[async_trait]
impl TemplateResolver for FilesystemTemplateResolver {
    async fn get_prompt(
        &self,
        project_id: &str,
        template_name: &str,
        environment: &str,
    ) -> Result<TemplateDefinition, FetchError> {
        let dir = self.environment_dir(project_id, environment).await?;
        let path = dir.join(format!("{template_name}.json"));
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Self::read_template(&path, project_id, environment).await,
            Ok(_) => Err(FetchError::TemplateNotFound {
                project: project_id.to_string(),
                name: template_name.to_string(),
                environment: environment.to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::TemplateNotFound {
                project: project_id.to_string(),
                name: template_name.to_string(),
                environment: environment.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_prompt_by_version_id(
        &self,
        project_id: &str,
        template_id: &str,
        version_id: &str,
    ) -> Result<TemplateDefinition, FetchError> {
        let project_dir = self.prompts_dir.join(project_id);
        if !fs::metadata(&project_dir).await.is_ok_and(|meta| meta.is_dir()) {
            return Err(FetchError::MissingDirectory(project_dir));
        }

        let mut environments = fs::read_dir(&project_dir).await?;
        let mut environment_dirs = Vec::new();
        while let Some(entry) = environments.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                environment_dirs.push(entry.path());
            }
        }
        environment_dirs.sort();

        for dir in environment_dirs {
            let environment = dir.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
            for path in Self::template_files(&dir).await? {
                let definition = Self::read_template(&path, project_id, &environment).await?;
                let template_matches = template_id.is_empty() || definition.info.prompt_template_id == template_id;
                if template_matches && definition.info.prompt_template_version_id == version_id {
                    return Ok(definition);
                }
            }
        }
        Err(FetchError::VersionNotFound {
            project: project_id.to_string(),
            template_id: template_id.to_string(),
            version_id: version_id.to_string(),
        })
    }

    async fn get_prompts(&self, project_id: &str, environment: &str) -> Result<Vec<TemplateDefinition>, FetchError> {
        let dir = self.environment_dir(project_id, environment).await?;
        let mut definitions = Vec::new();
        for path in Self::template_files(&dir).await? {
            definitions.push(Self::read_template(&path, project_id, environment).await?);
        }
        Ok(definitions)
    }
}
