//! Shared template snapshots.
//!
//! Each key maps to an `Arc<TemplateDefinition>`. A refresh replaces the `Arc` under one write
//! lock, so a concurrent bind sees either the old or the new version, never a mix. Locks are
//! never held across a fetch.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;

use crate::error::FetchError;
use crate::resolver::TemplateResolver;
use crate::template::TemplateDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    Environment {
        project_id: String,
        template_name: String,
        environment: String,
    },
    Version {
        project_id: String,
        template_id: String,
        version_id: String,
    },
}

impl TemplateKey {
    pub fn environment(project_id: &str, template_name: &str, environment: &str) -> Self {
        TemplateKey::Environment {
            project_id: project_id.to_string(),
            template_name: template_name.to_string(),
            environment: environment.to_string(),
        }
    }

    pub fn version(project_id: &str, template_id: &str, version_id: &str) -> Self {
        TemplateKey::Version {
            project_id: project_id.to_string(),
            template_id: template_id.to_string(),
            version_id: version_id.to_string(),
        }
    }
}

pub struct SnapshotCache<R> {
    resolver: R,
    snapshots: RwLock<HashMap<TemplateKey, Arc<TemplateDefinition>>>,
}

impl<R: TemplateResolver> SnapshotCache<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The cached snapshot for the deployed version, fetching it on a miss.
    pub async fn get(
        &self,
        project_id: &str,
        template_name: &str,
        environment: &str,
    ) -> Result<Arc<TemplateDefinition>, FetchError> {
        let key = TemplateKey::environment(project_id, template_name, environment);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        let fetched = self.resolver.get_prompt(project_id, template_name, environment).await?;
        Ok(self.insert_if_absent(key, fetched))
    }

    /// The cached snapshot of an exact version, fetching it on a miss.
    pub async fn get_by_version_id(
        &self,
        project_id: &str,
        template_id: &str,
        version_id: &str,
    ) -> Result<Arc<TemplateDefinition>, FetchError> {
        let key = TemplateKey::version(project_id, template_id, version_id);
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        let fetched = self
            .resolver
            .get_prompt_by_version_id(project_id, template_id, version_id)
            .await?;
        Ok(self.insert_if_absent(key, fetched))
    }

    /// Refetches the deployed version and swaps it in, whether or not it was cached.
    pub async fn refresh(
        &self,
        project_id: &str,
        template_name: &str,
        environment: &str,
    ) -> Result<Arc<TemplateDefinition>, FetchError> {
        let fetched = Arc::new(self.resolver.get_prompt(project_id, template_name, environment).await?);
        let key = TemplateKey::environment(project_id, template_name, environment);
        self.write().insert(key, Arc::clone(&fetched));
        Ok(fetched)
    }

    /// Refetches every template of an environment and swaps them all in under one lock.
    pub async fn refresh_environment(&self, project_id: &str, environment: &str) -> Result<usize, FetchError> {
        let fetched = self.resolver.get_prompts(project_id, environment).await?;
        let count = fetched.len();
        let mut snapshots = self.write();
        for definition in fetched {
            let key = TemplateKey::environment(project_id, &definition.info.template_name, environment);
            snapshots.insert(key, Arc::new(definition));
        }
        debug!("Refreshed {} templates of project {} in {}", count, project_id, environment);
        Ok(count)
    }

    pub fn invalidate(&self, key: &TemplateKey) -> Option<Arc<TemplateDefinition>> {
        self.write().remove(key)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &TemplateKey) -> Option<Arc<TemplateDefinition>> {
        let hit = self
            .snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        debug!("Template cache {} for {:?}", if hit.is_some() { "hit" } else { "miss" }, key);
        hit
    }

    /// Keeps a snapshot another task inserted meanwhile, so every caller shares one `Arc`.
    fn insert_if_absent(&self, key: TemplateKey, fetched: TemplateDefinition) -> Arc<TemplateDefinition> {
        Arc::clone(self.write().entry(key).or_insert_with(|| Arc::new(fetched)))
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<TemplateKey, Arc<TemplateDefinition>>> {
        self.snapshots.write().unwrap_or_else(PoisonError::into_inner)
    }
}
