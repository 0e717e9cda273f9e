//! The remote artifact catalog: data model and the listing interface the
//! generator consumes.
pub mod memory;
pub mod retry;
pub mod windmill;

use async_trait::async_trait;
use futures::TryStreamExt;
use futures::stream::BoxStream;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Instance references in generated code look like `$res:<path>`.
pub const RESOURCE_REF_PREFIX: &str = "$res:";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceType {
    pub name: String,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A resource instance as listed by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourceInstance {
    pub path: String,
    pub resource_type: String,
}

/// A script or flow: a path and the schema of its arguments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Artifact {
    pub path: String,
    #[serde(default)]
    pub schema: Option<Value>,
}

/// Every resource type visible to the caller, keyed by name. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeCatalog {
    types: IndexMap<String, ResourceType>,
}

impl ResourceTypeCatalog {
    pub fn get(&self, name: &str) -> Option<&ResourceType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<ResourceType> for ResourceTypeCatalog {
    fn from_iter<I: IntoIterator<Item = ResourceType>>(iter: I) -> Self {
        let types = iter.into_iter().map(|t| (t.name.clone(), t)).collect();
        Self { types }
    }
}

/// Listing interface over a remote catalog. Sequences are paginated by the
/// implementation and yield items in discovery order.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_resource_types(&self) -> Result<ResourceTypeCatalog>;

    fn list_resources<'a>(&'a self, resource_type: Option<&'a str>) -> BoxStream<'a, Result<ResourceInstance>>;

    /// Archived scripts are never yielded.
    fn list_scripts(&self) -> BoxStream<'_, Result<Artifact>>;

    fn list_flows(&self) -> BoxStream<'_, Result<Artifact>>;
}

// ————————————————————————————————————————————————————————————————————————————
// INSTANCE INDEX
// ————————————————————————————————————————————————————————————————————————————

/// Resource instance paths grouped by resource type, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct InstanceIndex {
    by_type: IndexMap<String, Vec<String>>,
}

impl InstanceIndex {
    /// Drain a resource listing; instances of types missing from `catalog` are skipped.
    pub async fn collect(
        mut resources: BoxStream<'_, Result<ResourceInstance>>,
        catalog: &ResourceTypeCatalog,
    ) -> Result<Self> {
        let mut index = Self::default();
        while let Some(resource) = resources.try_next().await? {
            if !catalog.contains(&resource.resource_type) {
                tracing::trace!(path = %resource.path, resource_type = %resource.resource_type, "skipping resource of unknown type");
                continue;
            }
            index.insert(resource);
        }
        Ok(index)
    }

    fn insert(&mut self, resource: ResourceInstance) {
        self.by_type.entry(resource.resource_type).or_default().push(resource.path);
    }

    pub fn paths(&self, resource_type: &str) -> &[String] {
        self.by_type.get(resource_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.by_type.iter().map(|(t, paths)| (t.as_str(), paths.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// The default instance of `resource_type`:
    /// an explicit configured path (which must exist), an explicit `null`
    /// (none), or the single instance when exactly one exists.
    pub fn resolve_default(
        &self,
        resource_type: &str,
        configured: &IndexMap<String, Option<String>>,
    ) -> Result<Option<String>> {
        let paths = self.paths(resource_type);
        match configured.get(resource_type) {
            Some(Some(path)) => {
                let path = path.strip_prefix(RESOURCE_REF_PREFIX).unwrap_or(path);
                if paths.iter().any(|p| p == path) {
                    Ok(Some(path.to_string()))
                } else {
                    Err(Error::InvalidResourceDefault {
                        resource_type: resource_type.to_string(),
                        path: path.to_string(),
                        available: if paths.is_empty() { "no instances".to_string() } else { paths.join(", ") },
                    })
                }
            }
            Some(None) => Ok(None),
            None if paths.len() == 1 => Ok(Some(paths[0].clone())),
            None => Ok(None),
        }
    }
}

impl FromIterator<ResourceInstance> for InstanceIndex {
    fn from_iter<I: IntoIterator<Item = ResourceInstance>>(iter: I) -> Self {
        let mut index = Self::default();
        for resource in iter {
            index.insert(resource);
        }
        index
    }
}
