//! In-process `Catalog` test double with injectable latency and failures.
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde_json::Value;

use super::{Artifact, Catalog, ResourceInstance, ResourceType, ResourceTypeCatalog};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listing {
    ResourceTypes,
    Resources,
    Scripts,
    Flows,
}

impl Listing {
    fn label(self) -> &'static str {
        match self {
            Listing::ResourceTypes => "resource types",
            Listing::Resources => "resources",
            Listing::Scripts => "scripts",
            Listing::Flows => "flows",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    resource_types: Vec<ResourceType>,
    resources: Vec<ResourceInstance>,
    scripts: Vec<Artifact>,
    flows: Vec<Artifact>,
    /// Simulated latency before an item is yielded, keyed by path (or type name).
    latency: HashMap<String, Duration>,
    failing: HashSet<Listing>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_type(mut self, name: &str, schema: Option<Value>) -> Self {
        self.resource_types.push(ResourceType { name: name.to_string(), schema, description: None });
        self
    }

    /// Attach a description to an already added resource type.
    pub fn described(mut self, name: &str, description: &str) -> Self {
        if let Some(resource_type) = self.resource_types.iter_mut().find(|t| t.name == name) {
            resource_type.description = Some(description.to_string());
        }
        self
    }

    pub fn with_resource(mut self, resource_type: &str, path: &str) -> Self {
        self.resources.push(ResourceInstance { path: path.to_string(), resource_type: resource_type.to_string() });
        self
    }

    pub fn with_script(mut self, path: &str, schema: Option<Value>) -> Self {
        self.scripts.push(Artifact { path: path.to_string(), schema });
        self
    }

    pub fn with_flow(mut self, path: &str, schema: Option<Value>) -> Self {
        self.flows.push(Artifact { path: path.to_string(), schema });
        self
    }

    pub fn with_latency(mut self, key: &str, latency: Duration) -> Self {
        self.latency.insert(key.to_string(), latency);
        self
    }

    /// Make a listing fail when consumed.
    pub fn failing(mut self, listing: Listing) -> Self {
        self.failing.insert(listing);
        self
    }

    fn failure(&self, listing: Listing) -> Option<Error> {
        self.failing.contains(&listing).then(|| Error::Catalog {
            what: listing.label().to_string(),
            message: "injected failure".to_string(),
        })
    }

    fn delay(&self, key: &str) -> Duration {
        self.latency.get(key).copied().unwrap_or_default()
    }

    fn yield_slowly<'a, T: Send + 'a>(&'a self, items: Vec<(String, T)>, listing: Listing) -> BoxStream<'a, Result<T>> {
        if let Some(err) = self.failure(listing) {
            return stream::once(async move { Err(err) }).boxed();
        }
        stream::iter(items)
            .then(move |(key, item)| async move {
                let delay = self.delay(&key);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(item)
            })
            .boxed()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_resource_types(&self) -> Result<ResourceTypeCatalog> {
        if let Some(err) = self.failure(Listing::ResourceTypes) {
            return Err(err);
        }
        Ok(self.resource_types.iter().cloned().collect())
    }

    fn list_resources<'a>(&'a self, resource_type: Option<&'a str>) -> BoxStream<'a, Result<ResourceInstance>> {
        let items = self
            .resources
            .iter()
            .filter(|r| resource_type.is_none_or(|t| t == r.resource_type))
            .map(|r| (r.resource_type.clone(), r.clone()))
            .collect();
        self.yield_slowly(items, Listing::Resources)
    }

    fn list_scripts(&self) -> BoxStream<'_, Result<Artifact>> {
        let items = self.scripts.iter().map(|s| (s.path.clone(), s.clone())).collect();
        self.yield_slowly(items, Listing::Scripts)
    }

    fn list_flows(&self) -> BoxStream<'_, Result<Artifact>> {
        let items = self.flows.iter().map(|f| (f.path.clone(), f.clone())).collect();
        self.yield_slowly(items, Listing::Flows)
    }
}
