//! `Catalog` over the Windmill REST API.
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::retry::with_retry;
use super::{Artifact, Catalog, ResourceInstance, ResourceType, ResourceTypeCatalog};
use crate::config::FetchRetryConfig;
use crate::error::{Error, Result};
use crate::path_de::decode_response;

const PER_PAGE: u32 = 20;

/// Internal resource types that never make sense in a client.
const EXCLUDED_RESOURCE_TYPES: &str = "cache,state,app_theme,app_custom";

#[derive(Debug, Clone)]
pub struct WindmillClient {
    http: Client,
    /// Origin of the remote, e.g. `https://app.windmill.dev/`.
    base: Url,
    workspace: String,
    token: String,
    retry: FetchRetryConfig,
    concurrency: usize,
}

#[derive(Debug, Deserialize)]
struct ScriptDetail {
    path: String,
    #[serde(default)]
    schema: Option<serde_json::Value>,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
struct FlowListing {
    path: String,
}

impl WindmillClient {
    pub fn new(remote: &str, workspace: &str, token: &str) -> Result<Self> {
        let parsed = Url::parse(remote).map_err(|source| Error::RemoteUrl { remote: remote.to_string(), source })?;
        let origin = parsed.origin().ascii_serialization();
        let base = Url::parse(&format!("{origin}/"))
            .map_err(|source| Error::RemoteUrl { remote: remote.to_string(), source })?;
        Ok(Self {
            http: Client::new(),
            base,
            workspace: workspace.to_string(),
            token: token.to_string(),
            retry: FetchRetryConfig::default(),
            concurrency: crate::config::DEFAULT_CONCURRENCY,
        })
    }

    pub fn with_retry(mut self, retry: FetchRetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Bound on in-flight detail fetches.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// `{base}/api/w/{workspace}/{segments...}`; each segment may contain `/`.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "w", self.workspace.as_str()]);
            for segment in segments {
                path.extend(segment.split('/'));
            }
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let what = url.path().to_string();
        with_retry(&self.retry, &what, || {
            let url = url.clone();
            async move {
                let response = self
                    .http
                    .get(url.clone())
                    .bearer_auth(&self.token)
                    .send()
                    .await
                    .map_err(|source| Error::Http { url: url.to_string(), source })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(Error::Status { url: url.to_string(), status });
                }
                let body = response
                    .bytes()
                    .await
                    .map_err(|source| Error::Http { url: url.to_string(), source })?;
                decode_response(url.as_str(), &body)
            }
        })
        .await
    }

    /// Sequential pages of `T` until an empty page.
    fn paginate<'a, T>(&'a self, segments: &'a [&'a str], filter: Vec<(&'static str, String)>) -> BoxStream<'a, Result<T>>
    where
        T: DeserializeOwned + Send + 'a,
    {
        stream::try_unfold(Some(1u32), move |page| {
            let filter = filter.clone();
            async move {
                let Some(page) = page else { return Ok::<_, Error>(None) };
                let mut url = self.endpoint(segments);
                {
                    let mut query = url.query_pairs_mut();
                    query.append_pair("page", &page.to_string());
                    query.append_pair("per_page", &PER_PAGE.to_string());
                    for (key, value) in &filter {
                        query.append_pair(key, value);
                    }
                }
                tracing::debug!(%url, "fetching page");
                let items: Vec<T> = self.get_json(url).await?;
                if items.is_empty() {
                    return Ok(None);
                }
                Ok(Some((stream::iter(items.into_iter().map(Ok::<_, Error>)), Some(page + 1))))
            }
        })
        .try_flatten()
        .boxed()
    }
}

#[async_trait]
impl Catalog for WindmillClient {
    async fn list_resource_types(&self) -> Result<ResourceTypeCatalog> {
        let types: Vec<ResourceType> = self.get_json(self.endpoint(&["resources", "type", "list"])).await?;
        tracing::debug!(count = types.len(), "resource types listed");
        Ok(types.into_iter().collect())
    }

    fn list_resources<'a>(&'a self, resource_type: Option<&'a str>) -> BoxStream<'a, Result<ResourceInstance>> {
        let mut filter = vec![("resource_type_exclude", EXCLUDED_RESOURCE_TYPES.to_string())];
        if let Some(resource_type) = resource_type {
            filter.push(("resource_type", resource_type.to_string()));
        }
        self.paginate(&["resources", "list"], filter)
    }

    fn list_scripts(&self) -> BoxStream<'_, Result<Artifact>> {
        let paths = stream::once(async move {
            let paths: Vec<String> = self.get_json(self.endpoint(&["scripts", "list_paths"])).await?;
            Ok::<_, Error>(stream::iter(paths.into_iter().map(Ok::<_, Error>)))
        })
        .try_flatten();

        paths
            .map_ok(move |path| async move {
                self.get_json::<ScriptDetail>(self.endpoint(&["scripts", "get", "p", &path])).await
            })
            .try_buffered(self.concurrency)
            .try_filter_map(|script| async move {
                if script.archived {
                    tracing::debug!(path = %script.path, "skipping archived script");
                    return Ok::<_, Error>(None);
                }
                Ok(Some(Artifact { path: script.path, schema: script.schema }))
            })
            .boxed()
    }

    fn list_flows(&self) -> BoxStream<'_, Result<Artifact>> {
        self.paginate::<FlowListing>(&["flows", "list"], Vec::new())
            .map_ok(move |listing| async move {
                self.get_json::<Artifact>(self.endpoint(&["flows", "get", &listing.path])).await
            })
            .try_buffered(self.concurrency)
            .boxed()
    }
}
