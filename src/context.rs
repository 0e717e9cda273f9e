//! Per-run generation state threaded explicitly through every generator.
//!
//! A [`RunScope`] is created once per run and owns everything the sections
//! share: the resource type catalog, the configuration, the lazily resolved
//! instance index and the deferred-declaration queue. Each section writes
//! through its own [`GenerationContext`] whose sink is either the real output
//! (the root) or an isolated [`SectionBuffer`] (a child).
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::OnceCell;

use crate::catalog::{Catalog, InstanceIndex, ResourceTypeCatalog};
use crate::codegen::GeneratedDeclaration;
use crate::config::Config;
use crate::error::Result;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

pub struct RunScope<'c> {
    client: &'c dyn Catalog,
    catalog: ResourceTypeCatalog,
    config: &'c Config,
    output_root: PathBuf,
    /// Rendered deferred declarations; sorted and flushed once by the root.
    deferred: Mutex<Vec<String>>,
    /// Identities already emitted (or being emitted) through `defer_once`.
    claimed: Mutex<HashSet<String>>,
    instances: OnceCell<InstanceIndex>,
}

/// Ordered text accumulated by one section.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SectionBuffer {
    text: String,
}

enum Sink<'s> {
    Output(&'s mut (dyn AsyncWrite + Unpin + Send)),
    Buffer(SectionBuffer),
}

pub struct GenerationContext<'s> {
    scope: &'s RunScope<'s>,
    sink: Sink<'s>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl<'c> RunScope<'c> {
    pub fn new(client: &'c dyn Catalog, catalog: ResourceTypeCatalog, config: &'c Config, output_root: PathBuf) -> Self {
        Self {
            client,
            catalog,
            config,
            output_root,
            deferred: Mutex::default(),
            claimed: Mutex::default(),
            instances: OnceCell::new(),
        }
    }
}

impl SectionBuffer {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl<'s> GenerationContext<'s> {
    pub fn root(scope: &'s RunScope<'s>, output: &'s mut (dyn AsyncWrite + Unpin + Send)) -> Self {
        Self { scope, sink: Sink::Output(output) }
    }

    /// A context sharing this run's scope that writes into a fresh buffer.
    pub fn child(&self) -> GenerationContext<'s> {
        GenerationContext { scope: self.scope, sink: Sink::Buffer(SectionBuffer::default()) }
    }

    /// Write `text` and a newline to this context's sink.
    pub async fn write(&mut self, text: &str) -> Result<()> {
        match &mut self.sink {
            Sink::Output(out) => {
                out.write_all(text.as_bytes()).await?;
                out.write_all(b"\n").await?;
            }
            Sink::Buffer(buffer) => {
                buffer.text.push_str(text);
                buffer.text.push('\n');
            }
        }
        Ok(())
    }

    /// Append a section's buffered output verbatim.
    pub async fn append(&mut self, buffer: &SectionBuffer) -> Result<()> {
        match &mut self.sink {
            Sink::Output(out) => out.write_all(buffer.text.as_bytes()).await?,
            Sink::Buffer(own) => own.text.push_str(&buffer.text),
        }
        Ok(())
    }

    /// Queue text for the end of the output. Child contexts share the root queue.
    pub fn defer_write(&self, text: impl Into<String>) {
        self.scope.deferred.lock().unwrap_or_else(PoisonError::into_inner).push(text.into());
    }

    /// Emit the declarations built by `build` at most once per run under
    /// `identity`. The identity is claimed before `build` runs, so a nested
    /// request for the same identity returns immediately; a failed build
    /// releases it again.
    pub fn defer_once<F>(&self, identity: &str, build: F) -> Result<()>
    where
        F: FnOnce() -> Result<Vec<GeneratedDeclaration>>,
    {
        if !self.claim(identity) {
            return Ok(());
        }
        match build() {
            Ok(declarations) => {
                for declaration in declarations {
                    self.defer_write(declaration.render());
                }
                Ok(())
            }
            Err(e) => {
                self.scope.claimed.lock().unwrap_or_else(PoisonError::into_inner).remove(identity);
                Err(e)
            }
        }
    }

    fn claim(&self, identity: &str) -> bool {
        self.scope.claimed.lock().unwrap_or_else(PoisonError::into_inner).insert(identity.to_string())
    }

    pub fn catalog(&self) -> &'s ResourceTypeCatalog {
        &self.scope.catalog
    }

    pub fn config(&self) -> &'s Config {
        self.scope.config
    }

    pub fn client(&self) -> &'s dyn Catalog {
        self.scope.client
    }

    pub fn output_root(&self) -> &'s Path {
        &self.scope.output_root
    }

    /// The instance index, listing resources on first use. Every caller in the
    /// run observes the same index.
    pub async fn instances(&self) -> Result<&'s InstanceIndex> {
        let scope = self.scope;
        scope
            .instances
            .get_or_try_init(|| async move {
                tracing::debug!("resolving resource instances");
                let listing = scope.client.list_resources(None);
                InstanceIndex::collect(listing, &scope.catalog).await
            })
            .await
    }

    /// The instance index if some section already resolved it.
    pub fn resolved_instances(&self) -> Option<&'s InstanceIndex> {
        self.scope.instances.get()
    }

    /// Hand the buffered text of a child context back to its owner.
    pub fn into_buffer(self) -> SectionBuffer {
        match self.sink {
            Sink::Buffer(buffer) => buffer,
            Sink::Output(_) => SectionBuffer::default(),
        }
    }

    /// Flush the sorted deferred declarations, then flush and close the sink.
    pub async fn finish(mut self) -> Result<()> {
        let mut deferred = std::mem::take(&mut *self.scope.deferred.lock().unwrap_or_else(PoisonError::into_inner));
        deferred.sort();
        for text in &deferred {
            self.write(text).await?;
        }
        if let Sink::Output(out) = &mut self.sink {
            out.flush().await?;
            out.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::error::Error;

    fn declaration(name: &str) -> GeneratedDeclaration {
        GeneratedDeclaration::new(name, "z.string()")
    }

    #[tokio::test]
    async fn children_buffer_while_deferred_entries_reach_the_root() {
        let client = MemoryCatalog::new();
        let config = Config::default();
        let scope = RunScope::new(&client, ResourceTypeCatalog::default(), &config, PathBuf::from("."));
        let mut out: Vec<u8> = Vec::new();
        {
            let mut root = GenerationContext::root(&scope, &mut out);
            let mut child = root.child();
            child.write("const b = 1;").await.unwrap();
            child.defer_write("const z_last = 1;");
            child.defer_write("const a_first = 1;");
            root.write("// head").await.unwrap();
            let buffer = child.into_buffer();
            assert_eq!(buffer.as_str(), "const b = 1;\n");
            root.append(&buffer).await.unwrap();
            root.finish().await.unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "// head\nconst b = 1;\nconst a_first = 1;\nconst z_last = 1;\n");
    }

    #[tokio::test]
    async fn defer_once_emits_each_identity_once() {
        let client = MemoryCatalog::new();
        let config = Config::default();
        let scope = RunScope::new(&client, ResourceTypeCatalog::default(), &config, PathBuf::from("."));
        let mut out: Vec<u8> = Vec::new();
        let root = GenerationContext::root(&scope, &mut out);
        let first = root.child();
        let second = root.child();

        first.defer_once("base64", || Ok(vec![declaration("base64Content")])).unwrap();
        second.defer_once("base64", || panic!("built twice")).unwrap();
        assert_eq!(scope.deferred.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recursive_claims_terminate_and_failures_release() {
        let client = MemoryCatalog::new();
        let config = Config::default();
        let scope = RunScope::new(&client, ResourceTypeCatalog::default(), &config, PathBuf::from("."));
        let mut out: Vec<u8> = Vec::new();
        let ctx = GenerationContext::root(&scope, &mut out);

        ctx.defer_once("resource-type:a", || {
            ctx.defer_once("resource-type:a", || panic!("re-entered"))?;
            Ok(vec![declaration("a_type")])
        })
        .unwrap();

        let err = ctx
            .defer_once("resource-type:b", || Err(Error::InstancesUnresolved("b".into())))
            .unwrap_err();
        assert!(matches!(err, Error::InstancesUnresolved(_)));
        ctx.defer_once("resource-type:b", || Ok(vec![declaration("b_type")])).unwrap();
        assert_eq!(scope.deferred.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn instances_resolve_once_per_run() {
        let client = MemoryCatalog::new().with_resource_type("db", None).with_resource("db", "f/a/db1");
        let config = Config::default();
        let catalog = client.list_resource_types().await.unwrap();
        let scope = RunScope::new(&client, catalog, &config, PathBuf::from("."));
        let mut out: Vec<u8> = Vec::new();
        let ctx = GenerationContext::root(&scope, &mut out);

        assert!(ctx.resolved_instances().is_none());
        let child = ctx.child();
        let (a, b) = tokio::join!(ctx.instances(), child.instances());
        assert!(std::ptr::eq(a.unwrap(), b.unwrap()));
        assert_eq!(ctx.resolved_instances().unwrap().paths("db"), ["f/a/db1"]);
    }
}
