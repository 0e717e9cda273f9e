//! Shared generator for callable artifacts (scripts and flows).
use futures::TryStreamExt;
use futures::stream::BoxStream;

use super::{Reporter, SectionState};
use crate::catalog::Artifact;
use crate::codegen::{GeneratedDeclaration, identifier, quote};
use crate::config::RunnableOptions;
use crate::context::GenerationContext;
use crate::error::{Error, Result};
use crate::schema;
use crate::transform::{TransformOptions, transform};

pub struct RunnableSection<'a> {
    /// Name of the generated lookup table, also the declaration prefix.
    pub map_name: &'static str,
    /// Accessor functions written ahead of the declarations.
    pub accessors: &'static str,
    pub options: &'a RunnableOptions,
}

pub async fn generate(
    ctx: &mut GenerationContext<'_>,
    reporter: &Reporter,
    section: RunnableSection<'_>,
    listing: BoxStream<'_, Result<Artifact>>,
) -> Result<()> {
    reporter.report(SectionState::Fetching);
    let artifacts: Vec<Artifact> = listing.try_collect().await?;
    tracing::debug!(section = section.map_name, count = artifacts.len(), "artifacts listed");

    let catalog = ctx.catalog();
    let needs_instances = artifacts
        .iter()
        .filter_map(|artifact| artifact.schema.as_ref())
        .flat_map(schema::collect_resource_types)
        .any(|name| !schema::is_storage_object(&name) && catalog.contains(&name));
    if needs_instances {
        ctx.instances().await?;
    }

    reporter.report(SectionState::Transforming);
    let options = TransformOptions { loose_top_level: section.options.loose_args };
    let mut declarations = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        let Some(schema) = &artifact.schema else {
            tracing::debug!(path = %artifact.path, "no argument schema, skipping");
            continue;
        };
        let source = transform(schema, &options, ctx).map_err(|e| locate(e, &artifact.path))?;
        let name = identifier(&format!("{}_{}", section.map_name, artifact.path));
        declarations.push((artifact.path.as_str(), GeneratedDeclaration::new(name, source)));
    }

    reporter.report(SectionState::Emitting);
    ctx.write(section.accessors).await?;
    for (_, declaration) in &declarations {
        ctx.write(&declaration.render()).await?;
    }
    ctx.write(&format!("const {} = lazyObject(() => ({{", section.map_name)).await?;
    for (path, declaration) in &declarations {
        ctx.write(&format!("{}: {},", quote(path), declaration.name)).await?;
    }
    ctx.write("} as const));").await?;
    Ok(())
}

/// Prefix schema locations with the artifact they came from.
fn locate(error: Error, path: &str) -> Error {
    match error {
        Error::InvalidSchema { location, message } => Error::InvalidSchema { location: format!("{path}{location}"), message },
        other => other,
    }
}
