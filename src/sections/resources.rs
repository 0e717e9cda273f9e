//! Resource instances: `getResource`, the path → type table and the
//! per-type defaults.
use super::{Reporter, SectionState};
use crate::codegen::quote;
use crate::context::GenerationContext;
use crate::error::Result;
use crate::transform::{declare_resource_type, resource_type_name};

/// Local name of the configured post-process hook in the generated file.
pub const POST_PROCESS_IDENT: &str = "postProcessResource";

const GET_RESOURCE: &str = r#"export const getResource = async <Path extends keyof typeof resourceToType>(
  path: Path,
): Promise<z.infer<(typeof resourceToType)[Path]>> => {
  const schema = resourceToType[path];
  const data = await wmill.getResource(path);

  return schema.parse(data);
};
"#;

const GET_RESOURCE_WITH_HOOK: &str = r#"export const getResource = async <Path extends keyof typeof resourceToType>(
  path: Path,
): Promise<z.infer<(typeof resourceToType)[Path]>> => {
  const schema = resourceToType[path];
  const data = await postProcessResource(await wmill.getResource(path), path);

  return schema.parse(data);
};
"#;

pub async fn generate(ctx: &mut GenerationContext<'_>, reporter: &Reporter) -> Result<()> {
    reporter.report(SectionState::Fetching);
    let instances = ctx.instances().await?;
    let config = ctx.config();
    let configured = &config.resources.defaults;

    reporter.report(SectionState::Transforming);
    // A configured default is checked even when its type has no instances.
    for (resource_type, path) in configured {
        if path.is_some() {
            instances.resolve_default(resource_type, configured)?;
        }
    }
    let mut defaults = Vec::new();
    for (resource_type, _) in instances.iter() {
        declare_resource_type(ctx, resource_type)?;
        if let Some(path) = instances.resolve_default(resource_type, configured)? {
            defaults.push((resource_type, path));
        }
    }

    reporter.report(SectionState::Emitting);
    let accessor = if config.resources.post_process.is_some() { GET_RESOURCE_WITH_HOOK } else { GET_RESOURCE };
    ctx.write(accessor).await?;

    ctx.write("const resourceToType = lazyObject(() => ({").await?;
    for (resource_type, paths) in instances.iter() {
        let type_name = resource_type_name(resource_type);
        for path in paths {
            ctx.write(&format!("{}: {type_name},", quote(path))).await?;
        }
    }
    ctx.write("} as const));").await?;

    let mut names = instances.iter().map(|(name, _)| name).collect::<Vec<_>>();
    names.sort_unstable();
    ctx.write("export type ResourceTypes = {").await?;
    for name in names {
        ctx.write(&format!("{}: z.infer<typeof {}>,", quote(name), resource_type_name(name))).await?;
    }
    ctx.write("};").await?;

    ctx.write("export const resourceDefaults = {").await?;
    for (resource_type, path) in &defaults {
        ctx.write(&format!("{}: {},", quote(resource_type), quote(path))).await?;
    }
    ctx.write("} as const;").await?;
    Ok(())
}
