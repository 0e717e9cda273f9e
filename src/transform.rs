//! Schema → Zod source, plus the shared declarations rewrites point at.
use serde_json::Value;

use crate::catalog::RESOURCE_REF_PREFIX;
use crate::codegen::{GeneratedDeclaration, identifier, quote, zod};
use crate::context::GenerationContext;
use crate::error::{Error, Result};
use crate::ir::{Extra, Field, Ty};
use crate::lower::Lowerer;

pub const BASE64_CONTENT: &str = "base64Content";
pub const S3_OBJECT: &str = "s3Object";

/// Raw base64, or a `data:<mime>;base64,<payload>` URI with a base64 payload.
const BASE64_CONTENT_SOURCE: &str = r#"z.string().refine((value) => { const match = /^data:[^;,]+;base64,(.*)$/s.exec(value); return z.base64().safeParse(match ? match[1] : value).success; }, { message: "Expected base64 content or a base64 data URI" })"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    /// Let the outermost object accept undeclared keys.
    pub loose_top_level: bool,
}

pub fn transform(schema: &Value, options: &TransformOptions, ctx: &GenerationContext<'_>) -> Result<String> {
    let ty = Lowerer::new(ctx, options.loose_top_level).lower(schema)?;
    Ok(zod::emit(&ty))
}

pub fn resource_type_name(resource_type: &str) -> String {
    identifier(&format!("{resource_type}_type"))
}

pub fn resource_references_name(resource_type: &str) -> String {
    identifier(&format!("{resource_type}_references"))
}

pub fn resource_union_name(resource_type: &str) -> String {
    identifier(&format!("{resource_type}_resource"))
}

pub fn declare_base64_content(ctx: &GenerationContext<'_>) -> Result<Ty> {
    ctx.defer_once("base64-content", || Ok(vec![GeneratedDeclaration::new(BASE64_CONTENT, BASE64_CONTENT_SOURCE)]))?;
    Ok(Ty::Ref(BASE64_CONTENT.to_string()))
}

/// `{ s3, storage?, filename? }` file handles.
pub fn declare_s3_object(ctx: &GenerationContext<'_>) -> Result<Ty> {
    ctx.defer_once("s3-object", || {
        let string = || Ty::String { format: None, pattern: None, min_len: None, max_len: None };
        let ty = Ty::Object {
            fields: vec![
                Field { name: "s3".into(), ty: string(), required: true },
                Field { name: "storage".into(), ty: string(), required: false },
                Field { name: "filename".into(), ty: string(), required: false },
            ],
            extra: Extra::Strip,
        };
        Ok(vec![GeneratedDeclaration::new(S3_OBJECT, zod::emit(&ty))])
    })?;
    Ok(Ty::Ref(S3_OBJECT.to_string()))
}

/// Declare everything belonging to `resource_type` once per run:
///
/// - `<T>_type`, the type's own validator
/// - `<T>_references`, the `$res:` paths of its instances (if any)
/// - `<T>_resource`, either of the two (if it has instances)
///
/// Instances must have been resolved already.
pub fn declare_resource_type(ctx: &GenerationContext<'_>, resource_type: &str) -> Result<()> {
    ctx.defer_once(&format!("resource-type:{resource_type}"), || {
        let instances = ctx
            .resolved_instances()
            .ok_or_else(|| Error::InstancesUnresolved(resource_type.to_string()))?;
        let type_name = resource_type_name(resource_type);

        let declared = ctx.catalog().get(resource_type);
        let schema = declared.and_then(|t| t.schema.as_ref());
        let mut type_source = match schema {
            Some(schema) => transform(schema, &TransformOptions::default(), ctx)?,
            None => zod::emit(&Ty::Any),
        };
        // the schema's own description wins
        let described = schema
            .and_then(|schema| schema.get("description"))
            .and_then(Value::as_str)
            .is_some_and(|d| !d.is_empty());
        if let Some(description) = declared.and_then(|t| t.description.as_deref()).filter(|d| !d.is_empty() && !described) {
            type_source.push_str(&format!(".describe({})", quote(description)));
        }
        let mut declarations = vec![GeneratedDeclaration::new(&type_name, type_source)];

        let paths = instances.paths(resource_type);
        if !paths.is_empty() {
            let default = instances.resolve_default(resource_type, &ctx.config().resources.defaults)?;
            let references_name = resource_references_name(resource_type);
            declarations.push(GeneratedDeclaration::new(&references_name, zod::emit(&references(paths, default))));
            declarations.push(GeneratedDeclaration::new(
                resource_union_name(resource_type),
                format!("z.union([{references_name}, {type_name}])"),
            ));
        }
        tracing::debug!(resource_type, instances = paths.len(), "declared resource type");
        Ok(declarations)
    })
}

/// The validator an argument of `resource_type` should use.
pub fn resource_reference(ctx: &GenerationContext<'_>, resource_type: &str) -> Result<Ty> {
    declare_resource_type(ctx, resource_type)?;
    let has_instances = ctx.resolved_instances().is_some_and(|index| !index.paths(resource_type).is_empty());
    Ok(Ty::Ref(if has_instances { resource_union_name(resource_type) } else { resource_type_name(resource_type) }))
}

fn references(paths: &[String], default: Option<String>) -> Ty {
    let mut refs = paths.iter().map(|path| format!("{RESOURCE_REF_PREFIX}{path}")).collect::<Vec<_>>();
    let ty = if refs.len() == 1 { Ty::Literal(Value::from(refs.remove(0))) } else { Ty::Enum(refs) };
    match default {
        Some(path) => Ty::Defaulted { inner: Box::new(ty), default: Value::from(format!("{RESOURCE_REF_PREFIX}{path}")) },
        None => ty,
    }
}
