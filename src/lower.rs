//! JSON Schema → `ir::Ty`.
//!
//! Every node is first offered to the rewrite rules, in order, on a private
//! copy of the node. A rule either replaces the whole subtree or edits the
//! copy and lets the next rule (and finally the default traversal) continue.
use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::context::GenerationContext;
use crate::error::{Error, Result};
use crate::ir::{Extra, Field, NumBounds, StrFormat, Ty};
use crate::schema::{self, DYNSELECT_PREFIX};
use crate::transform;

pub enum Rewrite {
    /// The subtree is fully described by this type.
    Replace(Ty),
    Continue,
}

/// Where a node sits in the schema being lowered.
#[derive(Debug, Clone)]
pub struct Site {
    pub depth: usize,
    pub pointer: String,
}

impl Site {
    fn root() -> Self {
        Self { depth: 0, pointer: "#".to_string() }
    }

    fn child(&self, segments: &[&str]) -> Self {
        let mut pointer = self.pointer.clone();
        for segment in segments {
            pointer.push('/');
            pointer.push_str(&segment.replace('~', "~0").replace('/', "~1"));
        }
        Self { depth: self.depth + 1, pointer }
    }

    fn invalid(&self, message: impl Into<String>) -> Error {
        Error::InvalidSchema { location: self.pointer.clone(), message: message.into() }
    }
}

type Rule = fn(&Lowerer<'_, '_>, &mut Map<String, Value>, &Site) -> Result<Rewrite>;

/// Applied to every node in this order.
const RULES: &[(&str, Rule)] = &[
    ("null-default", elide_null_default),
    ("invalid-enum-default", elide_invalid_enum_default),
    ("null-string-enum", elide_null_string_enum),
    ("base64-content", base64_content),
    ("empty-object", empty_object),
    ("dynselect", dynselect_back_mapping),
    ("resource", resource_reference),
    ("loose-top-level", loose_top_level),
];

const PRIMITIVE_KINDS: [&str; 7] = ["string", "number", "integer", "boolean", "array", "object", "null"];

pub struct Lowerer<'a, 's> {
    ctx: &'a GenerationContext<'s>,
    loose_top_level: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// REWRITE RULES
// ————————————————————————————————————————————————————————————————————————————

fn elide_null_default(_: &Lowerer<'_, '_>, node: &mut Map<String, Value>, _: &Site) -> Result<Rewrite> {
    if node.get("default") == Some(&Value::Null) {
        node.remove("default");
    }
    Ok(Rewrite::Continue)
}

fn elide_invalid_enum_default(_: &Lowerer<'_, '_>, node: &mut Map<String, Value>, _: &Site) -> Result<Rewrite> {
    if let (Some(Value::Array(members)), Some(default)) = (node.get("enum"), node.get("default")) {
        if !members.contains(default) {
            node.remove("default");
        }
    }
    Ok(Rewrite::Continue)
}

fn elide_null_string_enum(_: &Lowerer<'_, '_>, node: &mut Map<String, Value>, _: &Site) -> Result<Rewrite> {
    if kind_of(node) == Some("string") && node.get("enum") == Some(&Value::Null) {
        node.remove("enum");
    }
    Ok(Rewrite::Continue)
}

fn base64_content(lowerer: &Lowerer<'_, '_>, node: &mut Map<String, Value>, _: &Site) -> Result<Rewrite> {
    if kind_of(node) != Some("string") || node.get("contentEncoding").and_then(Value::as_str) != Some("base64") {
        return Ok(Rewrite::Continue);
    }
    let ty = transform::declare_base64_content(lowerer.ctx)?;
    Ok(Rewrite::Replace(decorate(node, ty)))
}

/// Objects that declare nothing accept anything. Format-tagged nodes are left
/// to the dynselect and resource rules.
fn empty_object(_: &Lowerer<'_, '_>, node: &mut Map<String, Value>, _: &Site) -> Result<Rewrite> {
    let declares_shape = ["properties", "additionalProperties", "patternProperties", "format", "anyOf", "oneOf", "allOf"]
        .iter()
        .any(|key| match node.get(*key) {
            Some(Value::Object(map)) => !map.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        });
    if kind_of(node) != Some("object") || declares_shape {
        return Ok(Rewrite::Continue);
    }
    Ok(Rewrite::Replace(decorate(node, Ty::Record(Box::new(Ty::Any)))))
}

fn dynselect_back_mapping(_: &Lowerer<'_, '_>, node: &mut Map<String, Value>, site: &Site) -> Result<Rewrite> {
    let is_dynselect = node.get("format").and_then(Value::as_str).is_some_and(|f| f.starts_with(DYNSELECT_PREFIX));
    if !is_dynselect {
        return Ok(Rewrite::Continue);
    }
    node.remove("format");
    match node.get("originalType").and_then(Value::as_str).map(str::to_string) {
        Some(kind) if PRIMITIVE_KINDS.contains(&kind.as_str()) => {
            node.insert("type".to_string(), Value::from(kind));
        }
        other => {
            tracing::debug!(at = %site.pointer, original_type = ?other, "dynamic select without a usable kind");
            node.remove("type");
            node.remove("properties");
        }
    }
    Ok(Rewrite::Continue)
}

fn resource_reference(lowerer: &Lowerer<'_, '_>, node: &mut Map<String, Value>, site: &Site) -> Result<Rewrite> {
    let Some(resource_type) = schema::resource_type_of(node) else {
        return Ok(Rewrite::Continue);
    };
    let ty = if schema::is_storage_object(resource_type) {
        transform::declare_s3_object(lowerer.ctx)?
    } else if !lowerer.ctx.catalog().contains(resource_type) {
        tracing::debug!(at = %site.pointer, resource_type, "unknown resource type, accepting anything");
        Ty::Any
    } else {
        transform::resource_reference(lowerer.ctx, resource_type)?
    };
    Ok(Rewrite::Replace(describe(node, ty)))
}

fn loose_top_level(lowerer: &Lowerer<'_, '_>, node: &mut Map<String, Value>, site: &Site) -> Result<Rewrite> {
    if lowerer.loose_top_level && site.depth == 0 && kind_of(node) == Some("object") {
        node.insert("additionalProperties".to_string(), Value::Bool(true));
    }
    Ok(Rewrite::Continue)
}

// ————————————————————————————————————————————————————————————————————————————
// DEFAULT TRAVERSAL
// ————————————————————————————————————————————————————————————————————————————

impl<'a, 's> Lowerer<'a, 's> {
    pub fn new(ctx: &'a GenerationContext<'s>, loose_top_level: bool) -> Self {
        Self { ctx, loose_top_level }
    }

    pub fn lower(&self, schema: &Value) -> Result<Ty> {
        self.lower_at(schema, &Site::root())
    }

    fn lower_at(&self, schema: &Value, site: &Site) -> Result<Ty> {
        let mut node = match schema {
            Value::Bool(true) => return Ok(Ty::Any),
            Value::Bool(false) => return Ok(Ty::Never),
            Value::Object(node) => node.clone(),
            _ => return Ok(Ty::Any),
        };

        for (name, rule) in RULES {
            if let Rewrite::Replace(ty) = rule(self, &mut node, site)? {
                tracing::trace!(rule = *name, at = %site.pointer, "subtree replaced");
                return Ok(ty);
            }
        }

        let base = self.lower_shape(&node, site)?;
        Ok(decorate(&node, base))
    }

    fn lower_shape(&self, node: &Map<String, Value>, site: &Site) -> Result<Ty> {
        // 1) Literal sets win over everything else
        if let Some(value) = node.get("const") {
            return Ok(literal(value));
        }
        if let Some(Value::Array(members)) = node.get("enum") {
            return Ok(enumeration(members));
        }

        // 2) Combinators
        for key in ["anyOf", "oneOf"] {
            if let Some(arms) = node.get(key) {
                let arms = self.lower_list(arms, &site.child(&[key]))?;
                return Ok(Ty::union(arms));
            }
        }
        if let Some(parts) = node.get("allOf") {
            let mut parts = self.lower_list(parts, &site.child(&["allOf"]))?;
            return Ok(if parts.len() == 1 { parts.remove(0) } else { Ty::Intersection(parts) });
        }

        if node.contains_key("$ref") {
            tracing::debug!(at = %site.pointer, "schema references are not followed");
            return Ok(Ty::Any);
        }

        // 3) Kinds: a single `type`, a `type` array (null → nullable), or inferred.
        // `type: null` reads as absent.
        match node.get("type").filter(|kind| !kind.is_null()) {
            Some(Value::String(kind)) => self.lower_kind(kind, node, site),
            Some(Value::Array(kinds)) => {
                let kinds = kinds.iter().filter_map(Value::as_str).collect::<Vec<_>>();
                let nullable = kinds.contains(&"null");
                let arms = kinds
                    .iter()
                    .filter(|k| **k != "null")
                    .map(|k| self.lower_kind(k, node, site))
                    .collect::<Result<Vec<_>>>()?;
                let core = match arms.len() {
                    0 if nullable => return Ok(Ty::Null),
                    _ => Ty::union(arms),
                };
                Ok(if nullable { Ty::Nullable(Box::new(core)) } else { core })
            }
            Some(other) => Err(site.invalid(format!("`type` must be a string or an array, found {other}"))),
            None if node.contains_key("properties") => self.lower_kind("object", node, site),
            None if node.contains_key("items") => self.lower_kind("array", node, site),
            None => Ok(Ty::Any),
        }
    }

    fn lower_kind(&self, kind: &str, node: &Map<String, Value>, site: &Site) -> Result<Ty> {
        Ok(match kind {
            "string" => Ty::String {
                format: node.get("format").and_then(Value::as_str).and_then(StrFormat::from_tag),
                pattern: node.get("pattern").and_then(Value::as_str).map(str::to_string),
                min_len: node.get("minLength").and_then(Value::as_u64),
                max_len: node.get("maxLength").and_then(Value::as_u64),
            },
            "number" | "integer" => Ty::Number { integer: kind == "integer", bounds: bounds(node) },
            "boolean" => Ty::Bool,
            "null" => Ty::Null,
            "array" => self.lower_array(node, site)?,
            "object" => self.lower_object(node, site)?,
            _ => Ty::Any,
        })
    }

    fn lower_array(&self, node: &Map<String, Value>, site: &Site) -> Result<Ty> {
        let min_items = node.get("minItems").and_then(Value::as_u64);
        let max_items = node.get("maxItems").and_then(Value::as_u64);
        match node.get("items") {
            Some(elems @ Value::Array(_)) => Ok(Ty::Tuple(self.lower_list(elems, &site.child(&["items"]))?)),
            Some(item @ (Value::Object(_) | Value::Bool(_))) => Ok(Ty::Array {
                item: Box::new(self.lower_at(item, &site.child(&["items"]))?),
                min_items,
                max_items,
            }),
            Some(Value::Null) | None => Ok(Ty::Array { item: Box::new(Ty::Any), min_items, max_items }),
            Some(other) => Err(site.invalid(format!("`items` must be a schema or a list of schemas, found {other}"))),
        }
    }

    fn lower_object(&self, node: &Map<String, Value>, site: &Site) -> Result<Ty> {
        let required = node
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect::<IndexSet<_>>())
            .unwrap_or_default();

        let fields = match node.get("properties") {
            Some(Value::Object(properties)) => properties
                .iter()
                .map(|(name, child)| {
                    Ok(Field {
                        name: name.clone(),
                        ty: self.lower_at(child, &site.child(&["properties", name.as_str()]))?,
                        required: required.contains(name.as_str()),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => return Err(site.invalid(format!("`properties` must be an object, found {other}"))),
        };

        let extra = match node.get("additionalProperties") {
            Some(Value::Bool(true)) => Extra::Loose,
            Some(Value::Bool(false)) => Extra::Strict,
            Some(rest @ Value::Object(_)) => {
                Extra::Catchall(Box::new(self.lower_at(rest, &site.child(&["additionalProperties"]))?))
            }
            _ => Extra::Strip,
        };

        Ok(match (fields.is_empty(), extra) {
            (true, Extra::Catchall(value)) => Ty::Record(value),
            (true, Extra::Strip) => Ty::Record(Box::new(Ty::Any)),
            (_, extra) => Ty::Object { fields, extra },
        })
    }

    fn lower_list(&self, list: &Value, site: &Site) -> Result<Vec<Ty>> {
        let Value::Array(items) = list else {
            return Err(site.invalid(format!("expected a list of schemas, found {list}")));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.lower_at(item, &site.child(&[i.to_string().as_str()])))
            .collect()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// The declared kind, or `object` when only properties are given.
fn kind_of(node: &Map<String, Value>) -> Option<&str> {
    match node.get("type").filter(|kind| !kind.is_null()) {
        Some(Value::String(kind)) => Some(kind.as_str()),
        None if node.contains_key("properties") => Some("object"),
        _ => None,
    }
}

fn literal(value: &Value) -> Ty {
    match value {
        Value::Null => Ty::Null,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Ty::Literal(value.clone()),
        Value::Array(_) | Value::Object(_) => Ty::Any,
    }
}

fn enumeration(members: &[Value]) -> Ty {
    if let Some(strings) = members.iter().map(Value::as_str).collect::<Option<IndexSet<_>>>() {
        return match strings.len() {
            0 => Ty::Never,
            1 => Ty::Literal(Value::from(strings[0])),
            _ => Ty::Enum(strings.into_iter().map(str::to_string).collect()),
        };
    }
    Ty::union(members.iter().map(literal).collect())
}

fn bounds(node: &Map<String, Value>) -> NumBounds {
    let number = |key: &str| match node.get(key) {
        Some(Value::Number(n)) => Some(n.clone()),
        _ => None,
    };
    let mut bounds = NumBounds {
        min: number("minimum"),
        max: number("maximum"),
        exclusive_min: number("exclusiveMinimum"),
        exclusive_max: number("exclusiveMaximum"),
        multiple_of: number("multipleOf"),
    };
    // draft-04 spelling: a boolean that turns the inclusive bound exclusive
    if node.get("exclusiveMinimum") == Some(&Value::Bool(true)) {
        bounds.exclusive_min = bounds.min.take();
    }
    if node.get("exclusiveMaximum") == Some(&Value::Bool(true)) {
        bounds.exclusive_max = bounds.max.take();
    }
    bounds
}

fn describe(node: &Map<String, Value>, ty: Ty) -> Ty {
    match node.get("description").and_then(Value::as_str) {
        Some(description) if !description.is_empty() => {
            Ty::Described { inner: Box::new(ty), description: description.to_string() }
        }
        _ => ty,
    }
}

/// Node-level modifiers shared by every kind: nullable, description, default.
fn decorate(node: &Map<String, Value>, ty: Ty) -> Ty {
    let ty = match ty {
        Ty::Null | Ty::Nullable(_) => ty,
        ty if node.get("nullable") == Some(&Value::Bool(true)) => Ty::Nullable(Box::new(ty)),
        ty => ty,
    };
    let ty = describe(node, ty);
    match node.get("default") {
        Some(default) => Ty::Defaulted { inner: Box::new(ty), default: default.clone() },
        None => ty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::catalog::memory::MemoryCatalog;
    use crate::codegen::zod::emit;
    use crate::config::Config;
    use crate::context::RunScope;
    use serde_json::json;
    use std::path::PathBuf;

    /// Lower `schema` against `client`; returns the emitted expression and
    /// everything the run deferred.
    async fn lower_with(client: &MemoryCatalog, loose: bool, schema: Value) -> Result<(String, String)> {
        let config = Config::default();
        let catalog = client.list_resource_types().await?;
        let scope = RunScope::new(client, catalog, &config, PathBuf::from("."));
        let mut out: Vec<u8> = Vec::new();
        let emitted = {
            let ctx = GenerationContext::root(&scope, &mut out);
            ctx.instances().await?;
            let emitted = emit(&Lowerer::new(&ctx, loose).lower(&schema)?);
            ctx.finish().await?;
            emitted
        };
        Ok((emitted, String::from_utf8(out).unwrap()))
    }

    async fn lower(schema: Value) -> String {
        lower_with(&MemoryCatalog::new(), false, schema).await.unwrap().0
    }

    #[tokio::test]
    async fn null_defaults_are_dropped() {
        let out = lower(json!({"type": "object", "properties": {"n": {"type": "integer", "default": null}}, "required": ["n"]})).await;
        assert_eq!(out, r#"z.object({ "n": z.number().int() })"#);
    }

    #[tokio::test]
    async fn defaults_outside_the_enum_are_dropped() {
        let out = lower(json!({"type": "string", "enum": ["a", "b"], "default": "c"})).await;
        assert_eq!(out, r#"z.enum(["a", "b"])"#);

        let out = lower(json!({"type": "string", "enum": ["a", "b"], "default": "b"})).await;
        assert_eq!(out, r#"z.enum(["a", "b"]).prefault("b")"#);
    }

    #[tokio::test]
    async fn null_enum_on_strings_is_ignored() {
        let out = lower(json!({"type": "string", "enum": null, "format": "email"})).await;
        assert_eq!(out, "z.email()");
    }

    #[tokio::test]
    async fn base64_strings_reference_one_shared_validator() {
        let schema = json!({"type": "object", "properties": {
            "a": {"type": "string", "contentEncoding": "base64"},
            "b": {"type": "string", "contentEncoding": "base64", "description": "file"},
        }, "required": ["a", "b"]});
        let (out, deferred) = lower_with(&MemoryCatalog::new(), false, schema).await.unwrap();
        assert_eq!(out, r#"z.object({ "a": base64Content, "b": base64Content.describe("file") })"#);
        assert_eq!(deferred.matches("const base64Content =").count(), 1);
    }

    #[tokio::test]
    async fn empty_objects_accept_anything() {
        assert_eq!(lower(json!({"type": "object"})).await, "z.record(z.string(), z.any())");
        assert_eq!(lower(json!({"type": "object", "properties": {}})).await, "z.record(z.string(), z.any())");
        assert_eq!(
            lower(json!({"type": "object", "additionalProperties": {"type": "number"}})).await,
            "z.record(z.string(), z.number())"
        );
    }

    #[tokio::test]
    async fn dynselect_maps_back_to_its_original_kind() {
        let out = lower(json!({"type": "object", "format": "dynselect-region", "originalType": "string"})).await;
        assert_eq!(out, "z.string()");

        let out = lower(json!({"type": "object", "format": "dynselect-region", "originalType": "mystery"})).await;
        assert_eq!(out, "z.any()");
    }

    #[tokio::test]
    async fn unknown_resource_types_accept_anything() {
        let out = lower(json!({"type": "object", "format": "resource-nope"})).await;
        assert_eq!(out, "z.any()");
    }

    #[tokio::test]
    async fn storage_objects_use_the_shared_validator() {
        let (out, deferred) =
            lower_with(&MemoryCatalog::new(), false, json!({"type": "object", "format": "resource-s3_object"})).await.unwrap();
        assert_eq!(out, "s3Object");
        assert!(deferred.contains(r#"const s3Object = lazyObject(() => z.object({ "s3": z.string(), "storage": z.string().optional(), "filename": z.string().optional() }));"#), "{deferred}");
    }

    #[tokio::test]
    async fn known_resource_types_reference_their_union() {
        let client = MemoryCatalog::new()
            .with_resource_type("db", Some(json!({"type": "object", "properties": {"host": {"type": "string"}}, "required": ["host"]})))
            .with_resource("db", "f/a/db1");
        let (out, deferred) =
            lower_with(&client, false, json!({"type": "object", "format": "resource-db", "description": "conn"})).await.unwrap();
        assert_eq!(out, r#"db_resource.describe("conn")"#);
        assert!(deferred.contains(r#"const db_type = lazyObject(() => z.object({ "host": z.string() }));"#), "{deferred}");
        assert!(deferred.contains("const db_resource = lazyObject(() => z.union([db_references, db_type]));"), "{deferred}");
    }

    #[tokio::test]
    async fn loose_top_level_only_touches_the_outermost_object() {
        let schema = json!({"type": "object", "properties": {
            "inner": {"type": "object", "properties": {"x": {"type": "string"}}, "required": ["x"]},
        }, "required": ["inner"]});
        let (out, _) = lower_with(&MemoryCatalog::new(), true, schema).await.unwrap();
        assert_eq!(out, r#"z.looseObject({ "inner": z.object({ "x": z.string() }) })"#);
    }

    #[tokio::test]
    async fn type_arrays_become_nullable() {
        assert_eq!(lower(json!({"type": ["string", "null"]})).await, "z.string().nullable()");
        assert_eq!(lower(json!({"type": ["string", "integer"]})).await, "z.union([z.string(), z.number().int()])");
        assert_eq!(lower(json!({"type": "number", "nullable": true})).await, "z.number().nullable()");
    }

    #[tokio::test]
    async fn enums_and_consts() {
        assert_eq!(lower(json!({"enum": ["a", "a"]})).await, r#"z.literal("a")"#);
        assert_eq!(lower(json!({"enum": [1, "a"]})).await, r#"z.union([z.literal(1), z.literal("a")])"#);
        assert_eq!(lower(json!({"enum": []})).await, "z.never()");
        assert_eq!(lower(json!({"const": true})).await, "z.literal(true)");
    }

    #[tokio::test]
    async fn combinators() {
        let out = lower(json!({"anyOf": [{"type": "string"}, {"type": "boolean"}]})).await;
        assert_eq!(out, "z.union([z.string(), z.boolean()])");
        let out = lower(json!({"allOf": [{"type": "string"}, {"minLength": 2, "type": "string"}]})).await;
        assert_eq!(out, "z.intersection(z.string(), z.string().min(2))");
    }

    #[tokio::test]
    async fn numeric_bounds_in_both_spellings() {
        assert_eq!(lower(json!({"type": "integer", "minimum": 1, "exclusiveMaximum": 10})).await, "z.number().int().gte(1).lt(10)");
        assert_eq!(lower(json!({"type": "number", "minimum": 0, "exclusiveMinimum": true})).await, "z.number().gt(0)");
    }

    #[tokio::test]
    async fn arrays_and_tuples() {
        assert_eq!(lower(json!({"type": "array", "items": {"type": "string"}, "minItems": 1})).await, "z.array(z.string()).min(1)");
        assert_eq!(lower(json!({"type": "array", "items": [{"type": "string"}, {"type": "number"}]})).await, "z.tuple([z.string(), z.number()])");
        assert_eq!(lower(json!({"type": "array"})).await, "z.array(z.any())");
    }

    #[tokio::test]
    async fn siblings_do_not_observe_each_others_rewrites() {
        let shared = json!({"type": "string", "default": null});
        let schema = json!({"type": "object", "properties": {"a": shared.clone(), "b": shared}, "required": ["a"]});
        let out = lower(schema).await;
        assert_eq!(out, r#"z.object({ "a": z.string(), "b": z.string().optional() })"#);
    }

    #[tokio::test]
    async fn null_type_is_inferred_like_a_missing_one() {
        assert_eq!(lower(json!({"type": null})).await, "z.any()");
        let out = lower(json!({"type": null, "properties": {"x": {"type": null}}, "required": ["x"]})).await;
        assert_eq!(out, r#"z.object({ "x": z.any() })"#);
        let out = lower(json!({"type": null, "items": {"type": "string"}})).await;
        assert_eq!(out, "z.array(z.string())");
    }

    #[tokio::test]
    async fn non_string_type_is_still_rejected() {
        let err = lower_with(&MemoryCatalog::new(), false, json!({"type": 3})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { ref location, .. } if location == "#"), "{err}");
    }

    #[tokio::test]
    async fn malformed_properties_name_their_location() {
        let schema = json!({"type": "object", "properties": {"inner": {"type": "object", "properties": [1]}}});
        let err = lower_with(&MemoryCatalog::new(), false, schema).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { ref location, .. } if location == "#/properties/inner"), "{err}");
    }
}
