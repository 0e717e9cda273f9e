//! Windmill-specific vocabulary on top of JSON Schema.
use indexmap::IndexSet;
use serde_json::{Map, Value};

/// `format: resource-<T>` marks an argument that takes a resource of type `T`.
pub const RESOURCE_TYPE_PREFIX: &str = "resource-";

/// `format: dynselect-<name>` marks a dynamically populated select input.
pub const DYNSELECT_PREFIX: &str = "dynselect-";

/// Keywords whose value is a single subschema.
const SCHEMA_KEYWORDS: [&str; 4] = ["items", "additionalProperties", "not", "contains"];

/// Keywords whose value is a list of subschemas.
const SCHEMA_LIST_KEYWORDS: [&str; 4] = ["anyOf", "oneOf", "allOf", "items"];

/// Keywords whose value maps names to subschemas.
const SCHEMA_MAP_KEYWORDS: [&str; 4] = ["properties", "patternProperties", "definitions", "$defs"];

/// The resource type named by an object node's `format`, if any.
pub fn resource_type_of(node: &Map<String, Value>) -> Option<&str> {
    if node.get("type").and_then(Value::as_str) != Some("object") {
        return None;
    }
    node.get("format")?.as_str()?.strip_prefix(RESOURCE_TYPE_PREFIX)
}

/// Storage-object arguments (`resource-s3object`, `resource-s3_object`, ...)
/// are file handles rather than catalog resources.
pub fn is_storage_object(resource_type: &str) -> bool {
    resource_type.to_lowercase().replace('_', "") == "s3object"
}

/// Every resource type referenced anywhere in `schema`, in first-seen order.
pub fn collect_resource_types(schema: &Value) -> IndexSet<String> {
    let mut found = IndexSet::new();
    walk(schema, &mut |node| {
        if let Some(name) = resource_type_of(node) {
            found.insert(name.to_string());
        }
    });
    found
}

/// Pre-order traversal over every object node reachable through subschema keywords.
pub fn walk(schema: &Value, visit: &mut dyn FnMut(&Map<String, Value>)) {
    let Value::Object(node) = schema else { return };
    visit(node);

    for key in SCHEMA_KEYWORDS {
        if let Some(child @ Value::Object(_)) = node.get(key) {
            walk(child, visit);
        }
    }
    for key in SCHEMA_LIST_KEYWORDS {
        if let Some(Value::Array(children)) = node.get(key) {
            for child in children {
                walk(child, visit);
            }
        }
    }
    for key in SCHEMA_MAP_KEYWORDS {
        if let Some(Value::Object(children)) = node.get(key) {
            for child in children.values() {
                walk(child, visit);
            }
        }
    }
}
