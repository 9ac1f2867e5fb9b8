//! JSON schema builders for MCP tools.

use schemars::JsonSchema;
use serde_json::{Map, Value};

/// Derive an input schema from a request type.
///
/// The `$schema` and `title` keys are dropped; hosts only need the object shape.
pub(crate) fn input_schema<T: JsonSchema>() -> Map<String, Value> {
    let root = schemars::schema_for!(T);
    match serde_json::to_value(root) {
        Ok(Value::Object(mut schema)) => {
            schema.remove("$schema");
            schema.remove("title");
            schema
        }
        Ok(_) | Err(_) => {
            tracing::warn!("Falling back to an empty input schema");
            empty_object_schema()
        }
    }
}

/// Schema representing an empty object (used for parameterless tools).
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(Map::new()));
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}
