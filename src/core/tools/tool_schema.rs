// =============================================================================
// TOOL INPUT SCHEMAS
// =============================================================================
//
// Every tool's input type derives `JsonSchema`. The generated schema is
// published to the agent in `tools/list` and is also what untrusted arguments
// are checked against here, before anything else runs, so the schema the
// agent sees and the checks we apply can never drift apart.

use std::borrow::Cow;
use std::sync::Arc;

use schemars::generate::SchemaSettings;
use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::Serialize;
use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

/// Name, description and input schema of one tool, as published to the agent.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Arc<JsonObject>,
}

/// Generate the published schema for a tool input type.
///
/// Subschemas are inlined so clients never have to resolve `$ref`s.
pub fn input_schema_for<T: JsonSchema>() -> JsonObject {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
    });
    let schema = settings.into_generator().into_root_schema_for::<T>();

    let mut object = match serde_json::to_value(&schema) {
        Ok(Value::Object(object)) => object,
        _ => JsonObject::new(),
    };
    object.remove("$schema");
    object.remove("title");
    object
        .entry("type")
        .or_insert_with(|| Value::String("object".to_string()));
    object
}

/// Any JSON scalar (string, number, boolean or null). Used for cell values
/// through `#[schemars(with = "...")]`.
pub struct Scalar;

impl JsonSchema for Scalar {
    fn schema_name() -> Cow<'static, str> {
        "Scalar".into()
    }

    fn inline_schema() -> bool {
        true
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        json_schema!({ "type": ["string", "number", "boolean", "null"] })
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// The first place where arguments disagree with a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Dotted path to the offending field, e.g. `files[1].type`.
    pub field: String,
    pub reason: String,
}

impl SchemaViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Check raw arguments against a tool's input schema.
///
/// Missing arguments (`null`) become an empty object so tools whose
/// parameters are all optional can be called without any. Whole numbers
/// written with a fraction (`10.0`) are rewritten as integers where the
/// schema asks for one, so the typed input deserializes.
pub fn validate_arguments(schema: &JsonObject, arguments: &mut Value) -> Result<(), SchemaViolation> {
    if arguments.is_null() {
        *arguments = Value::Object(Map::new());
    }
    if !arguments.is_object() {
        return Err(SchemaViolation::new(
            "arguments",
            "expected an object of named arguments",
        ));
    }

    validate_node(schema, arguments, "")
}

fn field_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn validate_value(schema: &Value, value: &mut Value, path: &str) -> Result<(), SchemaViolation> {
    match schema {
        Value::Object(schema) => validate_node(schema, value, path),
        Value::Bool(false) => Err(SchemaViolation::new(path, "is not allowed")),
        _ => Ok(()),
    }
}

fn validate_node(schema: &JsonObject, value: &mut Value, path: &str) -> Result<(), SchemaViolation> {
    for keyword in ["anyOf", "oneOf"] {
        if let Some(Value::Array(branches)) = schema.get(keyword) {
            return validate_alternatives(branches, value, path);
        }
    }

    if let Some(expected) = schema.get("const") {
        if *value != *expected {
            return Err(SchemaViolation::new(path, format!("must be {}", expected)));
        }
    }

    if let Some(Value::Array(allowed)) = schema.get("enum") {
        if !allowed.contains(value) {
            let names: Vec<String> = allowed
                .iter()
                .filter(|v| !v.is_null())
                .map(display_literal)
                .collect();
            return Err(SchemaViolation::new(
                path,
                format!("must be one of {}, got {}", names.join(", "), quoted(value)),
            ));
        }
    }

    if let Some(types) = schema.get("type") {
        check_type(types, value, path)?;
    }

    if value.is_number() {
        return check_number(schema, value, path);
    }
    match value {
        Value::String(text) => check_string(schema, text, path),
        Value::Array(items) => check_array(schema, items, path),
        Value::Object(object) => check_object(schema, object, path),
        _ => Ok(()),
    }
}

/// Accept the first branch that validates. Nullable fields come out of
/// schemars as `anyOf: [T, null]`, so null is tried against each branch too.
fn validate_alternatives(branches: &[Value], value: &mut Value, path: &str) -> Result<(), SchemaViolation> {
    let mut first_error = None;
    for branch in branches {
        let mut candidate = value.clone();
        match validate_value(branch, &mut candidate, path) {
            Ok(()) => {
                *value = candidate;
                return Ok(());
            }
            Err(err) => {
                // Report the non-null branch; "expected null" is never useful.
                let is_null_branch = branch.get("type") == Some(&Value::String("null".into()));
                if first_error.is_none() && !is_null_branch {
                    first_error = Some(err);
                }
            }
        }
    }
    Err(first_error.unwrap_or_else(|| SchemaViolation::new(path, "matches no allowed shape")))
}

fn check_type(types: &Value, value: &mut Value, path: &str) -> Result<(), SchemaViolation> {
    let names: Vec<&str> = match types {
        Value::String(name) => vec![name.as_str()],
        Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
        _ => return Ok(()),
    };

    if names.iter().any(|name| matches_type(name, value)) {
        return Ok(());
    }

    if names.contains(&"integer") {
        if let Some(whole) = whole_number(value) {
            *value = Value::from(whole);
            return Ok(());
        }
    }

    Err(SchemaViolation::new(
        path,
        format!("expected {}, got {}", describe_types(&names), json_kind(value)),
    ))
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

/// A float with no fractional part that fits in an `i64`.
fn whole_number(value: &Value) -> Option<i64> {
    let number = value.as_f64()?;
    let in_range = number >= i64::MIN as f64 && number < i64::MAX as f64;
    if number.fract() == 0.0 && in_range {
        Some(number as i64)
    } else {
        None
    }
}

fn describe_types(names: &[&str]) -> String {
    let described: Vec<&str> = names
        .iter()
        .map(|name| match *name {
            "string" => "a string",
            "integer" => "an integer",
            "number" => "a number",
            "boolean" => "a boolean",
            "array" => "an array",
            "object" => "an object",
            "null" => "null",
            _ => "a value",
        })
        .collect();

    match described.as_slice() {
        [] => "a value".to_string(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} or {}", init.join(", "), last),
    }
}

fn check_string(schema: &JsonObject, text: &str, path: &str) -> Result<(), SchemaViolation> {
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
        if (text.chars().count() as u64) < min {
            let reason = if min == 1 {
                "must not be empty".to_string()
            } else {
                format!("must be at least {} characters", min)
            };
            return Err(SchemaViolation::new(path, reason));
        }
    }
    Ok(())
}

fn check_number(schema: &JsonObject, value: &Value, path: &str) -> Result<(), SchemaViolation> {
    let Some(number) = value.as_f64() else {
        return Ok(());
    };
    if let Some(min) = schema.get("minimum") {
        if min.as_f64().is_some_and(|min| number < min) {
            return Err(SchemaViolation::new(path, format!("must be at least {}", min)));
        }
    }
    if let Some(max) = schema.get("maximum") {
        if max.as_f64().is_some_and(|max| number > max) {
            return Err(SchemaViolation::new(path, format!("must be at most {}", max)));
        }
    }
    Ok(())
}

fn check_array(schema: &JsonObject, items: &mut [Value], path: &str) -> Result<(), SchemaViolation> {
    if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
        if (items.len() as u64) < min {
            return Err(SchemaViolation::new(
                path,
                format!("must contain at least {} item(s)", min),
            ));
        }
    }
    if let Some(item_schema) = schema.get("items") {
        for (i, item) in items.iter_mut().enumerate() {
            validate_value(item_schema, item, &format!("{}[{}]", path, i))?;
        }
    }
    Ok(())
}

fn check_object(schema: &JsonObject, object: &mut JsonObject, path: &str) -> Result<(), SchemaViolation> {
    if let Some(Value::Array(required)) = schema.get("required") {
        for name in required.iter().filter_map(Value::as_str) {
            if object.get(name).map_or(true, Value::is_null) {
                return Err(SchemaViolation::new(field_path(path, name), "is required"));
            }
        }
    }

    if let Some(Value::Object(properties)) = schema.get("properties") {
        for (name, property) in properties {
            match object.get_mut(name) {
                // Optional fields may be omitted or explicitly null.
                None | Some(Value::Null) => continue,
                Some(value) => validate_value(property, value, &field_path(path, name))?,
            }
        }
    }

    // Unknown fields are ignored, the same way the agent-facing schema allows them.
    Ok(())
}

fn display_literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn quoted(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{}'", text),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
