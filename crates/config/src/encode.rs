//! JSON encoding of issuer and loader values
//!
//! Encoding never fails the compilation: problems are recorded as warnings
//! and a best-effort value is returned.

use autotls_common::{Warning, Warnings};
use serde::Serialize;
use serde_json::{Map, Value};

/// Discriminator key naming an issuer module in the output
pub const MODULE_KEY: &str = "module";

/// Discriminator key naming a DNS provider module in the output
pub const PROVIDER_KEY: &str = "name";

/// Serialize `value` to JSON, recording a warning on failure
pub fn to_json<T: Serialize + ?Sized>(value: &T, warnings: &mut Warnings) -> Value {
    match serde_json::to_value(value) {
        Ok(json) => json,
        Err(e) => {
            warnings.push(Warning::new(format!("unable to encode value: {}", e)));
            Value::Null
        }
    }
}

/// Serialize `value` to a JSON object and insert `key: name` into it
///
/// A value that does not encode to an object produces a warning and is
/// replaced by an object holding only the discriminator.
pub fn module_object<T: Serialize + ?Sized>(
    value: &T,
    key: &str,
    name: &str,
    warnings: &mut Warnings,
) -> Value {
    let mut object = match to_json(value, warnings) {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            warnings.push(Warning::new(format!(
                "module '{}' did not encode to a JSON object (got {}); its settings are dropped",
                name,
                json_kind(&other)
            )));
            Map::new()
        }
    };
    object.insert(key.to_string(), Value::String(name.to_string()));
    Value::Object(object)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
