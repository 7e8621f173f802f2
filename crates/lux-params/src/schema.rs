// SPDX-License-Identifier: Apache-2.0
//! Structural schema descriptions for parameter objects.
//!
//! Clients fetch these to discover endpoint shapes. The description is
//! derived from the object's default instance: good enough for tooling,
//! with no extra derive machinery.

use serde_json::{json, Map, Value};

use crate::ParamObject;

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut props = Map::new();
            for (name, field) in fields {
                props.insert(name.clone(), describe(field));
            }
            json!({"type": "object", "properties": Value::Object(props)})
        }
        Value::Array(items) => match items.first() {
            Some(first) => json!({"type": "array", "items": describe(first)}),
            None => json!({"type": "array"}),
        },
        other => json!({"type": type_name(other)}),
    }
}

fn title_case(endpoint: &str) -> String {
    endpoint
        .split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Build the structural schema for a parameter object type.
pub fn schema_for<T: ParamObject>() -> Value {
    let sample = serde_json::to_value(T::default()).unwrap_or(Value::Null);
    schema_for_value(T::endpoint(), &sample)
}

/// Build a structural schema from a sample value, for endpoints whose state
/// is not a [`ParamObject`] (transfer function, scene, model properties).
pub fn schema_for_value(endpoint: &str, sample: &Value) -> Value {
    let mut schema = describe(sample);
    if let Value::Object(map) = &mut schema {
        map.insert("title".to_owned(), json!(title_case(endpoint)));
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CameraParams;

    #[test]
    fn schema_lists_object_fields() {
        let schema = schema_for::<CameraParams>();
        assert_eq!(schema["title"], "Camera");
        assert_eq!(schema["type"], "object");
        let props = schema["properties"].as_object().expect("properties");
        assert!(props.contains_key("current"));
        assert!(props.contains_key("position"));
        assert_eq!(props["types"]["type"], "array");
    }

    #[test]
    fn title_case_handles_hyphenated_endpoints() {
        assert_eq!(title_case("animation-parameters"), "AnimationParameters");
        assert_eq!(title_case("camera"), "Camera");
    }
}
