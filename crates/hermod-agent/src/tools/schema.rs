//! Argument validation against the JSON-Schema subset tools declare.
//!
//! Supported: object at the top level; leaf types string, integer, number,
//! boolean, array, object; `enum`; numeric `minimum`/`maximum`; string
//! `minLength`/`maxLength`; `required`; recursion into object `properties`
//! and array `items`. Extra keys are accepted.
//!
//! Error paths use dotted notation for nested fields and `[i]` for array
//! indices; the top-level value is labeled `parameter`.

use serde_json::Value;
use std::collections::HashMap;

/// Validate `args` against a tool's parameter schema. An empty vec means
/// the arguments passed.
pub fn validate_args(args: &HashMap<String, Value>, schema: &Value) -> Vec<String> {
    let declared_type = schema.get("type").and_then(|t| t.as_str()).unwrap_or("object");
    if declared_type != "object" {
        return vec![format!("schema must be object type, got '{declared_type}'")];
    }

    let value = Value::Object(args.clone().into_iter().collect());
    validate(&value, schema, "")
}

fn validate(value: &Value, schema: &Value, path: &str) -> Vec<String> {
    let label = if path.is_empty() { "parameter" } else { path };

    if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
        if !type_matches(value, expected) {
            return vec![format!("{label} should be {expected}")];
        }
    }

    let mut errors = Vec::new();

    if let Some(allowed) = schema.get("enum").and_then(|e| e.as_array()) {
        if !allowed.contains(value) {
            errors.push(format!(
                "{label} must be one of {}",
                Value::Array(allowed.clone())
            ));
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(|m| m.as_f64()) {
            if n < min {
                errors.push(format!("{label} must be >= {min}"));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(|m| m.as_f64()) {
            if n > max {
                errors.push(format!("{label} must be <= {max}"));
            }
        }
    }

    if let Some(s) = value.as_str() {
        let len = s.chars().count();
        if let Some(min) = schema.get("minLength").and_then(|m| m.as_u64()) {
            if (len as u64) < min {
                errors.push(format!("{label} must be at least {min} chars"));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(|m| m.as_u64()) {
            if (len as u64) > max {
                errors.push(format!("{label} must be at most {max} chars"));
            }
        }
    }

    if let Some(obj) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for key in required.iter().filter_map(|k| k.as_str()) {
                if !obj.contains_key(key) {
                    errors.push(format!("missing required {}", join_path(path, key)));
                }
            }
        }
        if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
            for (key, val) in obj {
                if let Some(prop_schema) = props.get(key) {
                    errors.extend(validate(val, prop_schema, &join_path(path, key)));
                }
            }
        }
    }

    if let Some(items) = value.as_array() {
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                let item_path = if path.is_empty() {
                    format!("[{i}]")
                } else {
                    format!("{path}[{i}]")
                };
                errors.extend(validate(item, item_schema, &item_path));
            }
        }
    }

    errors
}

fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(pairs: Value) -> HashMap<String, Value> {
        pairs.as_object().unwrap().clone().into_iter().collect()
    }

    #[test]
    fn empty_schema_accepts_anything() {
        let schema = json!({"type": "object", "properties": {}});
        assert!(validate_args(&args(json!({"extra": 1})), &schema).is_empty());
    }

    #[test]
    fn non_object_schema_is_rejected() {
        let schema = json!({"type": "string"});
        let errors = validate_args(&HashMap::new(), &schema);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("object"));
    }

    #[test]
    fn missing_required_key() {
        let schema = json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        });
        let errors = validate_args(&HashMap::new(), &schema);
        assert_eq!(errors, vec!["missing required path"]);
    }

    #[test]
    fn type_mismatch_reports_field_path() {
        let schema = json!({
            "type": "object",
            "properties": {"count": {"type": "integer"}}
        });
        let errors = validate_args(&args(json!({"count": "three"})), &schema);
        assert_eq!(errors, vec!["count should be integer"]);
    }

    #[test]
    fn integer_rejects_float_but_number_accepts_it() {
        let int_schema = json!({"type": "object", "properties": {"n": {"type": "integer"}}});
        assert!(!validate_args(&args(json!({"n": 1.5})), &int_schema).is_empty());

        let num_schema = json!({"type": "object", "properties": {"n": {"type": "number"}}});
        assert!(validate_args(&args(json!({"n": 1.5})), &num_schema).is_empty());
        assert!(validate_args(&args(json!({"n": 2})), &num_schema).is_empty());
    }

    #[test]
    fn enum_violation() {
        let schema = json!({
            "type": "object",
            "properties": {"mode": {"type": "string", "enum": ["fast", "slow"]}}
        });
        let errors = validate_args(&args(json!({"mode": "medium"})), &schema);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("mode must be one of"));
        assert!(errors[0].contains("fast"));
    }

    #[test]
    fn numeric_bounds() {
        let schema = json!({
            "type": "object",
            "properties": {"count": {"type": "integer", "minimum": 1, "maximum": 10}}
        });
        assert_eq!(
            validate_args(&args(json!({"count": 0})), &schema),
            vec!["count must be >= 1"]
        );
        assert_eq!(
            validate_args(&args(json!({"count": 11})), &schema),
            vec!["count must be <= 10"]
        );
        assert!(validate_args(&args(json!({"count": 5})), &schema).is_empty());
    }

    #[test]
    fn string_length_bounds() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string", "minLength": 2, "maxLength": 4}}
        });
        assert_eq!(
            validate_args(&args(json!({"name": "a"})), &schema),
            vec!["name must be at least 2 chars"]
        );
        assert_eq!(
            validate_args(&args(json!({"name": "abcde"})), &schema),
            vec!["name must be at most 4 chars"]
        );
    }

    #[test]
    fn nested_object_paths_are_dotted() {
        let schema = json!({
            "type": "object",
            "properties": {
                "options": {
                    "type": "object",
                    "properties": {"depth": {"type": "integer"}},
                    "required": ["depth"]
                }
            }
        });
        let errors = validate_args(&args(json!({"options": {}})), &schema);
        assert_eq!(errors, vec!["missing required options.depth"]);

        let errors = validate_args(&args(json!({"options": {"depth": "deep"}})), &schema);
        assert_eq!(errors, vec!["options.depth should be integer"]);
    }

    #[test]
    fn array_items_use_index_paths() {
        let schema = json!({
            "type": "object",
            "properties": {
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        });
        let errors = validate_args(&args(json!({"tags": ["ok", 7, "fine", false]})), &schema);
        assert_eq!(
            errors,
            vec!["tags[1] should be string", "tags[3] should be string"]
        );
    }

    #[test]
    fn array_of_objects_recurses() {
        let schema = json!({
            "type": "object",
            "properties": {
                "entries": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"id": {"type": "integer"}},
                        "required": ["id"]
                    }
                }
            }
        });
        let errors = validate_args(&args(json!({"entries": [{"id": 1}, {}]})), &schema);
        assert_eq!(errors, vec!["missing required entries[1].id"]);
    }

    #[test]
    fn extra_keys_are_accepted() {
        let schema = json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        });
        let errors = validate_args(&args(json!({"path": "x", "unknown": 42})), &schema);
        assert!(errors.is_empty());
    }

    #[test]
    fn multiple_errors_accumulate() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "string"},
                "b": {"type": "integer"}
            },
            "required": ["a", "b", "c"]
        });
        let errors = validate_args(&args(json!({"a": 1, "b": "x"})), &schema);
        assert_eq!(errors.len(), 3);
    }
}
