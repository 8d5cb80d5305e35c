//! Parameter extraction from free text.
//!
//! Two flavors: schema-driven extraction (explicit `name: value` forms,
//! enums, schema regex patterns, quoted strings) used by the heuristic
//! matchers, and hint-driven extraction used by learned patterns (the
//! learner records how each parameter was historically pulled out of the
//! intent text).

use crate::stub::{resource_from_path, CREATE_VERBS, DELETE_VERBS, READ_VERBS, UPDATE_VERBS};
use regex::Regex;
use std::collections::BTreeMap;

pub use sockagent_core::{HINT_AFTER_ACTION, HINT_AFTER_COLON, HINT_FROM_INTENT};

/// Extract arguments for an input schema from free text.
pub fn extract_for_schema(
    text: &str,
    input_schema: Option<&serde_json::Value>,
) -> BTreeMap<String, serde_json::Value> {
    let mut args = BTreeMap::new();
    let Some(schema) = input_schema else {
        return args;
    };
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return args;
    };
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    for (name, prop_schema) in properties {
        if let Some(value) = extract_single(text, name, prop_schema) {
            args.insert(name.clone(), value);
        } else if required.contains(&name.as_str())
            && prop_schema.get("type").and_then(|t| t.as_str()) == Some("string")
        {
            if let Some(value) = extract_string_value(text, name) {
                args.insert(name.clone(), serde_json::Value::String(value));
            }
        }
    }

    args
}

/// Extract a single named parameter from text.
pub fn extract_single(
    text: &str,
    name: &str,
    schema: &serde_json::Value,
) -> Option<serde_json::Value> {
    let param_type = schema.get("type").and_then(|t| t.as_str()).unwrap_or("string");

    // Explicit mentions: `name: value`, `name = value`, `name is value`,
    // `with name value`.
    let escaped = regex::escape(name);
    for pattern in [
        format!(r#"{escaped}[:\s=]+["']*([^"',\s]+)"#),
        format!(r#"{escaped}\s+is\s+["']*([^"',\s]+)"#),
        format!(r#"with\s+{escaped}\s+["']*([^"',\s]+)"#),
    ] {
        if let Ok(re) = Regex::new(&format!("(?i){pattern}")) {
            if let Some(captures) = re.captures(text) {
                if let Some(value) = convert_value(&captures[1], param_type) {
                    return Some(value);
                }
            }
        }
    }

    // Enum containment.
    if let Some(values) = schema.get("enum").and_then(|e| e.as_array()) {
        let lower = text.to_lowercase();
        for value in values {
            let needle = match value {
                serde_json::Value::String(s) => s.to_lowercase(),
                other => other.to_string(),
            };
            if lower.contains(&needle) {
                return Some(value.clone());
            }
        }
    }

    // Schema-declared regex pattern.
    if let Some(pattern) = schema.get("pattern").and_then(|p| p.as_str()) {
        if let Ok(re) = Regex::new(pattern) {
            if let Some(m) = re.find(text) {
                return convert_value(m.as_str(), param_type);
            }
        }
    }

    None
}

/// Last-resort extraction for required string parameters.
fn extract_string_value(text: &str, name: &str) -> Option<String> {
    // Quoted strings win.
    if let Ok(re) = Regex::new(r#"["'](.*?)["']"#) {
        if let Some(captures) = re.captures(text) {
            return Some(captures[1].to_string());
        }
    }

    if matches!(name, "name" | "username" | "title" | "label") {
        for pattern in [
            r"(?i)(?:called|named|titled)\s+(\w+)",
            r"(?i)(?:new|create|add)\s+\w+\s+(\w+)",
        ] {
            if let Ok(re) = Regex::new(pattern) {
                if let Some(captures) = re.captures(text) {
                    return Some(captures[1].to_string());
                }
            }
        }
    }

    None
}

/// Convert a raw string to the schema-declared type.
pub fn convert_value(raw: &str, param_type: &str) -> Option<serde_json::Value> {
    match param_type {
        "integer" => raw.parse::<i64>().ok().map(serde_json::Value::from),
        "number" => raw.parse::<f64>().ok().map(|n| serde_json::json!(n)),
        "boolean" => Some(serde_json::Value::Bool(matches!(
            raw.to_lowercase().as_str(),
            "true" | "yes" | "1" | "on"
        ))),
        _ => Some(serde_json::Value::String(raw.to_string())),
    }
}

/// Extract arguments for a learned pattern using its recorded hints.
///
/// Parameters whose hint doesn't produce a value fall back to the
/// schema-driven forms.
pub fn extract_with_hints(
    text: &str,
    path: &str,
    hints: &BTreeMap<String, String>,
    input_schema: Option<&serde_json::Value>,
) -> BTreeMap<String, serde_json::Value> {
    let mut args = BTreeMap::new();

    for (name, hint) in hints {
        let value = match hint.as_str() {
            HINT_AFTER_COLON => after_colon(text),
            HINT_AFTER_ACTION => after_action_words(text, path),
            _ => None,
        };
        if let Some(value) = value {
            args.insert(name.clone(), serde_json::Value::String(value));
        }
    }

    // Fill anything the hints missed from the schema forms.
    for (name, value) in extract_for_schema(text, input_schema) {
        args.entry(name).or_insert(value);
    }

    args
}

fn after_colon(text: &str) -> Option<String> {
    let (_, rest) = text.split_once(':')?;
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Strip leading action verbs, articles, and the resource noun; the
/// remainder is the value.
fn after_action_words(text: &str, path: &str) -> Option<String> {
    if let Some(value) = after_colon(text) {
        return Some(value);
    }

    let resource = resource_from_path(path);
    let is_skippable = |word: &str| -> bool {
        if matches!(word, "a" | "an" | "the" | "my" | "this") {
            return true;
        }
        if [CREATE_VERBS, READ_VERBS, UPDATE_VERBS, DELETE_VERBS]
            .iter()
            .any(|family| family.contains(&word))
        {
            return true;
        }
        match &resource {
            Some(r) => word == r || word.strip_suffix('s') == Some(r),
            None => false,
        }
    };

    let mut tokens = text.split_whitespace().peekable();
    while let Some(&token) = tokens.peek() {
        let bare = token.trim_matches(|c: char| !c.is_alphanumeric());
        if bare.is_empty() || is_skippable(&bare.to_lowercase()) {
            tokens.next();
        } else {
            break;
        }
    }

    let rest: Vec<&str> = tokens.collect();
    (!rest.is_empty()).then(|| rest.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_value_forms() {
        let schema = serde_json::json!({"type": "string"});
        assert_eq!(
            extract_single("set name: alice please", "name", &schema),
            Some(serde_json::json!("alice"))
        );
        assert_eq!(
            extract_single("the id is 42", "id", &serde_json::json!({"type": "integer"})),
            Some(serde_json::json!(42))
        );
        assert_eq!(
            extract_single("order with quantity 3", "quantity", &serde_json::json!({"type": "integer"})),
            Some(serde_json::json!(3))
        );
    }

    #[test]
    fn enum_containment() {
        let schema = serde_json::json!({"type": "string", "enum": ["high", "low"]});
        assert_eq!(
            extract_single("set it to HIGH priority", "priority", &schema),
            Some(serde_json::json!("high"))
        );
        assert_eq!(extract_single("set it to medium", "priority", &schema), None);
    }

    #[test]
    fn schema_pattern_extraction() {
        let schema = serde_json::json!({"type": "string", "pattern": r"[A-Z]{2}\d{4}"});
        assert_eq!(
            extract_single("ship order AB1234 now", "code", &schema),
            Some(serde_json::json!("AB1234"))
        );
    }

    #[test]
    fn required_string_falls_back_to_quotes() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        });
        let args = extract_for_schema("add a note 'call the dentist'", Some(&schema));
        assert_eq!(args.get("text"), Some(&serde_json::json!("call the dentist")));
    }

    #[test]
    fn type_coercion() {
        assert_eq!(convert_value("42", "integer"), Some(serde_json::json!(42)));
        assert_eq!(convert_value("nope", "integer"), None);
        assert_eq!(convert_value("2.5", "number"), Some(serde_json::json!(2.5)));
        assert_eq!(convert_value("yes", "boolean"), Some(serde_json::json!(true)));
        assert_eq!(convert_value("off", "boolean"), Some(serde_json::json!(false)));
    }

    #[test]
    fn hint_after_colon() {
        let hints = BTreeMap::from([("text".to_string(), HINT_AFTER_COLON.to_string())]);
        let args = extract_with_hints("create a todo: buy milk", "/todo", &hints, None);
        assert_eq!(args.get("text"), Some(&serde_json::json!("buy milk")));
    }

    #[test]
    fn hint_after_action_words() {
        let hints = BTreeMap::from([("text".to_string(), HINT_AFTER_ACTION.to_string())]);
        let args = extract_with_hints("add a todo buy milk", "/todo", &hints, None);
        assert_eq!(args.get("text"), Some(&serde_json::json!("buy milk")));

        // Colon form takes precedence when present.
        let args = extract_with_hints("create todo: walk the dog", "/todo", &hints, None);
        assert_eq!(args.get("text"), Some(&serde_json::json!("walk the dog")));
    }

    #[test]
    fn unproductive_hint_falls_back_to_schema() {
        let hints = BTreeMap::from([("id".to_string(), HINT_FROM_INTENT.to_string())]);
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}}
        });
        let args = extract_with_hints("delete todo id: 7", "/todo/{id}", &hints, Some(&schema));
        assert_eq!(args.get("id"), Some(&serde_json::json!(7)));
    }
}
