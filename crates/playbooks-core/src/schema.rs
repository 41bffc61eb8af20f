//! Shape checks for the free-form JSON attached to skills, MCP servers and
//! memories. These are structural checks only; no full JSON-Schema
//! evaluation is performed.

use crate::error::{PlaybookError, Result};
use serde_json::{Map, Value};

pub const MAX_MEMORY_KEY_LEN: usize = 255;

fn invalid(msg: impl Into<String>) -> PlaybookError {
    PlaybookError::InvalidSchema(msg.into())
}

/// A JSON schema used as tool input must be an object schema.
fn check_object_schema(schema: &Value, what: &str) -> Result<()> {
    let obj = schema
        .as_object()
        .ok_or_else(|| invalid(format!("{what} must be a JSON object")))?;
    if let Some(ty) = obj.get("type") {
        if ty.as_str() != Some("object") {
            return Err(invalid(format!("{what}.type must be \"object\"")));
        }
    }
    if let Some(props) = obj.get("properties") {
        if !props.is_object() {
            return Err(invalid(format!("{what}.properties must be an object")));
        }
    }
    if let Some(required) = obj.get("required") {
        let ok = required
            .as_array()
            .is_some_and(|a| a.iter().all(Value::is_string));
        if !ok {
            return Err(invalid(format!("{what}.required must be an array of strings")));
        }
    }
    Ok(())
}

/// Validate a skill definition and its examples.
pub fn validate_skill_definition(definition: &Value, examples: &Value) -> Result<()> {
    let obj = definition
        .as_object()
        .ok_or_else(|| invalid("definition must be a JSON object"))?;
    for field in ["parameters", "input_schema"] {
        if let Some(schema) = obj.get(field) {
            check_object_schema(schema, &format!("definition.{field}"))?;
        }
    }
    if !examples.is_array() {
        return Err(invalid("examples must be an array"));
    }
    Ok(())
}

/// The input schema a skill exposes as an MCP tool.
pub fn skill_input_schema(definition: &Value) -> Value {
    definition
        .get("parameters")
        .or_else(|| definition.get("input_schema"))
        .cloned()
        .unwrap_or_else(|| serde_json::json!({ "type": "object", "properties": {} }))
}

/// Validate the tool and resource descriptors of an MCP server.
pub fn validate_mcp_server(tools: &Value, resources: &Value) -> Result<()> {
    let tools = tools
        .as_array()
        .ok_or_else(|| invalid("tools must be an array"))?;
    for (i, tool) in tools.iter().enumerate() {
        let obj = tool
            .as_object()
            .ok_or_else(|| invalid(format!("tools[{i}] must be an object")))?;
        require_name(obj, "name", &format!("tools[{i}]"))?;
        let schema = obj.get("inputSchema").or_else(|| obj.get("input_schema"));
        if let Some(schema) = schema {
            check_object_schema(schema, &format!("tools[{i}].inputSchema"))?;
        }
    }

    let resources = resources
        .as_array()
        .ok_or_else(|| invalid("resources must be an array"))?;
    for (i, res) in resources.iter().enumerate() {
        let obj = res
            .as_object()
            .ok_or_else(|| invalid(format!("resources[{i}] must be an object")))?;
        require_name(obj, "uri", &format!("resources[{i}]"))?;
    }
    Ok(())
}

fn require_name(obj: &Map<String, Value>, field: &str, what: &str) -> Result<()> {
    match obj.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(invalid(format!("{what}.{field} must be a non-empty string"))),
    }
}

/// Validate a memory key, returning it trimmed.
pub fn normalize_memory_key(key: &str) -> Result<String> {
    let key = key.trim();
    if key.is_empty() {
        return Err(PlaybookError::InvalidMemoryKey("key is empty".into()));
    }
    if key.chars().count() > MAX_MEMORY_KEY_LEN {
        return Err(PlaybookError::InvalidMemoryKey(format!(
            "key exceeds {MAX_MEMORY_KEY_LEN} characters"
        )));
    }
    Ok(key.to_string())
}

/// Object-typed metadata/config fields; `null` becomes `{}`.
pub fn object_or_empty(value: Option<Value>, field: &str) -> Result<Value> {
    match value {
        None | Some(Value::Null) => Ok(Value::Object(Map::new())),
        Some(v @ Value::Object(_)) => Ok(v),
        Some(_) => Err(invalid(format!("{field} must be a JSON object"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn skill_definition_must_be_object() {
        assert!(validate_skill_definition(&json!("nope"), &json!([])).is_err());
        assert!(validate_skill_definition(&json!({}), &json!([])).is_ok());
    }

    #[test]
    fn skill_parameters_must_be_object_schema() {
        let good = json!({
            "parameters": {
                "type": "object",
                "properties": { "q": { "type": "string" } },
                "required": ["q"]
            }
        });
        assert!(validate_skill_definition(&good, &json!([])).is_ok());

        let wrong_type = json!({ "parameters": { "type": "array" } });
        assert!(validate_skill_definition(&wrong_type, &json!([])).is_err());

        let bad_required = json!({ "input_schema": { "required": [1] } });
        assert!(validate_skill_definition(&bad_required, &json!([])).is_err());
    }

    #[test]
    fn skill_examples_must_be_array() {
        assert!(validate_skill_definition(&json!({}), &json!({})).is_err());
    }

    #[test]
    fn skill_input_schema_defaults_to_empty_object() {
        assert_eq!(
            skill_input_schema(&json!({})),
            json!({ "type": "object", "properties": {} })
        );
        let def = json!({ "input_schema": { "type": "object" } });
        assert_eq!(skill_input_schema(&def), json!({ "type": "object" }));
    }

    #[test]
    fn mcp_tools_need_names() {
        assert!(validate_mcp_server(&json!([{ "name": "search" }]), &json!([])).is_ok());
        assert!(validate_mcp_server(&json!([{ "description": "x" }]), &json!([])).is_err());
        assert!(validate_mcp_server(&json!([{ "name": "  " }]), &json!([])).is_err());
        assert!(validate_mcp_server(&json!({}), &json!([])).is_err());
    }

    #[test]
    fn mcp_tool_schema_checked() {
        let tools = json!([{ "name": "t", "inputSchema": "string" }]);
        assert!(validate_mcp_server(&tools, &json!([])).is_err());
    }

    #[test]
    fn mcp_resources_need_uri() {
        assert!(validate_mcp_server(&json!([]), &json!([{ "uri": "file:///a" }])).is_ok());
        assert!(validate_mcp_server(&json!([]), &json!([{ "name": "a" }])).is_err());
    }

    #[test]
    fn memory_key_rules() {
        assert_eq!(normalize_memory_key("  prefs ").unwrap(), "prefs");
        assert!(normalize_memory_key("   ").is_err());
        assert!(normalize_memory_key(&"k".repeat(256)).is_err());
        assert!(normalize_memory_key(&"k".repeat(255)).is_ok());
    }

    #[test]
    fn object_or_empty_rules() {
        assert_eq!(object_or_empty(None, "config").unwrap(), json!({}));
        assert_eq!(object_or_empty(Some(Value::Null), "config").unwrap(), json!({}));
        assert!(object_or_empty(Some(json!([1])), "config").is_err());
    }
}
