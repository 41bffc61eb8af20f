use super::{required_str, PlaybookTool};
use playbooks_core::api_key::Permission;
use playbooks_core::memory::{Memory, MemoryInput, MemoryQuery};
use playbooks_core::playbook::Playbook;
use playbooks_core::Store;
use serde_json::{json, Value};

pub struct ReadMemoryTool;

impl PlaybookTool for ReadMemoryTool {
    fn name(&self) -> &str {
        "read_memory"
    }

    fn description(&self) -> &str {
        "Read a stored memory by key"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Memory key" }
            },
            "required": ["key"]
        })
    }

    fn permission(&self) -> Permission {
        Permission::MemoryRead
    }

    fn call(&self, args: Value, store: &Store, playbook: &Playbook) -> Result<Value, String> {
        let key = required_str(&args, "key")?;
        let memory: Memory = store
            .get(playbook.id, key.trim())
            .map_err(|e| e.to_string())?;
        serde_json::to_value(memory).map_err(|e| e.to_string())
    }
}

pub struct WriteMemoryTool;

impl PlaybookTool for WriteMemoryTool {
    fn name(&self) -> &str {
        "write_memory"
    }

    fn description(&self) -> &str {
        "Create or overwrite a memory. Existing tags and description are kept unless given"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Memory key (1-255 characters)" },
                "value": { "description": "Any JSON value" },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional tags"
                },
                "description": { "type": "string" }
            },
            "required": ["key", "value"]
        })
    }

    fn permission(&self) -> Permission {
        Permission::MemoryWrite
    }

    fn call(&self, args: Value, store: &Store, playbook: &Playbook) -> Result<Value, String> {
        let key = required_str(&args, "key")?.to_string();
        let input: MemoryInput = serde_json::from_value(args)
            .map_err(|e| format!("invalid arguments: {e}"))?;
        let existing = store
            .find::<Memory>(playbook.id, key.trim())
            .map_err(|e| e.to_string())?;
        let memory =
            Memory::upsert(existing, playbook.id, &key, input).map_err(|e| e.to_string())?;
        store.save(&memory).map_err(|e| e.to_string())?;
        serde_json::to_value(memory).map_err(|e| e.to_string())
    }
}

pub struct SearchMemoryTool;

impl PlaybookTool for SearchMemoryTool {
    fn name(&self) -> &str {
        "search_memory"
    }

    fn description(&self) -> &str {
        "Search memories by text (key, description, value) and required tags"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Case-insensitive text to find" },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Every listed tag must be present"
                }
            }
        })
    }

    fn permission(&self) -> Permission {
        Permission::MemoryRead
    }

    fn call(&self, args: Value, store: &Store, playbook: &Playbook) -> Result<Value, String> {
        let search = args["query"].as_str().map(str::to_string);
        let tags = match &args["tags"] {
            Value::Null => None,
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|t| t.as_str().ok_or_else(|| "tags must be strings".to_string()))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(","),
            ),
            Value::String(s) => Some(s.clone()),
            _ => return Err("tags must be an array of strings".to_string()),
        };
        let query = MemoryQuery::from_params(search, tags.as_deref());
        let found = store
            .search_memories(playbook.id, &query)
            .map_err(|e| e.to_string())?;
        Ok(json!({ "count": found.len(), "memories": found }))
    }
}

pub struct DeleteMemoryTool;

impl PlaybookTool for DeleteMemoryTool {
    fn name(&self) -> &str {
        "delete_memory"
    }

    fn description(&self) -> &str {
        "Delete a memory by key"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Memory key" }
            },
            "required": ["key"]
        })
    }

    fn permission(&self) -> Permission {
        Permission::MemoryWrite
    }

    fn call(&self, args: Value, store: &Store, playbook: &Playbook) -> Result<Value, String> {
        let key = required_str(&args, "key")?.trim();
        store
            .delete::<Memory>(playbook.id, key)
            .map_err(|e| e.to_string())?;
        Ok(json!({ "deleted": key }))
    }
}
