use crate::error::Result;
use crate::playbook::required_text;
use crate::schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Descriptor of an external MCP server an agent may connect to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServer {
    pub id: Uuid,
    pub playbook_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tools: Value,
    #[serde(default)]
    pub resources: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpServerInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub resources: Option<Value>,
}

impl McpServer {
    pub fn create(playbook_id: Uuid, input: McpServerInput) -> Result<Self> {
        let tools = input.tools.unwrap_or_else(|| Value::Array(Vec::new()));
        let resources = input.resources.unwrap_or_else(|| Value::Array(Vec::new()));
        schema::validate_mcp_server(&tools, &resources)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            playbook_id,
            name: required_text(input.name, "name")?,
            description: input.description,
            tools,
            resources,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, input: McpServerInput) -> Result<()> {
        let tools = input.tools.unwrap_or_else(|| self.tools.clone());
        let resources = input.resources.unwrap_or_else(|| self.resources.clone());
        schema::validate_mcp_server(&tools, &resources)?;
        if input.name.is_some() {
            self.name = required_text(input.name, "name")?;
        }
        if input.description.is_some() {
            self.description = input.description;
        }
        self.tools = tools;
        self.resources = resources;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools
            .as_array()
            .map(|tools| tools.iter().filter_map(|t| t["name"].as_str()).collect())
            .unwrap_or_default()
    }
}
