use crate::error::Result;
use crate::playbook::required_text;
use crate::schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A callable capability described by a JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: Uuid,
    pub playbook_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub definition: Value,
    #[serde(default)]
    pub examples: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub definition: Option<Value>,
    #[serde(default)]
    pub examples: Option<Value>,
}

impl Skill {
    pub fn create(playbook_id: Uuid, input: SkillInput) -> Result<Self> {
        let definition = input.definition.unwrap_or_else(|| serde_json::json!({}));
        let examples = input.examples.unwrap_or_else(|| Value::Array(Vec::new()));
        schema::validate_skill_definition(&definition, &examples)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            playbook_id,
            name: required_text(input.name, "name")?,
            description: input.description,
            definition,
            examples,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, input: SkillInput) -> Result<()> {
        let definition = input.definition.unwrap_or_else(|| self.definition.clone());
        let examples = input.examples.unwrap_or_else(|| self.examples.clone());
        schema::validate_skill_definition(&definition, &examples)?;
        if input.name.is_some() {
            self.name = required_text(input.name, "name")?;
        }
        if input.description.is_some() {
            self.description = input.description;
        }
        self.definition = definition;
        self.examples = examples;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Input schema advertised when this skill is listed as an MCP tool.
    pub fn input_schema(&self) -> Value {
        schema::skill_input_schema(&self.definition)
    }
}
