use crate::error::Result;
use crate::playbook::required_text;
use crate::schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: Uuid,
    pub playbook_id: Uuid,
    pub name: String,
    pub system_prompt: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl Persona {
    pub fn create(playbook_id: Uuid, input: PersonaInput) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            playbook_id,
            name: required_text(input.name, "name")?,
            system_prompt: required_text(input.system_prompt, "system_prompt")?,
            metadata: schema::object_or_empty(input.metadata, "metadata")?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, input: PersonaInput) -> Result<()> {
        if input.name.is_some() {
            self.name = required_text(input.name, "name")?;
        }
        if input.system_prompt.is_some() {
            self.system_prompt = required_text(input.system_prompt, "system_prompt")?;
        }
        if input.metadata.is_some() {
            self.metadata = schema::object_or_empty(input.metadata, "metadata")?;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlaybookError;

    #[test]
    fn create_requires_prompt() {
        let err = Persona::create(
            Uuid::new_v4(),
            PersonaInput {
                name: Some("Reviewer".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, PlaybookError::MissingField("system_prompt")));
    }

    #[test]
    fn apply_replaces_prompt() {
        let mut p = Persona::create(
            Uuid::new_v4(),
            PersonaInput {
                name: Some("Reviewer".into()),
                system_prompt: Some("Be terse.".into()),
                metadata: None,
            },
        )
        .unwrap();
        p.apply(PersonaInput {
            system_prompt: Some("Be thorough.".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(p.name, "Reviewer");
        assert_eq!(p.system_prompt, "Be thorough.");
    }
}
