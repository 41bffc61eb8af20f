use crate::api_key::random_suffix;
use crate::error::{PlaybookError, Result};
use crate::schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

const GUID_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Playbook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    pub id: Uuid,
    /// Public identifier used in every URL.
    pub guid: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a playbook. On update every
/// field is optional; on create `name` is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaybookInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
    #[serde(default)]
    pub config: Option<Value>,
}

pub fn generate_guid() -> String {
    random_suffix(GUID_LEN).to_ascii_lowercase()
}

pub(crate) fn required_text(value: Option<String>, field: &'static str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(PlaybookError::MissingField(field)),
    }
}

impl Playbook {
    pub fn create(user_id: impl Into<String>, input: PlaybookInput) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(PlaybookError::MissingField("user_id"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            guid: generate_guid(),
            user_id,
            name: required_text(input.name, "name")?,
            description: input.description,
            is_public: input.is_public.unwrap_or(false),
            config: schema::object_or_empty(input.config, "config")?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn apply(&mut self, input: PlaybookInput) -> Result<()> {
        if let Some(name) = input.name {
            self.name = required_text(Some(name), "name")?;
        }
        if input.description.is_some() {
            self.description = input.description;
        }
        if let Some(public) = input.is_public {
            self.is_public = public;
        }
        if input.config.is_some() {
            self.config = schema::object_or_empty(input.config, "config")?;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
