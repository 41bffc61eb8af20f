use crate::error::{PlaybookError, Result};
use crate::schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A key/value entry agents can read and write through a playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub playbook_id: Uuid,
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryInput {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Filters for listing memories.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    pub search: Option<String>,
    pub tags: Vec<String>,
}

impl MemoryQuery {
    /// Build from `?search=` and a comma-separated `?tags=` value.
    pub fn from_params(search: Option<String>, tags: Option<&str>) -> Self {
        Self {
            search: search.filter(|s| !s.trim().is_empty()),
            tags: tags.map(split_tags).unwrap_or_default(),
        }
    }
}

pub fn split_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(',').map(str::to_string).collect())
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

impl Memory {
    /// Create or overwrite the memory at `key`. `created_at` survives overwrites.
    pub fn upsert(
        existing: Option<Memory>,
        playbook_id: Uuid,
        key: &str,
        input: MemoryInput,
    ) -> Result<Self> {
        let key = schema::normalize_memory_key(key)?;
        let value = input.value.ok_or(PlaybookError::MissingField("value"))?;
        let now = Utc::now();
        let created_at = existing.as_ref().map_or(now, |m| m.created_at);
        let tags = match input.tags {
            Some(t) => normalize_tags(t),
            None => existing.as_ref().map(|m| m.tags.clone()).unwrap_or_default(),
        };
        let description = input
            .description
            .or_else(|| existing.and_then(|m| m.description));
        Ok(Self {
            playbook_id,
            key,
            value,
            tags,
            description,
            created_at,
            updated_at: now,
        })
    }

    pub fn matches(&self, query: &MemoryQuery) -> bool {
        if !query.tags.iter().all(|t| self.tags.contains(t)) {
            return false;
        }
        let Some(needle) = query.search.as_deref() else {
            return true;
        };
        let needle = needle.to_lowercase();
        self.key.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
            || self.value.to_string().to_lowercase().contains(&needle)
    }
}
