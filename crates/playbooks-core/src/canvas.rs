use crate::error::Result;
use crate::markdown::{self, Section};
use crate::paths;
use crate::playbook::required_text;
use crate::schema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A markdown document split into addressable sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canvas {
    pub id: Uuid,
    pub playbook_id: Uuid,
    pub slug: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanvasInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub sort_order: Option<i64>,
}

impl Canvas {
    /// Build a new document. The slug defaults to the slugified name.
    pub fn create(playbook_id: Uuid, input: CanvasInput) -> Result<Self> {
        let name = required_text(input.name, "name")?;
        let slug = match input.slug {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => paths::slugify(&name),
        };
        paths::validate_slug(&slug)?;
        let content = input.content.unwrap_or_default();
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            playbook_id,
            sections: markdown::parse_markdown_sections(&content),
            slug,
            name,
            content,
            metadata: schema::object_or_empty(input.metadata, "metadata")?,
            sort_order: input.sort_order.unwrap_or(0),
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply an update. The slug is the storage key and is never changed here.
    pub fn apply(&mut self, input: CanvasInput) -> Result<()> {
        if input.name.is_some() {
            self.name = required_text(input.name, "name")?;
        }
        if input.metadata.is_some() {
            self.metadata = schema::object_or_empty(input.metadata, "metadata")?;
        }
        if let Some(order) = input.sort_order {
            self.sort_order = order;
        }
        if let Some(content) = input.content {
            self.set_content(content);
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_content(&mut self, content: String) {
        self.sections = markdown::parse_markdown_sections(&content);
        self.content = content;
        self.updated_at = Utc::now();
    }

    /// Rewrite the body of one section and re-split the document.
    pub fn patch_section(&mut self, section_id: &str, body: &str) -> Result<()> {
        let updated = markdown::replace_section(&self.content, section_id, body)?;
        self.set_content(updated);
        Ok(())
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }
}
