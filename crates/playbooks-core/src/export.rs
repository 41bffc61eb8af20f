use crate::api_key::Permission;
use crate::canvas::Canvas;
use crate::error::Result;
use crate::mcp_server::McpServer;
use crate::memory::Memory;
use crate::persona::Persona;
use crate::playbook::Playbook;
use crate::skill::Skill;
use crate::store::{Record, Store};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

/// Which collections an export may include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportScope {
    pub personas: bool,
    pub skills: bool,
    pub mcp_servers: bool,
    pub canvas: bool,
    pub memories: bool,
}

impl ExportScope {
    /// Everything, memories included.
    pub fn all() -> Self {
        Self::from_permits(|_| true)
    }

    /// Include each collection whose read permission `permits` accepts.
    pub fn from_permits(permits: impl Fn(Permission) -> bool) -> Self {
        Self {
            personas: permits(Permission::PersonasRead),
            skills: permits(Permission::SkillsRead),
            mcp_servers: permits(Permission::McpRead),
            canvas: permits(Permission::CanvasRead),
            memories: permits(Permission::MemoryRead),
        }
    }
}

/// Read-only view of a playbook. Collections outside the caller's
/// [`ExportScope`] come back empty; memories are omitted entirely.
#[derive(Debug, Clone, Serialize)]
pub struct PublicPlaybook {
    pub guid: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub config: serde_json::Value,
    pub personas: Vec<Persona>,
    pub skills: Vec<Skill>,
    pub mcp_servers: Vec<McpServer>,
    pub canvas: Vec<Canvas>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memories: Option<Vec<Memory>>,
    pub updated_at: DateTime<Utc>,
}

impl PublicPlaybook {
    pub fn load(store: &Store, playbook: &Playbook, scope: ExportScope) -> Result<Self> {
        let memories = if scope.memories {
            Some(store.list(playbook.id)?)
        } else {
            None
        };
        Ok(Self {
            guid: playbook.guid.clone(),
            name: playbook.name.clone(),
            description: playbook.description.clone(),
            is_public: playbook.is_public,
            config: playbook.config.clone(),
            personas: list_if(store, playbook, scope.personas)?,
            skills: list_if(store, playbook, scope.skills)?,
            mcp_servers: list_if(store, playbook, scope.mcp_servers)?,
            canvas: list_if(store, playbook, scope.canvas)?,
            memories,
            updated_at: playbook.updated_at,
        })
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.name);
        if let Some(desc) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            let _ = writeln!(out, "{}\n", desc.trim());
        }

        if !self.personas.is_empty() {
            out.push_str("## Personas\n\n");
            for p in &self.personas {
                let _ = writeln!(out, "### {}\n\n{}\n", p.name, p.system_prompt.trim());
            }
        }

        if !self.skills.is_empty() {
            out.push_str("## Skills\n\n");
            for s in &self.skills {
                let _ = writeln!(out, "### {}\n", s.name);
                if let Some(desc) = &s.description {
                    let _ = writeln!(out, "{}\n", desc.trim());
                }
                let schema = serde_json::to_string_pretty(&s.input_schema()).unwrap_or_default();
                let _ = writeln!(out, "```json\n{schema}\n```\n");
            }
        }

        if !self.mcp_servers.is_empty() {
            out.push_str("## MCP Servers\n\n");
            for m in &self.mcp_servers {
                let tools = m.tool_names();
                if tools.is_empty() {
                    let _ = writeln!(out, "- **{}**", m.name);
                } else {
                    let _ = writeln!(out, "- **{}**: {}", m.name, tools.join(", "));
                }
            }
            out.push('\n');
        }

        if !self.canvas.is_empty() {
            out.push_str("## Canvas\n\n");
            for c in &self.canvas {
                let _ = writeln!(out, "### {}\n\n{}\n", c.name, c.content.trim());
            }
        }

        if let Some(memories) = self.memories.as_ref().filter(|m| !m.is_empty()) {
            out.push_str("## Memory\n\n");
            for m in memories {
                let _ = writeln!(out, "- `{}`: {}", m.key, m.value);
            }
            out.push('\n');
        }

        out.trim_end().to_string() + "\n"
    }
}

fn list_if<R: Record>(store: &Store, playbook: &Playbook, included: bool) -> Result<Vec<R>> {
    if included {
        store.list(playbook.id)
    } else {
        Ok(Vec::new())
    }
}
