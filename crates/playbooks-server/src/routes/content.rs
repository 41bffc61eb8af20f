//! Personas, skills and MCP server descriptors share one handler set.
//!
//! Each is a record owned by a playbook, addressed by UUID, readable with
//! its `*:read` scope (or anonymously on a public playbook) and writable
//! with its `*:write` scope.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use playbooks_core::api_key::Permission;
use playbooks_core::mcp_server::{McpServer, McpServerInput};
use playbooks_core::persona::{Persona, PersonaInput};
use playbooks_core::skill::{Skill, SkillInput};
use playbooks_core::store::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{guarded, parse_body, success};
use crate::auth::Access;
use crate::error::AppError;
use crate::state::{blocking, AppState};

pub trait ChildResource: Record + Serialize + Send + 'static {
    type Input: DeserializeOwned + Send + 'static;

    const READ: Permission;
    const WRITE: Permission;

    fn build(playbook_id: Uuid, input: Self::Input) -> playbooks_core::Result<Self>;
    fn update(&mut self, input: Self::Input) -> playbooks_core::Result<()>;
}

impl ChildResource for Persona {
    type Input = PersonaInput;
    const READ: Permission = Permission::PersonasRead;
    const WRITE: Permission = Permission::PersonasWrite;

    fn build(playbook_id: Uuid, input: PersonaInput) -> playbooks_core::Result<Self> {
        Persona::create(playbook_id, input)
    }
    fn update(&mut self, input: PersonaInput) -> playbooks_core::Result<()> {
        self.apply(input)
    }
}

impl ChildResource for Skill {
    type Input = SkillInput;
    const READ: Permission = Permission::SkillsRead;
    const WRITE: Permission = Permission::SkillsWrite;

    fn build(playbook_id: Uuid, input: SkillInput) -> playbooks_core::Result<Self> {
        Skill::create(playbook_id, input)
    }
    fn update(&mut self, input: SkillInput) -> playbooks_core::Result<()> {
        self.apply(input)
    }
}

impl ChildResource for McpServer {
    type Input = McpServerInput;
    const READ: Permission = Permission::McpRead;
    const WRITE: Permission = Permission::McpWrite;

    fn build(playbook_id: Uuid, input: McpServerInput) -> playbooks_core::Result<Self> {
        McpServer::create(playbook_id, input)
    }
    fn update(&mut self, input: McpServerInput) -> playbooks_core::Result<()> {
        self.apply(input)
    }
}

fn parse_id(id: &str) -> Result<String, AppError> {
    Uuid::parse_str(id)
        .map(|u| u.to_string())
        .map_err(|_| AppError::bad_request(format!("invalid id: {id}")))
}

/// GET /api/playbooks/{guid}/{personas|skills|mcp-servers}
pub async fn list<R: ChildResource>(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<R>>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(&store, &headers, &guid, R::READ, Access::PublicRead)?;
        Ok(Json(store.list::<R>(playbook.id)?))
    })
    .await
}

/// POST /api/playbooks/{guid}/{personas|skills|mcp-servers}
pub async fn create<R: ChildResource>(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<R>), AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(&store, &headers, &guid, R::WRITE, Access::Private)?;
        let input: R::Input = parse_body(payload)?;
        let record = R::build(playbook.id, input)?;
        store.create(&record)?;
        Ok((StatusCode::CREATED, Json(record)))
    })
    .await
}

/// PUT /api/playbooks/{guid}/{personas|skills|mcp-servers}/{id}
pub async fn update<R: ChildResource>(
    State(app): State<AppState>,
    Path((guid, id)): Path<(String, String)>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<R>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(&store, &headers, &guid, R::WRITE, Access::Private)?;
        let id = parse_id(&id)?;
        let input: R::Input = parse_body(payload)?;
        let mut record: R = store.get(playbook.id, &id)?;
        record.update(input)?;
        store.save(&record)?;
        Ok(Json(record))
    })
    .await
}

/// DELETE /api/playbooks/{guid}/{personas|skills|mcp-servers}/{id}
pub async fn delete<R: ChildResource>(
    State(app): State<AppState>,
    Path((guid, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(&store, &headers, &guid, R::WRITE, Access::Private)?;
        let id = parse_id(&id)?;
        store.delete::<R>(playbook.id, &id)?;
        Ok(success())
    })
    .await
}
