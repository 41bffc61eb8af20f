use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use playbooks_core::api_key::Permission;
use playbooks_core::memory::{Memory, MemoryInput, MemoryQuery};
use playbooks_core::Store;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{guarded, parse_body, success};
use crate::auth::Access;
use crate::error::AppError;
use crate::state::{blocking, AppState};

#[derive(Deserialize, Default)]
pub struct MemoryParams {
    pub search: Option<String>,
    pub tags: Option<String>,
}

fn upsert(store: &Store, playbook_id: Uuid, key: &str, input: MemoryInput) -> Result<Memory, AppError> {
    let existing = store.find::<Memory>(playbook_id, key.trim())?;
    let memory = Memory::upsert(existing, playbook_id, key, input)?;
    store.save(&memory)?;
    Ok(memory)
}

/// GET /api/playbooks/{guid}/memory?search=&tags=a,b
pub async fn list_memories(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    Query(params): Query<MemoryParams>,
    headers: HeaderMap,
) -> Result<Json<Vec<Memory>>, AppError> {
    let query = MemoryQuery::from_params(params.search, params.tags.as_deref());
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::MemoryRead,
            Access::Private,
        )?;
        Ok(Json(store.search_memories(playbook.id, &query)?))
    })
    .await
}

/// POST /api/playbooks/{guid}/memory — upsert with the key in the body.
pub async fn write_memory(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Memory>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::MemoryWrite,
            Access::Private,
        )?;
        let mut input: MemoryInput = parse_body(payload)?;
        let key = input
            .key
            .take()
            .ok_or_else(|| AppError::bad_request("key is required"))?;
        Ok(Json(upsert(&store, playbook.id, &key, input)?))
    })
    .await
}

/// GET /api/playbooks/{guid}/memory/{key}
pub async fn get_memory(
    State(app): State<AppState>,
    Path((guid, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Memory>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::MemoryRead,
            Access::Private,
        )?;
        Ok(Json(store.get::<Memory>(playbook.id, &key)?))
    })
    .await
}

/// PUT /api/playbooks/{guid}/memory/{key} — upsert at the path key.
pub async fn put_memory(
    State(app): State<AppState>,
    Path((guid, key)): Path<(String, String)>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Memory>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::MemoryWrite,
            Access::Private,
        )?;
        let input: MemoryInput = parse_body(payload)?;
        Ok(Json(upsert(&store, playbook.id, &key, input)?))
    })
    .await
}

/// DELETE /api/playbooks/{guid}/memory/{key}
pub async fn delete_memory(
    State(app): State<AppState>,
    Path((guid, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::MemoryWrite,
            Access::Private,
        )?;
        store.delete::<Memory>(playbook.id, &key)?;
        Ok(success())
    })
    .await
}
