use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use playbooks_core::playbook::{Playbook, PlaybookInput};
use playbooks_core::PlaybookError;
use serde_json::Value;

use super::{parse_body, success};
use crate::auth::{require_owner, require_session};
use crate::error::AppError;
use crate::state::{blocking, AppState};

/// Fresh guids are random; a collision just draws again.
const GUID_ATTEMPTS: usize = 3;

/// GET /api/playbooks — playbooks owned by the signed-in user.
pub async fn list_playbooks(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Playbook>>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let user = require_session(&store, &headers)?;
        Ok(Json(store.list_playbooks_for_user(&user)?))
    })
    .await
}

/// POST /api/playbooks — create a playbook owned by the signed-in user.
pub async fn create_playbook(
    State(app): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Playbook>), AppError> {
    let store = app.store.clone();
    blocking(move || {
        let user = require_session(&store, &headers)?;
        let input: PlaybookInput = parse_body(payload)?;
        let mut attempt = 0;
        loop {
            let playbook = Playbook::create(user.as_str(), input.clone())?;
            match store.create_playbook(&playbook) {
                Ok(()) => return Ok((StatusCode::CREATED, Json(playbook))),
                Err(PlaybookError::PlaybookExists(guid)) if attempt + 1 < GUID_ATTEMPTS => {
                    tracing::warn!(%guid, "playbook guid collision, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    })
    .await
}

/// GET /api/playbooks/{guid}
pub async fn get_playbook(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Playbook>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = require_owner(&store, &headers, &guid)?;
        Ok(Json(playbook))
    })
    .await
}

/// PUT /api/playbooks/{guid} — partial update; absent fields are kept.
pub async fn update_playbook(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Playbook>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (mut playbook, _) = require_owner(&store, &headers, &guid)?;
        let input: PlaybookInput = parse_body(payload)?;
        playbook.apply(input)?;
        store.save_playbook(&playbook)?;
        Ok(Json(playbook))
    })
    .await
}

/// DELETE /api/playbooks/{guid} — removes the playbook, its contents and keys.
pub async fn delete_playbook(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        require_owner(&store, &headers, &guid)?;
        store.delete_playbook(&guid)?;
        Ok(success())
    })
    .await
}
