use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use playbooks_core::api_key::Permission;
use playbooks_core::canvas::{Canvas, CanvasInput};
use serde::Deserialize;
use serde_json::Value;

use super::{guarded, parse_body, success};
use crate::auth::Access;
use crate::error::AppError;
use crate::state::{blocking, AppState};

#[derive(Deserialize)]
pub struct PatchSectionBody {
    pub content: Option<String>,
}

/// GET /api/playbooks/{guid}/canvas
pub async fn list_canvas(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<Canvas>>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::CanvasRead,
            Access::PublicRead,
        )?;
        Ok(Json(store.list::<Canvas>(playbook.id)?))
    })
    .await
}

/// POST /api/playbooks/{guid}/canvas — 409 when the slug is taken.
pub async fn create_canvas(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Canvas>), AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::CanvasWrite,
            Access::Private,
        )?;
        let input: CanvasInput = parse_body(payload)?;
        let canvas = Canvas::create(playbook.id, input)?;
        store.create(&canvas)?;
        Ok((StatusCode::CREATED, Json(canvas)))
    })
    .await
}

/// GET /api/playbooks/{guid}/canvas/{slug}
pub async fn get_canvas(
    State(app): State<AppState>,
    Path((guid, slug)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Canvas>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::CanvasRead,
            Access::PublicRead,
        )?;
        Ok(Json(store.get::<Canvas>(playbook.id, &slug)?))
    })
    .await
}

/// PUT /api/playbooks/{guid}/canvas/{slug} — new content is re-split.
pub async fn update_canvas(
    State(app): State<AppState>,
    Path((guid, slug)): Path<(String, String)>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Canvas>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::CanvasWrite,
            Access::Private,
        )?;
        let input: CanvasInput = parse_body(payload)?;
        let mut canvas: Canvas = store.get(playbook.id, &slug)?;
        canvas.apply(input)?;
        store.save(&canvas)?;
        Ok(Json(canvas))
    })
    .await
}

/// DELETE /api/playbooks/{guid}/canvas/{slug}
pub async fn delete_canvas(
    State(app): State<AppState>,
    Path((guid, slug)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = guarded(
            &store,
            &headers,
            &guid,
            Permission::CanvasWrite,
            Access::Private,
        )?;
        store.delete::<Canvas>(playbook.id, &slug)?;
        Ok(success())
    })
    .await
}

/// PATCH /api/playbooks/{guid}/canvas/{slug}/sections/{section_id}
///
/// Replaces one section's body and returns the whole re-split document.
pub async fn patch_section(
    State(app): State<AppState>,
    Path((guid, slug, section_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Canvas>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, principal) = guarded(
            &store,
            &headers,
            &guid,
            Permission::CanvasWrite,
            Access::Private,
        )?;
        let body: PatchSectionBody = parse_body(payload)?;
        let content = body
            .content
            .ok_or_else(|| AppError::bad_request("content is required"))?;
        let mut canvas: Canvas = store.get(playbook.id, &slug)?;
        canvas.patch_section(&section_id, &content)?;
        store.save(&canvas)?;
        tracing::debug!(%guid, %slug, %section_id, by = %principal.label(), "canvas section patched");
        Ok(Json(canvas))
    })
    .await
}
