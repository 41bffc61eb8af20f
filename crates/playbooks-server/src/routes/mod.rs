pub mod api_keys;
pub mod canvas;
pub mod content;
pub mod health;
pub mod mcp;
pub mod memory;
pub mod playbooks;
pub mod public;

use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::Json;
use playbooks_core::api_key::Permission;
use playbooks_core::playbook::Playbook;
use playbooks_core::Store;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{self, Access, Principal};
use crate::error::AppError;

/// Load `guid` and authorize the caller for `required` on it.
pub(crate) fn guarded(
    store: &Store,
    headers: &HeaderMap,
    guid: &str,
    required: Permission,
    access: Access,
) -> Result<(Playbook, Principal), AppError> {
    let playbook = store.get_playbook(guid)?;
    let principal = auth::authorize(store, headers, &playbook, required, access)?;
    Ok((playbook, principal))
}

/// Decode a request body so malformed input surfaces as a 400 `{error}`
/// instead of axum's plain-text rejection.
pub(crate) fn parse_body<T: DeserializeOwned>(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(body) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    serde_json::from_value(body).map_err(|e| AppError::bad_request(format!("invalid body: {e}")))
}

pub(crate) fn success() -> Json<Value> {
    Json(serde_json::json!({ "success": true }))
}
