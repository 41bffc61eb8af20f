use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use playbooks_core::api_key::{parse_permissions, ApiKey, Permission};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::parse_body;
use crate::auth::require_owner;
use crate::error::AppError;
use crate::state::{blocking, AppState};

#[derive(Deserialize)]
pub struct CreateKeyBody {
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Listing shape. The hash never leaves the server.
#[derive(Serialize)]
pub struct KeySummary {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for KeySummary {
    fn from(k: ApiKey) -> Self {
        Self {
            id: k.id,
            name: k.name,
            key_prefix: k.key_prefix,
            permissions: k.permissions,
            is_active: k.is_active,
            expires_at: k.expires_at,
            last_used_at: k.last_used_at,
            created_at: k.created_at,
        }
    }
}

/// Creation response: the summary plus the plaintext token, shown only here.
#[derive(Serialize)]
pub struct IssuedKey {
    #[serde(flatten)]
    pub summary: KeySummary,
    pub key: String,
}

/// GET /api/playbooks/{guid}/api-keys
pub async fn list_keys(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<KeySummary>>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = require_owner(&store, &headers, &guid)?;
        let keys = store.list_api_keys(playbook.id)?;
        Ok(Json(keys.into_iter().map(KeySummary::from).collect()))
    })
    .await
}

/// POST /api/playbooks/{guid}/api-keys
pub async fn create_key(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<IssuedKey>), AppError> {
    let store = app.store.clone();
    let defaults = app.config.auth.default_permissions();
    blocking(move || {
        let (playbook, user) = require_owner(&store, &headers, &guid)?;
        let body: CreateKeyBody = parse_body(payload)?;
        let mut permissions = parse_permissions(&body.permissions)?;
        if permissions.is_empty() {
            permissions = defaults;
        }
        let name = body
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "API key".to_string());
        let (key, token) = ApiKey::issue(playbook.id, user, name, permissions, body.expires_at);
        store.create_api_key(&key)?;
        tracing::info!(guid = %playbook.guid, key = %key.key_prefix, "api key issued");
        Ok((
            StatusCode::CREATED,
            Json(IssuedKey {
                summary: key.into(),
                key: token,
            }),
        ))
    })
    .await
}

/// DELETE /api/playbooks/{guid}/api-keys/{id} — marks the key inactive.
pub async fn revoke_key(
    State(app): State<AppState>,
    Path((guid, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<KeySummary>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let (playbook, _) = require_owner(&store, &headers, &guid)?;
        let key_id =
            Uuid::parse_str(&id).map_err(|_| AppError::bad_request("invalid key id"))?;
        let key = store.revoke_api_key(playbook.id, key_id)?;
        Ok(Json(key.into()))
    })
    .await
}
