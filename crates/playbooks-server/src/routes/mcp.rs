use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::auth::{self, Access};
use crate::error::AppError;
use crate::mcp::{self, tools, JsonRpcRequest, JsonRpcResponse, McpContext};
use crate::state::{blocking, AppState};

enum Incoming {
    Request(JsonRpcRequest),
    Notification,
    Rejected(JsonRpcResponse),
}

fn decode(body: &[u8]) -> Incoming {
    let raw: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return Incoming::Rejected(JsonRpcResponse::err(
                None,
                mcp::PARSE_ERROR,
                format!("parse error: {e}"),
            ))
        }
    };

    // Notifications have no "id" key and get no response body.
    let has_id = raw
        .as_object()
        .map(|o| o.contains_key("id"))
        .unwrap_or(false);
    if raw.is_object() && !has_id {
        return Incoming::Notification;
    }

    let id = raw.get("id").cloned();
    match serde_json::from_value::<JsonRpcRequest>(raw) {
        Ok(request) if request.jsonrpc != "2.0" => Incoming::Rejected(JsonRpcResponse::err(
            id,
            mcp::INVALID_REQUEST,
            format!("unsupported jsonrpc version '{}'", request.jsonrpc),
        )),
        Ok(request) => Incoming::Request(request),
        Err(e) => Incoming::Rejected(JsonRpcResponse::err(
            id,
            mcp::INVALID_REQUEST,
            format!("invalid request: {e}"),
        )),
    }
}

/// POST /api/mcp/{guid} — one JSON-RPC 2.0 message per request.
///
/// Credentials are resolved once; each method then checks the scope it
/// needs, so a memory-only key can still list tools.
pub async fn rpc(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let playbook = store.get_playbook(&guid)?;
        let principal = auth::identify(&store, &headers, &playbook, Access::PublicRead)?;

        let request = match decode(&body) {
            Incoming::Request(r) => r,
            Incoming::Notification => return Ok(StatusCode::ACCEPTED.into_response()),
            Incoming::Rejected(resp) => return Ok(Json(resp).into_response()),
        };

        let tools = tools::builtin_tools();
        let ctx = McpContext {
            store: &store,
            playbook: &playbook,
            principal: &principal,
            tools: &tools,
        };
        tracing::debug!(%guid, method = %request.method, "mcp request");
        Ok(Json(mcp::handle_request(&request, &ctx)).into_response())
    })
    .await
}

/// GET /api/mcp/{guid} — server info plus the tool list.
pub async fn manifest(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let playbook = store.get_playbook(&guid)?;
        let principal = auth::identify(&store, &headers, &playbook, Access::PublicRead)?;
        let tools = tools::builtin_tools();
        let ctx = McpContext {
            store: &store,
            playbook: &playbook,
            principal: &principal,
            tools: &tools,
        };
        Ok(Json(ctx.manifest()?))
    })
    .await
}
