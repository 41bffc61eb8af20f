use axum::http::StatusCode;
use http_body_util::BodyExt;
use playbooks_core::api_key::{ApiKey, Permission};
use playbooks_core::config::Config;
use playbooks_core::session::Session;
use playbooks_core::Store;
use playbooks_server::state::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    _dir: TempDir,
    state: AppState,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let state = AppState::open(dir.path(), Config::default()).unwrap();
        Self { _dir: dir, state }
    }

    fn app(&self) -> axum::Router {
        playbooks_server::build_router(self.state.clone())
    }

    fn store(&self) -> &Store {
        &self.state.store
    }

    /// Start a session for `user` and return an `Authorization` header value.
    fn session(&self, user: &str) -> String {
        let (session, token) = Session::issue(user, chrono::Duration::hours(1)).unwrap();
        self.store().create_session(&session).unwrap();
        format!("Bearer {token}")
    }

    /// Mint a key for `guid` directly in the store.
    fn key(&self, guid: &str, permissions: Vec<Permission>) -> String {
        let playbook = self.store().get_playbook(guid).unwrap();
        let (key, token) = ApiKey::issue(playbook.id, playbook.user_id, "test", permissions, None);
        self.store().create_api_key(&key).unwrap();
        token
    }

    /// Create a playbook through the API as `auth` and return its guid.
    async fn playbook(&self, auth: &str, name: &str, public: bool) -> String {
        let (status, body) = send(
            self.app(),
            "POST",
            "/api/playbooks",
            Some(auth),
            Some(json!({ "name": name, "is_public": public })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["guid"].as_str().unwrap().to_string()
    }
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
///
/// `auth` is either a full `Authorization` value (`Bearer …`) or a raw
/// `apb_live_…` key sent as `X-API-Key`.
async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = axum::http::Request::builder().method(method).uri(uri);
    match auth {
        Some(a) if a.starts_with("apb_live_") => req = req.header("x-api-key", a),
        Some(a) => req = req.header("authorization", a),
        None => {}
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => req.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str, auth: Option<&str>) -> (StatusCode, Value) {
    send(app, "GET", uri, auth, None).await
}

async fn rpc(app: axum::Router, guid: &str, auth: Option<&str>, body: Value) -> (StatusCode, Value) {
    send(app, "POST", &format!("/api/mcp/{guid}"), auth, Some(body)).await
}

// ---------------------------------------------------------------------------
// Health and management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_is_ok() {
    let h = Harness::new();
    let (status, body) = get(h.app(), "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn playbook_crud_requires_owner_session() {
    let h = Harness::new();
    let alice = h.session("alice");
    let bob = h.session("bob");

    let (status, body) = get(h.app(), "/api/playbooks", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let guid = h.playbook(&alice, "Research", false).await;
    assert_eq!(guid.len(), 12);

    let (status, list) = get(h.app(), "/api/playbooks", Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let uri = format!("/api/playbooks/{guid}");
    let (status, _) = get(h.app(), &uri, Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(
        h.app(),
        "PUT",
        &uri,
        Some(&alice),
        Some(json!({ "description": "notes" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Research");
    assert_eq!(updated["description"], "notes");

    let (status, _) = send(h.app(), "DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(h.app(), &uri, Some(&alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_playbook_requires_name() {
    let h = Harness::new();
    let alice = h.session("alice");
    let (status, body) = send(
        h.app(),
        "POST",
        "/api/playbooks",
        Some(&alice),
        Some(json!({ "description": "no name" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn api_keys_cannot_manage_playbooks() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Kit", false).await;
    let key = h.key(&guid, vec![Permission::Full]);
    let (status, _) = get(h.app(), "/api/playbooks", Some(&key)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn issued_key_is_shown_once_and_revocable() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Kit", false).await;
    let keys_uri = format!("/api/playbooks/{guid}/api-keys");

    let (status, issued) = send(
        h.app(),
        "POST",
        &keys_uri,
        Some(&alice),
        Some(json!({ "name": "agent", "permissions": ["canvas:write"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = issued["key"].as_str().unwrap().to_string();
    assert!(token.starts_with("apb_live_"));
    assert_eq!(issued["permissions"], json!(["canvas:write"]));

    let (_, listing) = get(h.app(), &keys_uri, Some(&alice)).await;
    let text = listing.to_string();
    assert!(!text.contains(&token));
    assert!(!text.contains("key_hash"));
    assert_eq!(listing[0]["key_prefix"], &token[..12]);

    let canvas_uri = format!("/api/playbooks/{guid}/canvas");
    let (status, _) = send(
        h.app(),
        "POST",
        &canvas_uri,
        Some(&token),
        Some(json!({ "name": "Plan" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = issued["id"].as_str().unwrap();
    let (status, revoked) =
        send(h.app(), "DELETE", &format!("{keys_uri}/{id}"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revoked["is_active"], false);

    let (status, _) = get(h.app(), &canvas_uri, Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_permission_is_rejected() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Kit", false).await;
    let (status, body) = send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{guid}/api-keys"),
        Some(&alice),
        Some(json!({ "permissions": ["canvas:admin"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("canvas:admin"));
}

// ---------------------------------------------------------------------------
// Dual auth on content routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scoped_key_writes_its_playbook_only() {
    let h = Harness::new();
    let alice = h.session("alice");
    let g = h.playbook(&alice, "G", false).await;
    let other = h.playbook(&alice, "Other", false).await;
    let key = h.key(&g, vec![Permission::CanvasWrite]);

    let (status, body) = send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{g}/canvas"),
        Some(&key),
        Some(json!({ "name": "Plan", "content": "# Goals\nship" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["slug"], "plan");
    assert_eq!(body["sections"][0]["heading"], "Goals");

    let (status, body) = send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{other}/canvas"),
        Some(&key),
        Some(json!({ "name": "Plan" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, _) = send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{g}/memory"),
        Some(&key),
        Some(json!({ "key": "k", "value": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unauthenticated_writes_are_401() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Open", true).await;
    for (method, uri, body) in [
        ("POST", format!("/api/playbooks/{guid}/canvas"), Some(json!({ "name": "x" }))),
        ("POST", format!("/api/playbooks/{guid}/memory"), Some(json!({ "key": "k", "value": 1 }))),
        ("POST", format!("/api/playbooks/{guid}/personas"), Some(json!({ "name": "p", "system_prompt": "s" }))),
        ("DELETE", format!("/api/playbooks/{guid}/canvas/x"), None),
        // Incomplete or missing bodies must not leak a 400 before auth.
        ("POST", format!("/api/playbooks/{guid}/memory"), Some(json!({ "value": 1 }))),
        ("POST", format!("/api/playbooks/{guid}/memory"), None),
        ("PATCH", format!("/api/playbooks/{guid}/canvas/x/sections/s1"), Some(json!({}))),
        ("PUT", format!("/api/playbooks/{guid}/skills/not-a-uuid"), None),
        ("POST", format!("/api/playbooks/{guid}/api-keys"), None),
        ("POST", "/api/playbooks".to_string(), None),
    ] {
        let (status, _) = send(h.app(), method, &uri, None, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}

#[tokio::test]
async fn expired_key_is_401() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Kit", false).await;
    let playbook = h.store().get_playbook(&guid).unwrap();
    let (key, token) = ApiKey::issue(
        playbook.id,
        playbook.user_id,
        "stale",
        vec![Permission::Full],
        Some(chrono::Utc::now() - chrono::Duration::minutes(1)),
    );
    h.store().create_api_key(&key).unwrap();

    let (status, body) = get(h.app(), &format!("/api/playbooks/{guid}/canvas"), Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{guid}/memory"),
        Some(&token),
        Some(json!({ "key": "k", "value": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_session_is_401() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Kit", true).await;

    let (mut session, token) = Session::issue("alice", chrono::Duration::hours(1)).unwrap();
    session.expires_at = chrono::Utc::now() - chrono::Duration::minutes(1);
    h.store().create_session(&session).unwrap();
    let stale = format!("Bearer {token}");

    let (status, _) = get(h.app(), "/api/playbooks", Some(&stale)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{guid}/canvas"),
        Some(&stale),
        Some(json!({ "name": "Notes" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // Even where anonymous reads would pass, a stale credential is refused.
    let (status, _) = get(h.app(), &format!("/api/playbooks/{guid}/canvas"), Some(&stale)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn public_reads_are_anonymous_but_memory_is_not() {
    let h = Harness::new();
    let alice = h.session("alice");
    let open = h.playbook(&alice, "Open", true).await;
    let closed = h.playbook(&alice, "Closed", false).await;

    for guid in [&open, &closed] {
        let (status, _) = send(
            h.app(),
            "POST",
            &format!("/api/playbooks/{guid}/personas"),
            Some(&alice),
            Some(json!({ "name": "Reviewer", "system_prompt": "Be strict." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, personas) = get(h.app(), &format!("/api/playbooks/{open}/personas"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(personas[0]["name"], "Reviewer");

    let (status, _) = get(h.app(), &format!("/api/playbooks/{closed}/personas"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(h.app(), &format!("/api/playbooks/{open}/memory"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_skill_schema_is_400() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Kit", false).await;
    let uri = format!("/api/playbooks/{guid}/skills");

    let (status, body) = send(
        h.app(),
        "POST",
        &uri,
        Some(&alice),
        Some(json!({ "name": "bad", "definition": { "parameters": { "type": "string" } } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, skill) = send(
        h.app(),
        "POST",
        &uri,
        Some(&alice),
        Some(json!({
            "name": "lookup",
            "definition": { "parameters": { "type": "object", "properties": {} } }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = skill["id"].as_str().unwrap();
    let (status, updated) = send(
        h.app(),
        "PUT",
        &format!("{uri}/{id}"),
        Some(&alice),
        Some(json!({ "description": "Find a record" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "Find a record");

    let (status, _) = send(h.app(), "DELETE", &format!("{uri}/not-a-uuid"), Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_body_is_400_json() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Kit", false).await;
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(format!("/api/playbooks/{guid}/canvas"))
        .header("authorization", &alice)
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{nope"))
        .unwrap();
    let response = h.app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].is_string());
}

// ---------------------------------------------------------------------------
// Canvas and memory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn canvas_slug_conflict_and_section_patch() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Docs", false).await;
    let base = format!("/api/playbooks/{guid}/canvas");
    let doc = json!({
        "name": "Design",
        "content": "Intro text\n\n# Goals\nfast\n\n# Risks\nunknown"
    });

    let (status, created) = send(h.app(), "POST", &base, Some(&alice), Some(doc.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["sections"].as_array().unwrap().len(), 3);

    let (status, _) = send(h.app(), "POST", &base, Some(&alice), Some(doc)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, patched) = send(
        h.app(),
        "PATCH",
        &format!("{base}/design/sections/s3"),
        Some(&alice),
        Some(json!({ "content": "vendor lock-in" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["sections"][0]["content"], "Intro text");
    assert_eq!(patched["sections"][1]["content"], "fast");
    assert_eq!(patched["sections"][2]["content"], "vendor lock-in");

    let (status, _) = send(
        h.app(),
        "PATCH",
        &format!("{base}/design/sections/s9"),
        Some(&alice),
        Some(json!({ "content": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, fetched) = get(h.app(), &format!("{base}/design"), Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(fetched["content"].as_str().unwrap().contains("# Risks\n\nvendor lock-in"));

    let (status, _) = get(h.app(), &format!("{base}/missing"), Some(&alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn memory_upsert_and_search() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Mem", false).await;
    let key = h.key(&guid, vec![]);
    let base = format!("/api/playbooks/{guid}/memory");

    for (k, v, tags) in [
        ("deploy-target", json!("prod-eu"), json!(["infra"])),
        ("oncall", json!({ "name": "Sam" }), json!(["people"])),
    ] {
        let (status, _) = send(
            h.app(),
            "POST",
            &base,
            Some(&key),
            Some(json!({ "key": k, "value": v, "tags": tags })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, overwritten) = send(
        h.app(),
        "PUT",
        &format!("{base}/deploy-target"),
        Some(&key),
        Some(json!({ "value": "prod-us" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overwritten["value"], "prod-us");
    assert_eq!(overwritten["tags"], json!(["infra"]));

    let (_, all) = get(h.app(), &base, Some(&key)).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (_, found) = get(h.app(), &format!("{base}?search=SAM"), Some(&key)).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["key"], "oncall");

    let (_, tagged) = get(h.app(), &format!("{base}?tags=infra"), Some(&key)).await;
    assert_eq!(tagged[0]["key"], "deploy-target");

    let (status, _) = send(
        h.app(),
        "POST",
        &base,
        Some(&key),
        Some(json!({ "value": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(h.app(), "DELETE", &format!("{base}/oncall"), Some(&key), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(h.app(), &format!("{base}/oncall"), Some(&key)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Public directory and export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn public_directory_lists_only_public_playbooks() {
    let h = Harness::new();
    let alice = h.session("alice");
    let open = h.playbook(&alice, "Open", true).await;
    h.playbook(&alice, "Closed", false).await;

    let (status, list) = get(h.app(), "/api/public/playbooks", None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["guid"], open.as_str());
}

#[tokio::test]
async fn export_hides_memories_from_anonymous_readers() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Open", true).await;
    send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{guid}/memory"),
        Some(&alice),
        Some(json!({ "key": "secret", "value": "42" })),
    )
    .await;

    let uri = format!("/api/public/playbooks/{guid}");
    let (status, anon) = get(h.app(), &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anon["name"], "Open");
    assert!(anon.get("memories").is_none());

    let (_, owner) = get(h.app(), &uri, Some(&alice)).await;
    assert_eq!(owner["memories"][0]["key"], "secret");

    let (status, _) = get(h.app(), &format!("{uri}?format=yaml"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_is_limited_to_key_scopes() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Closed", false).await;
    let (status, _) = send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{guid}/canvas"),
        Some(&alice),
        Some(json!({ "name": "Private", "content": "# Private\nsecret body" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{guid}/memory"),
        Some(&alice),
        Some(json!({ "key": "note", "value": "kept" })),
    )
    .await;

    let memory_only = h.key(&guid, vec![Permission::MemoryRead]);
    let (status, _) = get(h.app(), &format!("/api/playbooks/{guid}/canvas"), Some(&memory_only)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/public/playbooks/{guid}");
    let (status, export) = get(h.app(), &uri, Some(&memory_only)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["canvas"], json!([]));
    assert_eq!(export["memories"][0]["key"], "note");
    assert!(!export.to_string().contains("secret body"));

    let (_, owner) = get(h.app(), &uri, Some(&alice)).await;
    assert_eq!(owner["canvas"][0]["slug"], "private");
}

#[tokio::test]
async fn export_as_markdown() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Handbook", true).await;
    let req = axum::http::Request::builder()
        .uri(format!("/api/public/playbooks/{guid}?format=markdown"))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = h.app().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ct = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(ct.starts_with("text/markdown"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8(body.to_vec()).unwrap().starts_with("# Handbook"));
}

#[tokio::test]
async fn private_export_requires_credentials() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Closed", false).await;
    let (status, _) = get(h.app(), &format!("/api/public/playbooks/{guid}"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = get(h.app(), "/api/public/playbooks/nosuchguid00", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// MCP endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mcp_initialize_list_and_call() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Agent", false).await;
    let key = h.key(&guid, vec![Permission::MemoryRead, Permission::MemoryWrite]);

    let (status, init) = rpc(
        h.app(),
        &guid,
        Some(&key),
        json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");

    let (_, list) = rpc(
        h.app(),
        &guid,
        Some(&key),
        json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }),
    )
    .await;
    assert_eq!(list["result"]["tools"].as_array().unwrap().len(), 7);

    let (_, call) = rpc(
        h.app(),
        &guid,
        Some(&key),
        json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": { "name": "write_memory", "arguments": { "key": "goal", "value": "ship" } }
        }),
    )
    .await;
    assert_eq!(call["result"]["isError"], false);
    let stored = h
        .store()
        .find::<playbooks_core::memory::Memory>(
            h.store().get_playbook(&guid).unwrap().id,
            "goal",
        )
        .unwrap()
        .unwrap();
    assert_eq!(stored.value, json!("ship"));

    let (_, denied) = rpc(
        h.app(),
        &guid,
        Some(&key),
        json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": { "name": "list_canvas", "arguments": {} }
        }),
    )
    .await;
    assert_eq!(denied["result"]["isError"], true);
}

#[tokio::test]
async fn mcp_requires_credentials_for_private_playbooks() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Agent", false).await;
    let other = h.playbook(&alice, "Other", false).await;
    let foreign = h.key(&other, vec![Permission::Full]);
    let msg = json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });

    let (status, body) = rpc(h.app(), &guid, None, msg.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = rpc(h.app(), &guid, Some(&foreign), msg).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn mcp_protocol_errors_and_notifications() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Agent", true).await;

    let (status, body) = rpc(
        h.app(),
        &guid,
        None,
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_null());

    let (_, body) = rpc(
        h.app(),
        &guid,
        None,
        json!({ "jsonrpc": "2.0", "id": 9, "method": "does/not/exist" }),
    )
    .await;
    assert_eq!(body["error"]["code"], -32601);

    let (_, body) = rpc(
        h.app(),
        &guid,
        None,
        json!({ "jsonrpc": "1.0", "id": 10, "method": "ping" }),
    )
    .await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], 10);

    let req = axum::http::Request::builder()
        .method("POST")
        .uri(format!("/api/mcp/{guid}"))
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{broken"))
        .unwrap();
    let response = h.app().oneshot(req).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], -32700);
}

#[tokio::test]
async fn mcp_manifest_lists_tools_and_skills() {
    let h = Harness::new();
    let alice = h.session("alice");
    let guid = h.playbook(&alice, "Agent", true).await;
    send(
        h.app(),
        "POST",
        &format!("/api/playbooks/{guid}/skills"),
        Some(&alice),
        Some(json!({ "name": "triage", "description": "Sort issues" })),
    )
    .await;

    let (status, manifest) = get(h.app(), &format!("/api/mcp/{guid}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(manifest["serverInfo"]["playbook"]["guid"], guid.as_str());
    let tools = manifest["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 8);
    assert_eq!(tools[7]["name"], "triage");
    assert_eq!(tools[7]["inputSchema"]["type"], "object");
}
