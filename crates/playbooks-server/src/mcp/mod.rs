//! Model Context Protocol over HTTP for a single playbook.
//!
//! Each `POST /api/mcp/{guid}` carries one JSON-RPC 2.0 message. Built-in
//! tools expose the playbook's memories and canvas documents; skills are
//! listed as tools too, but run on the client, so calling one returns their
//! definition instead of executing anything.

pub mod tools;

use playbooks_core::api_key::Permission;
use playbooks_core::canvas::Canvas;
use playbooks_core::playbook::Playbook;
use playbooks_core::skill::Skill;
use playbooks_core::Store;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::Principal;
use tools::PlaybookTool;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "agentplaybooks";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
/// Server-defined: the caller lacks the scope a method needs.
pub const FORBIDDEN: i32 = -32003;
pub const INTERNAL_ERROR: i32 = -32603;

const CANVAS_SCHEME: &str = "canvas://";

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ToolContent {
    r#type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ToolCallResult {
    content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl ToolCallResult {
    fn text(text: String, is_error: bool) -> Value {
        let result = Self {
            content: vec![ToolContent {
                r#type: "text",
                text,
            }],
            is_error,
        };
        serde_json::to_value(&result).unwrap_or_else(|e| json!({ "error": e.to_string() }))
    }
}

// ---------------------------------------------------------------------------
// Session context
// ---------------------------------------------------------------------------

/// Everything a request is evaluated against.
pub struct McpContext<'a> {
    pub store: &'a Store,
    pub playbook: &'a Playbook,
    pub principal: &'a Principal,
    pub tools: &'a [Box<dyn PlaybookTool>],
}

impl McpContext<'_> {
    fn permits(&self, permission: Permission) -> bool {
        self.principal.permits(permission, self.playbook)
    }

    /// Tool descriptors: built-ins first, then the playbook's skills.
    pub fn tool_list(&self) -> playbooks_core::Result<Vec<Value>> {
        let mut list: Vec<Value> = self
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "inputSchema": t.schema(),
                })
            })
            .collect();
        if self.permits(Permission::SkillsRead) {
            for skill in self.store.list::<Skill>(self.playbook.id)? {
                list.push(json!({
                    "name": skill.name,
                    "description": skill.description.clone().unwrap_or_default(),
                    "inputSchema": skill.input_schema(),
                }));
            }
        }
        Ok(list)
    }

    pub fn manifest(&self) -> playbooks_core::Result<Value> {
        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": server_info(self.playbook),
            "capabilities": capabilities(),
            "tools": self.tool_list()?,
        }))
    }
}

fn server_info(playbook: &Playbook) -> Value {
    json!({
        "name": SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "playbook": { "guid": playbook.guid, "name": playbook.name },
    })
}

fn capabilities() -> Value {
    json!({ "tools": {}, "resources": {} })
}

// ---------------------------------------------------------------------------
// Request dispatch
// ---------------------------------------------------------------------------

/// Answer one request. Storage failures become JSON-RPC internal errors.
pub fn handle_request(req: &JsonRpcRequest, ctx: &McpContext<'_>) -> JsonRpcResponse {
    let id = req.id.clone();
    match req.method.as_str() {
        "initialize" => JsonRpcResponse::ok(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": capabilities(),
                "serverInfo": server_info(ctx.playbook),
            }),
        ),

        "ping" => JsonRpcResponse::ok(id, json!({})),

        "tools/list" => match ctx.tool_list() {
            Ok(tools) => JsonRpcResponse::ok(id, json!({ "tools": tools })),
            Err(e) => JsonRpcResponse::err(id, INTERNAL_ERROR, e.to_string()),
        },

        "tools/call" => call_tool(req, ctx),

        "resources/list" => {
            if !ctx.permits(Permission::CanvasRead) {
                return JsonRpcResponse::err(id, FORBIDDEN, "missing 'canvas:read' permission");
            }
            match ctx.store.list::<Canvas>(ctx.playbook.id) {
                Ok(docs) => {
                    let resources: Vec<Value> = docs
                        .iter()
                        .map(|c| {
                            json!({
                                "uri": format!("{CANVAS_SCHEME}{}", c.slug),
                                "name": c.name,
                                "mimeType": "text/markdown",
                            })
                        })
                        .collect();
                    JsonRpcResponse::ok(id, json!({ "resources": resources }))
                }
                Err(e) => JsonRpcResponse::err(id, INTERNAL_ERROR, e.to_string()),
            }
        }

        "resources/read" => {
            let Some(uri) = req
                .params
                .as_ref()
                .and_then(|p| p["uri"].as_str())
            else {
                return JsonRpcResponse::err(id, INVALID_PARAMS, "missing resource uri in params");
            };
            let Some(slug) = uri.strip_prefix(CANVAS_SCHEME) else {
                return JsonRpcResponse::err(id, INVALID_PARAMS, format!("unknown resource: {uri}"));
            };
            if !ctx.permits(Permission::CanvasRead) {
                return JsonRpcResponse::err(id, FORBIDDEN, "missing 'canvas:read' permission");
            }
            match ctx.store.find::<Canvas>(ctx.playbook.id, slug) {
                Ok(Some(canvas)) => JsonRpcResponse::ok(
                    id,
                    json!({
                        "contents": [{
                            "uri": uri,
                            "mimeType": "text/markdown",
                            "text": canvas.content,
                        }]
                    }),
                ),
                Ok(None) => {
                    JsonRpcResponse::err(id, INVALID_PARAMS, format!("resource not found: {uri}"))
                }
                Err(e) => JsonRpcResponse::err(id, INTERNAL_ERROR, e.to_string()),
            }
        }

        other => JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("method not found: {other}")),
    }
}

fn call_tool(req: &JsonRpcRequest, ctx: &McpContext<'_>) -> JsonRpcResponse {
    let id = req.id.clone();
    let Some(params) = &req.params else {
        return JsonRpcResponse::err(id, INVALID_PARAMS, "missing params");
    };
    let Some(tool_name) = params["name"].as_str() else {
        return JsonRpcResponse::err(id, INVALID_PARAMS, "missing tool name in params");
    };
    let args = params.get("arguments").cloned().unwrap_or(Value::Null);

    if let Some(tool) = ctx.tools.iter().find(|t| t.name() == tool_name) {
        let required = tool.permission();
        let (text, is_error) = if !ctx.permits(required) {
            (format!("forbidden: '{tool_name}' requires '{required}' permission"), true)
        } else {
            match tool.call(args, ctx.store, ctx.playbook) {
                Ok(v) => (
                    serde_json::to_string_pretty(&v)
                        .unwrap_or_else(|e| format!("serialization error: {e}")),
                    false,
                ),
                Err(e) => (e, true),
            }
        };
        tracing::debug!(tool = tool_name, principal = %ctx.principal.label(), is_error, "mcp tool call");
        return JsonRpcResponse::ok(id, ToolCallResult::text(text, is_error));
    }

    if !ctx.permits(Permission::SkillsRead) {
        return JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("tool not found: {tool_name}"));
    }
    match ctx.store.list::<Skill>(ctx.playbook.id) {
        Ok(skills) => match skills.into_iter().find(|s| s.name == tool_name) {
            Some(skill) => {
                let text = serde_json::to_string_pretty(&json!({
                    "skill": skill.name,
                    "description": skill.description,
                    "definition": skill.definition,
                    "examples": skill.examples,
                    "arguments": args,
                }))
                .unwrap_or_else(|e| format!("serialization error: {e}"));
                JsonRpcResponse::ok(id, ToolCallResult::text(text, false))
            }
            None => {
                JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("tool not found: {tool_name}"))
            }
        },
        Err(e) => JsonRpcResponse::err(id, INTERNAL_ERROR, e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use playbooks_core::api_key::ApiKey;
    use playbooks_core::canvas::CanvasInput;
    use playbooks_core::playbook::PlaybookInput;
    use playbooks_core::skill::SkillInput;
    use tempfile::TempDir;

    fn setup(public: bool) -> (TempDir, Store, Playbook) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("t.redb")).unwrap();
        let playbook = Playbook::create(
            "owner",
            PlaybookInput {
                name: Some("Ops".into()),
                is_public: Some(public),
                ..Default::default()
            },
        )
        .unwrap();
        store.create_playbook(&playbook).unwrap();
        store
            .create(
                &Canvas::create(
                    playbook.id,
                    CanvasInput {
                        name: Some("Runbook".into()),
                        content: Some("# Deploy\nship it\n\n# Rollback\nrevert".into()),
                        ..Default::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();
        store
            .create(
                &Skill::create(
                    playbook.id,
                    SkillInput {
                        name: Some("summarize".into()),
                        description: Some("Summarize text".into()),
                        definition: Some(json!({
                            "parameters": {
                                "type": "object",
                                "properties": { "text": { "type": "string" } }
                            }
                        })),
                        ..Default::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();
        (dir, store, playbook)
    }

    fn make_req(id: i64, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(Value::Number(id.into())),
            method: method.to_string(),
            params,
        }
    }

    fn owner() -> Principal {
        Principal::User("owner".into())
    }

    fn run(store: &Store, pb: &Playbook, who: &Principal, req: JsonRpcRequest) -> JsonRpcResponse {
        let tools = tools::builtin_tools();
        let ctx = McpContext {
            store,
            playbook: pb,
            principal: who,
            tools: &tools,
        };
        handle_request(&req, &ctx)
    }

    #[test]
    fn initialize_returns_capabilities() {
        let (_dir, store, pb) = setup(false);
        let resp = run(&store, &pb, &owner(), make_req(1, "initialize", Some(json!({}))));
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
    }

    #[test]
    fn tools_list_has_builtins_then_skills() {
        let (_dir, store, pb) = setup(false);
        let resp = run(&store, &pb, &owner(), make_req(2, "tools/list", None));
        let result = resp.result.unwrap();
        let names: Vec<&str> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "read_memory");
        assert!(names.contains(&"update_canvas_section"));
        assert_eq!(*names.last().unwrap(), "summarize");
        assert_eq!(
            result["tools"][7]["inputSchema"]["properties"]["text"]["type"],
            "string"
        );
    }

    #[test]
    fn write_then_read_memory_through_tools() {
        let (_dir, store, pb) = setup(false);
        let write = run(
            &store,
            &pb,
            &owner(),
            make_req(
                3,
                "tools/call",
                Some(json!({
                    "name": "write_memory",
                    "arguments": { "key": "region", "value": "eu-west-1", "tags": ["infra"] }
                })),
            ),
        );
        assert_eq!(write.result.unwrap()["isError"], false);

        let read = run(
            &store,
            &pb,
            &owner(),
            make_req(
                4,
                "tools/call",
                Some(json!({ "name": "read_memory", "arguments": { "key": "region" } })),
            ),
        );
        let result = read.result.unwrap();
        assert_eq!(result["isError"], false);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("eu-west-1"));
    }

    #[test]
    fn scoped_key_cannot_call_write_tool_outside_its_scope() {
        let (_dir, store, pb) = setup(false);
        let (key, _) = ApiKey::issue(pb.id, "owner", "k", vec![Permission::MemoryRead], None);
        let who = Principal::ApiKey(Box::new(key));
        let resp = run(
            &store,
            &pb,
            &who,
            make_req(
                5,
                "tools/call",
                Some(json!({
                    "name": "update_canvas_section",
                    "arguments": { "slug": "runbook", "section_id": "s1", "content": "x" }
                })),
            ),
        );
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("canvas:write"));
    }

    #[test]
    fn anonymous_on_public_playbook_reads_canvas_but_not_memory() {
        let (_dir, store, pb) = setup(true);
        let anon = Principal::Anonymous;
        let resources = run(&store, &pb, &anon, make_req(6, "resources/list", None));
        let result = resources.result.unwrap();
        assert_eq!(result["resources"][0]["uri"], "canvas://runbook");

        let read = run(
            &store,
            &pb,
            &anon,
            make_req(7, "resources/read", Some(json!({ "uri": "canvas://runbook" }))),
        );
        let result = read.result.unwrap();
        assert_eq!(result["contents"][0]["mimeType"], "text/markdown");
        assert!(result["contents"][0]["text"].as_str().unwrap().contains("# Rollback"));

        let memory = run(
            &store,
            &pb,
            &anon,
            make_req(
                8,
                "tools/call",
                Some(json!({ "name": "search_memory", "arguments": {} })),
            ),
        );
        assert_eq!(memory.result.unwrap()["isError"], true);
    }

    #[test]
    fn calling_a_skill_returns_its_definition() {
        let (_dir, store, pb) = setup(false);
        let resp = run(
            &store,
            &pb,
            &owner(),
            make_req(
                9,
                "tools/call",
                Some(json!({ "name": "summarize", "arguments": { "text": "hi" } })),
            ),
        );
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("Summarize text"));
    }

    #[test]
    fn unknown_tool_and_method_are_not_found() {
        let (_dir, store, pb) = setup(false);
        let resp = run(
            &store,
            &pb,
            &owner(),
            make_req(10, "tools/call", Some(json!({ "name": "nope" }))),
        );
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);

        let resp = run(&store, &pb, &owner(), make_req(11, "bogus/method", None));
        let err = resp.error.unwrap();
        assert_eq!(err.code, METHOD_NOT_FOUND);
        assert!(err.message.contains("method not found"));
    }

    #[test]
    fn tools_call_missing_params_is_invalid() {
        let (_dir, store, pb) = setup(false);
        let resp = run(&store, &pb, &owner(), make_req(12, "tools/call", None));
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
        let resp = run(&store, &pb, &owner(), make_req(13, "resources/read", Some(json!({}))));
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }
}
