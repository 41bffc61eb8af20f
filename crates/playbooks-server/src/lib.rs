pub mod auth;
pub mod error;
pub mod mcp;
pub mod routes;
pub mod state;

use std::path::Path;

use axum::http::HeaderValue;
use axum::routing::{delete, get, patch, put};
use axum::Router;
use playbooks_core::config::Config;
use playbooks_core::mcp_server::McpServer;
use playbooks_core::persona::Persona;
use playbooks_core::skill::Skill;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::content;

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let allow_origin = if origins.is_empty() || config.server.cors_origins.iter().any(|o| o == "*")
    {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        // Health
        .route("/api/health", get(routes::health::health))
        // Playbooks (session only)
        .route(
            "/api/playbooks",
            get(routes::playbooks::list_playbooks).post(routes::playbooks::create_playbook),
        )
        .route(
            "/api/playbooks/{guid}",
            get(routes::playbooks::get_playbook)
                .put(routes::playbooks::update_playbook)
                .delete(routes::playbooks::delete_playbook),
        )
        // API keys (session only)
        .route(
            "/api/playbooks/{guid}/api-keys",
            get(routes::api_keys::list_keys).post(routes::api_keys::create_key),
        )
        .route(
            "/api/playbooks/{guid}/api-keys/{id}",
            delete(routes::api_keys::revoke_key),
        )
        // Personas
        .route(
            "/api/playbooks/{guid}/personas",
            get(content::list::<Persona>).post(content::create::<Persona>),
        )
        .route(
            "/api/playbooks/{guid}/personas/{id}",
            put(content::update::<Persona>).delete(content::delete::<Persona>),
        )
        // Skills
        .route(
            "/api/playbooks/{guid}/skills",
            get(content::list::<Skill>).post(content::create::<Skill>),
        )
        .route(
            "/api/playbooks/{guid}/skills/{id}",
            put(content::update::<Skill>).delete(content::delete::<Skill>),
        )
        // MCP server descriptors
        .route(
            "/api/playbooks/{guid}/mcp-servers",
            get(content::list::<McpServer>).post(content::create::<McpServer>),
        )
        .route(
            "/api/playbooks/{guid}/mcp-servers/{id}",
            put(content::update::<McpServer>).delete(content::delete::<McpServer>),
        )
        // Canvas
        .route(
            "/api/playbooks/{guid}/canvas",
            get(routes::canvas::list_canvas).post(routes::canvas::create_canvas),
        )
        .route(
            "/api/playbooks/{guid}/canvas/{slug}",
            get(routes::canvas::get_canvas)
                .put(routes::canvas::update_canvas)
                .delete(routes::canvas::delete_canvas),
        )
        .route(
            "/api/playbooks/{guid}/canvas/{slug}/sections/{section_id}",
            patch(routes::canvas::patch_section),
        )
        // Memory
        .route(
            "/api/playbooks/{guid}/memory",
            get(routes::memory::list_memories).post(routes::memory::write_memory),
        )
        .route(
            "/api/playbooks/{guid}/memory/{key}",
            get(routes::memory::get_memory)
                .put(routes::memory::put_memory)
                .delete(routes::memory::delete_memory),
        )
        // Public directory
        .route("/api/public/playbooks", get(routes::public::list_public))
        .route("/api/public/playbooks/{guid}", get(routes::public::get_public))
        // MCP
        .route(
            "/api/mcp/{guid}",
            get(routes::mcp::manifest).post(routes::mcp::rpc),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Open the store under `data_dir` and serve on the configured address.
pub async fn serve(data_dir: &Path, config: Config) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let app_state = state::AppState::open(data_dir, config)?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(listener, app_state).await
}

/// Serve on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    app_state: state::AppState,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(app_state);

    tracing::info!("AgentPlaybooks API listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
