use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use playbooks_core::export::{ExportScope, PublicPlaybook};
use playbooks_core::playbook::Playbook;
use serde::{Deserialize, Serialize};

use crate::auth::{self, Access};
use crate::error::AppError;
use crate::state::{blocking, AppState};

#[derive(Deserialize, Default)]
pub struct ExportParams {
    pub format: Option<String>,
}

/// Entry in the public directory.
#[derive(Serialize)]
pub struct PublicSummary {
    pub guid: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Playbook> for PublicSummary {
    fn from(p: Playbook) -> Self {
        Self {
            guid: p.guid,
            name: p.name,
            description: p.description,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// GET /api/public/playbooks — public playbooks, newest first.
pub async fn list_public(State(app): State<AppState>) -> Result<Json<Vec<PublicSummary>>, AppError> {
    let store = app.store.clone();
    blocking(move || {
        let playbooks = store.list_public_playbooks()?;
        Ok(Json(playbooks.into_iter().map(PublicSummary::from).collect()))
    })
    .await
}

/// GET /api/public/playbooks/{guid}?format=json|markdown
///
/// Private playbooks are visible to their owner or a key bound to them.
/// Each collection is included only when the caller may read it, so a key
/// sees exactly what its scopes open on the content routes.
pub async fn get_public(
    State(app): State<AppState>,
    Path(guid): Path<String>,
    Query(params): Query<ExportParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let markdown = match params.format.as_deref() {
        None | Some("json") => false,
        Some("markdown") | Some("md") => true,
        Some(other) => {
            return Err(AppError::bad_request(format!(
                "unsupported format '{other}'; use json or markdown"
            )))
        }
    };
    let store = app.store.clone();
    let export = blocking(move || {
        let playbook = store.get_playbook(&guid)?;
        let principal = auth::identify(&store, &headers, &playbook, Access::PublicRead)?;
        let scope = ExportScope::from_permits(|p| principal.permits(p, &playbook));
        Ok(PublicPlaybook::load(&store, &playbook, scope)?)
    })
    .await?;

    if markdown {
        Ok((
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            export.to_markdown(),
        )
            .into_response())
    } else {
        Ok(Json(export).into_response())
    }
}
