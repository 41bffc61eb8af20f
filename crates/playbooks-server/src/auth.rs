//! Request authorization against a playbook.
//!
//! Two credential kinds are accepted, checked in order:
//! 1. API key (`X-API-Key: apb_live_…` or `Authorization: Bearer apb_live_…`):
//!    must exist, be active and unexpired (else 401), belong to the target
//!    playbook (else 403), and carry the required permission (else 403).
//! 2. Session (`Authorization: Bearer <token>` or cookie `apb_session`):
//!    must exist and be unexpired (else 401) and its user must own the
//!    playbook (else 403).
//!
//! With no credentials the request is 401, except anonymous reads of public
//! playbooks where the route allows them.

use axum::http::{header, HeaderMap};
use chrono::Utc;
use playbooks_core::api_key::{hash_token, is_api_key_token, ApiKey, Permission};
use playbooks_core::playbook::Playbook;
use playbooks_core::session::SESSION_COOKIE;
use playbooks_core::Store;

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    Session(String),
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    let prefix = format!("{SESSION_COOKIE}=");
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|part| part.trim().strip_prefix(prefix.as_str()))
        .filter(|v| !v.is_empty())
}

/// Pull the credential a request carries, if any.
pub fn extract_credential(headers: &HeaderMap) -> Option<Credential> {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        let key = key.trim();
        if !key.is_empty() {
            return Some(Credential::ApiKey(key.to_string()));
        }
    }
    if let Some(token) = bearer(headers) {
        return Some(if is_api_key_token(token) {
            Credential::ApiKey(token.to_string())
        } else {
            Credential::Session(token.to_string())
        });
    }
    session_cookie(headers).map(|t| Credential::Session(t.to_string()))
}

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// Who a request was authorized as.
#[derive(Debug, Clone)]
pub enum Principal {
    ApiKey(Box<ApiKey>),
    User(String),
    Anonymous,
}

impl Principal {
    /// Owner sessions hold every permission; keys hold what they were granted.
    pub fn grants(&self, permission: Permission, playbook: &Playbook) -> bool {
        match self {
            Principal::ApiKey(key) => key.playbook_id == playbook.id && key.grants(permission),
            Principal::User(user) => playbook.is_owned_by(user),
            Principal::Anonymous => false,
        }
    }

    /// `grants`, widened by what a public playbook shows to everyone.
    pub fn permits(&self, permission: Permission, playbook: &Playbook) -> bool {
        self.grants(permission, playbook) || (playbook.is_public && is_public_scope(permission))
    }

    pub fn label(&self) -> String {
        match self {
            Principal::ApiKey(key) => format!("key:{}", key.key_prefix),
            Principal::User(user) => format!("user:{user}"),
            Principal::Anonymous => "anonymous".to_string(),
        }
    }
}

fn verify_api_key(store: &Store, token: &str) -> Result<ApiKey, AppError> {
    let Some(key) = store.find_api_key(&hash_token(token))? else {
        tracing::warn!("rejected unknown api key");
        return Err(AppError::unauthorized("invalid API key"));
    };
    let now = Utc::now();
    if let Err(e) = key.check_usable(now) {
        tracing::warn!(key = %key.key_prefix, "rejected unusable api key");
        return Err(AppError::unauthorized(format!("API key rejected: {e}")));
    }
    store.touch_api_key(&key, now)?;
    Ok(key)
}

fn verify_session(store: &Store, token: &str) -> Result<String, AppError> {
    let Some(session) = store.find_session(&hash_token(token))? else {
        tracing::warn!("rejected unknown session");
        return Err(AppError::unauthorized("invalid session"));
    };
    if session.check_usable(Utc::now()).is_err() {
        return Err(AppError::unauthorized("session expired"));
    }
    Ok(session.user_id)
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Whether anonymous callers may pass when the playbook is public.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    PublicRead,
    Private,
}

/// Scopes whose contents are visible to anyone on a public playbook.
/// Memories stay private even then.
pub fn is_public_scope(permission: Permission) -> bool {
    matches!(
        permission,
        Permission::CanvasRead
            | Permission::SkillsRead
            | Permission::PersonasRead
            | Permission::McpRead
    )
}

/// Resolve who is calling, without checking any permission.
///
/// Invalid credentials are always 401. A valid credential for someone else's
/// playbook is 403, or `Anonymous` when `access` allows public reads and the
/// playbook is public.
pub fn identify(
    store: &Store,
    headers: &HeaderMap,
    playbook: &Playbook,
    access: Access,
) -> Result<Principal, AppError> {
    let public_read = access == Access::PublicRead && playbook.is_public;

    match extract_credential(headers) {
        Some(Credential::ApiKey(token)) => {
            let key = verify_api_key(store, &token)?;
            if key.playbook_id != playbook.id {
                if public_read {
                    return Ok(Principal::Anonymous);
                }
                return Err(AppError::forbidden("API key is not valid for this playbook"));
            }
            Ok(Principal::ApiKey(Box::new(key)))
        }
        Some(Credential::Session(token)) => {
            let user = verify_session(store, &token)?;
            if !playbook.is_owned_by(&user) {
                if public_read {
                    return Ok(Principal::Anonymous);
                }
                return Err(AppError::forbidden("you do not own this playbook"));
            }
            Ok(Principal::User(user))
        }
        None if public_read => Ok(Principal::Anonymous),
        None => Err(AppError::unauthorized("authentication required")),
    }
}

/// Authorize `headers` for `required` on `playbook`.
pub fn authorize(
    store: &Store,
    headers: &HeaderMap,
    playbook: &Playbook,
    required: Permission,
    access: Access,
) -> Result<Principal, AppError> {
    let principal = identify(store, headers, playbook, access)?;
    match &principal {
        Principal::ApiKey(key) if !key.grants(required) => {
            if access == Access::PublicRead && playbook.is_public {
                return Ok(Principal::Anonymous);
            }
            Err(AppError::forbidden(format!(
                "API key lacks '{required}' permission"
            )))
        }
        Principal::Anonymous => Ok(principal),
        _ => {
            tracing::debug!(
                guid = %playbook.guid,
                principal = %principal.label(),
                %required,
                "authorized"
            );
            Ok(principal)
        }
    }
}

/// Resolve the signed-in user for management routes. API keys are refused.
pub fn require_session(store: &Store, headers: &HeaderMap) -> Result<String, AppError> {
    match extract_credential(headers) {
        Some(Credential::Session(token)) => verify_session(store, &token),
        Some(Credential::ApiKey(_)) => Err(AppError::forbidden(
            "API keys cannot manage playbooks; sign in instead",
        )),
        None => Err(AppError::unauthorized("authentication required")),
    }
}

/// Load `guid` and check the session user owns it.
pub fn require_owner(
    store: &Store,
    headers: &HeaderMap,
    guid: &str,
) -> Result<(Playbook, String), AppError> {
    let user = require_session(store, headers)?;
    let playbook = store.get_playbook(guid)?;
    if !playbook.is_owned_by(&user) {
        return Err(AppError::forbidden("you do not own this playbook"));
    }
    Ok((playbook, user))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
