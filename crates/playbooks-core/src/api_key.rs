//! Playbook-scoped API keys.
//!
//! Tokens look like `apb_live_<32 alphanumerics>`. Only the SHA-256 hex
//! digest of a token is persisted; the plaintext is shown once at creation.

use crate::error::{PlaybookError, Result};
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const API_KEY_PREFIX: &str = "apb_live_";
const TOKEN_RANDOM_LEN: usize = 32;
const DISPLAY_PREFIX_LEN: usize = 12;

// ---------------------------------------------------------------------------
// Permission
// ---------------------------------------------------------------------------

/// What a key may touch inside its playbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    MemoryRead,
    MemoryWrite,
    CanvasRead,
    CanvasWrite,
    SkillsRead,
    SkillsWrite,
    PersonasRead,
    PersonasWrite,
    McpRead,
    McpWrite,
    Full,
}

impl Permission {
    pub fn all() -> &'static [Permission] {
        &[
            Permission::MemoryRead,
            Permission::MemoryWrite,
            Permission::CanvasRead,
            Permission::CanvasWrite,
            Permission::SkillsRead,
            Permission::SkillsWrite,
            Permission::PersonasRead,
            Permission::PersonasWrite,
            Permission::McpRead,
            Permission::McpWrite,
            Permission::Full,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::MemoryRead => "memory:read",
            Permission::MemoryWrite => "memory:write",
            Permission::CanvasRead => "canvas:read",
            Permission::CanvasWrite => "canvas:write",
            Permission::SkillsRead => "skills:read",
            Permission::SkillsWrite => "skills:write",
            Permission::PersonasRead => "personas:read",
            Permission::PersonasWrite => "personas:write",
            Permission::McpRead => "mcp:read",
            Permission::McpWrite => "mcp:write",
            Permission::Full => "full",
        }
    }

    /// Permissions granted to a key created without an explicit list.
    pub fn defaults() -> Vec<Permission> {
        vec![Permission::MemoryRead, Permission::MemoryWrite]
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = PlaybookError;

    fn from_str(s: &str) -> Result<Self> {
        Permission::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| PlaybookError::InvalidPermission(s.to_string()))
    }
}

impl TryFrom<String> for Permission {
    type Error = PlaybookError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.as_str().to_string()
    }
}

/// Parse a list of permission strings, rejecting unknown entries.
pub fn parse_permissions<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Permission>> {
    let mut out = Vec::with_capacity(raw.len());
    for s in raw {
        let p: Permission = s.as_ref().trim().parse()?;
        if !out.contains(&p) {
            out.push(p);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Lowercase hex SHA-256 of `token`.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Random alphanumeric string appended to a token prefix.
pub(crate) fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

pub fn generate_token() -> String {
    format!("{API_KEY_PREFIX}{}", random_suffix(TOKEN_RANDOM_LEN))
}

pub fn is_api_key_token(token: &str) -> bool {
    token.starts_with(API_KEY_PREFIX)
}

// ---------------------------------------------------------------------------
// ApiKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub playbook_id: Uuid,
    pub user_id: String,
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Mint a new key. Returns the record to persist and the plaintext token.
    pub fn issue(
        playbook_id: Uuid,
        user_id: impl Into<String>,
        name: impl Into<String>,
        permissions: Vec<Permission>,
        expires_at: Option<DateTime<Utc>>,
    ) -> (Self, String) {
        let token = generate_token();
        let key = Self {
            id: Uuid::new_v4(),
            playbook_id,
            user_id: user_id.into(),
            name: name.into(),
            key_hash: hash_token(&token),
            key_prefix: token[..DISPLAY_PREFIX_LEN].to_string(),
            permissions: if permissions.is_empty() {
                Permission::defaults()
            } else {
                permissions
            },
            is_active: true,
            expires_at,
            last_used_at: None,
            created_at: Utc::now(),
        };
        (key, token)
    }

    /// `full` implies every other permission.
    pub fn grants(&self, required: Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| *p == Permission::Full || *p == required)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Usable right now: active and not past its expiry.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<()> {
        if !self.is_active {
            return Err(PlaybookError::InvalidCredentials);
        }
        if self.is_expired(now) {
            return Err(PlaybookError::CredentialsExpired);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
