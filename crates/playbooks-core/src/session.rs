use crate::api_key::{hash_token, random_suffix};
use crate::error::{PlaybookError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const SESSION_PREFIX: &str = "apb_sess_";
pub const SESSION_COOKIE: &str = "apb_session";

/// A signed-in user. Only the token hash is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Start a session for `user_id`. Returns the record and the plaintext token.
    pub fn issue(user_id: impl Into<String>, ttl: Duration) -> Result<(Self, String)> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(PlaybookError::MissingField("user_id"));
        }
        if ttl <= Duration::zero() {
            return Err(PlaybookError::InvalidTtl("must be positive".into()));
        }
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| {
                PlaybookError::InvalidTtl(format!("{} hours is too long", ttl.num_hours()))
            })?;
        let token = format!("{SESSION_PREFIX}{}", random_suffix(40));
        let session = Self {
            token_hash: hash_token(&token),
            user_id,
            created_at: now,
            expires_at,
        };
        Ok((session, token))
    }

    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<()> {
        if self.expires_at <= now {
            return Err(PlaybookError::CredentialsExpired);
        }
        Ok(())
    }
}
