//! Persistent storage for playbooks and their contents using redb.
//!
//! # Table design
//!
//! Every table maps a UTF-8 key to a JSON-encoded record.
//!
//! ```text
//! playbooks    guid                     -> Playbook
//! personas     {playbook_id}/{id}       -> Persona
//! skills       {playbook_id}/{id}       -> Skill
//! mcp_servers  {playbook_id}/{id}       -> McpServer
//! canvases     {playbook_id}/{slug}     -> Canvas
//! memories     {playbook_id}/{key}      -> Memory
//! api_keys     key_hash                 -> ApiKey
//! sessions     token_hash               -> Session
//! ```
//!
//! Child records share the `{playbook_id}/` prefix, so listing a playbook's
//! contents is a single range scan and deleting a playbook removes every
//! child in the same write transaction.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::api_key::ApiKey;
use crate::canvas::Canvas;
use crate::error::{PlaybookError, Result};
use crate::mcp_server::McpServer;
use crate::memory::{Memory, MemoryQuery};
use crate::persona::Persona;
use crate::playbook::Playbook;
use crate::session::Session;
use crate::skill::Skill;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

pub type Table = TableDefinition<'static, &'static str, &'static [u8]>;

const PLAYBOOKS: Table = TableDefinition::new("playbooks");
const PERSONAS: Table = TableDefinition::new("personas");
const SKILLS: Table = TableDefinition::new("skills");
const MCP_SERVERS: Table = TableDefinition::new("mcp_servers");
const CANVASES: Table = TableDefinition::new("canvases");
const MEMORIES: Table = TableDefinition::new("memories");
const API_KEYS: Table = TableDefinition::new("api_keys");
const SESSIONS: Table = TableDefinition::new("sessions");

const CHILD_TABLES: [Table; 5] = [PERSONAS, SKILLS, MCP_SERVERS, CANVASES, MEMORIES];

fn db_err<E: std::fmt::Display>(e: E) -> PlaybookError {
    PlaybookError::Database(e.to_string())
}

fn child_prefix(playbook_id: Uuid) -> String {
    format!("{playbook_id}/")
}

fn child_key(playbook_id: Uuid, local: &str) -> String {
    format!("{playbook_id}/{local}")
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A row owned by a playbook and stored under `{playbook_id}/{local_key}`.
pub trait Record: Serialize + DeserializeOwned + Sized {
    const TABLE: Table;

    fn playbook_id(&self) -> Uuid;
    fn local_key(&self) -> String;
    fn not_found(local_key: &str) -> PlaybookError;

    fn already_exists(local_key: &str) -> PlaybookError {
        PlaybookError::Database(format!("duplicate key: {local_key}"))
    }

    /// Listing order.
    fn sort(items: &mut [Self]);
}

impl Record for Persona {
    const TABLE: Table = PERSONAS;

    fn playbook_id(&self) -> Uuid {
        self.playbook_id
    }
    fn local_key(&self) -> String {
        self.id.to_string()
    }
    fn not_found(local_key: &str) -> PlaybookError {
        PlaybookError::PersonaNotFound(local_key.to_string())
    }
    fn sort(items: &mut [Self]) {
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }
}

impl Record for Skill {
    const TABLE: Table = SKILLS;

    fn playbook_id(&self) -> Uuid {
        self.playbook_id
    }
    fn local_key(&self) -> String {
        self.id.to_string()
    }
    fn not_found(local_key: &str) -> PlaybookError {
        PlaybookError::SkillNotFound(local_key.to_string())
    }
    fn sort(items: &mut [Self]) {
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }
}

impl Record for McpServer {
    const TABLE: Table = MCP_SERVERS;

    fn playbook_id(&self) -> Uuid {
        self.playbook_id
    }
    fn local_key(&self) -> String {
        self.id.to_string()
    }
    fn not_found(local_key: &str) -> PlaybookError {
        PlaybookError::McpServerNotFound(local_key.to_string())
    }
    fn sort(items: &mut [Self]) {
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }
}

impl Record for Canvas {
    const TABLE: Table = CANVASES;

    fn playbook_id(&self) -> Uuid {
        self.playbook_id
    }
    fn local_key(&self) -> String {
        self.slug.clone()
    }
    fn not_found(local_key: &str) -> PlaybookError {
        PlaybookError::CanvasNotFound(local_key.to_string())
    }
    fn already_exists(local_key: &str) -> PlaybookError {
        PlaybookError::CanvasExists(local_key.to_string())
    }
    fn sort(items: &mut [Self]) {
        items.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.slug.cmp(&b.slug))
        });
    }
}

impl Record for Memory {
    const TABLE: Table = MEMORIES;

    fn playbook_id(&self) -> Uuid {
        self.playbook_id
    }
    fn local_key(&self) -> String {
        self.key.clone()
    }
    fn not_found(local_key: &str) -> PlaybookError {
        PlaybookError::MemoryNotFound(local_key.to_string())
    }
    /// Most recently touched first.
    fn sort(items: &mut [Self]) {
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Embedded database holding every playbook, its contents, and credentials.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the database at `path`, creating all tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let database = Database::create(path).map_err(db_err)?;
        let wt = database.begin_write().map_err(db_err)?;
        for table in [PLAYBOOKS, API_KEYS, SESSIONS]
            .into_iter()
            .chain(CHILD_TABLES)
        {
            wt.open_table(table).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        tracing::debug!(path = %path.display(), "opened playbook store");
        Ok(Self { db: database })
    }

    // -----------------------------------------------------------------------
    // Raw key/value helpers
    // -----------------------------------------------------------------------

    fn read<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<Option<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(table).map_err(db_err)?;
        let found = t.get(key).map_err(db_err)?;
        let record = match found {
            Some(guard) => Some(serde_json::from_slice(guard.value())?),
            None => None,
        };
        Ok(record)
    }

    fn write<T: Serialize>(&self, table: Table, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut t = wt.open_table(table).map_err(db_err)?;
            t.insert(key, bytes.as_slice()).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    /// Insert only if `key` is vacant. Returns `false` when it was taken.
    fn write_new<T: Serialize>(&self, table: Table, key: &str, value: &T) -> Result<bool> {
        let bytes = serde_json::to_vec(value)?;
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut t = wt.open_table(table).map_err(db_err)?;
            if t.get(key).map_err(db_err)?.is_some() {
                return Ok(false);
            }
            t.insert(key, bytes.as_slice()).map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(true)
    }

    fn remove(&self, table: Table, key: &str) -> Result<bool> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut t = wt.open_table(table).map_err(db_err)?;
            let existed = t.remove(key).map_err(db_err)?.is_some();
            existed
        };
        wt.commit().map_err(db_err)?;
        Ok(removed)
    }

    /// All values whose key starts with `prefix` (empty prefix = whole table).
    fn scan<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> Result<Vec<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let t = rt.open_table(table).map_err(db_err)?;
        let mut out = Vec::new();
        for entry in t.range(prefix..).map_err(db_err)? {
            let (k, v) = entry.map_err(db_err)?;
            if !k.value().starts_with(prefix) {
                break;
            }
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Playbooks
    // -----------------------------------------------------------------------

    pub fn create_playbook(&self, playbook: &Playbook) -> Result<()> {
        if !self.write_new(PLAYBOOKS, &playbook.guid, playbook)? {
            return Err(PlaybookError::PlaybookExists(playbook.guid.clone()));
        }
        tracing::info!(guid = %playbook.guid, user = %playbook.user_id, "playbook created");
        Ok(())
    }

    pub fn get_playbook(&self, guid: &str) -> Result<Playbook> {
        self.read(PLAYBOOKS, guid)?
            .ok_or_else(|| PlaybookError::PlaybookNotFound(guid.to_string()))
    }

    pub fn save_playbook(&self, playbook: &Playbook) -> Result<()> {
        self.write(PLAYBOOKS, &playbook.guid, playbook)
    }

    pub fn list_playbooks_for_user(&self, user_id: &str) -> Result<Vec<Playbook>> {
        let mut all: Vec<Playbook> = self.scan(PLAYBOOKS, "")?;
        all.retain(|p| p.is_owned_by(user_id));
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    /// Public playbooks, newest first.
    pub fn list_public_playbooks(&self) -> Result<Vec<Playbook>> {
        let mut all: Vec<Playbook> = self.scan(PLAYBOOKS, "")?;
        all.retain(|p| p.is_public);
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    /// Delete a playbook with all of its contents and API keys.
    pub fn delete_playbook(&self, guid: &str) -> Result<()> {
        let playbook = self.get_playbook(guid)?;
        let prefix = child_prefix(playbook.id);
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut t = wt.open_table(PLAYBOOKS).map_err(db_err)?;
            t.remove(guid).map_err(db_err)?;
        }
        for table in CHILD_TABLES {
            let mut t = wt.open_table(table).map_err(db_err)?;
            let mut keys = Vec::new();
            for entry in t.range(prefix.as_str()..).map_err(db_err)? {
                let (k, _) = entry.map_err(db_err)?;
                let key = k.value().to_string();
                if !key.starts_with(&prefix) {
                    break;
                }
                keys.push(key);
            }
            for key in keys {
                t.remove(key.as_str()).map_err(db_err)?;
            }
        }
        {
            let mut t = wt.open_table(API_KEYS).map_err(db_err)?;
            let mut hashes = Vec::new();
            for entry in t.iter().map_err(db_err)? {
                let (k, v) = entry.map_err(db_err)?;
                let key: ApiKey = serde_json::from_slice(v.value())?;
                if key.playbook_id == playbook.id {
                    hashes.push(k.value().to_string());
                }
            }
            for hash in hashes {
                t.remove(hash.as_str()).map_err(db_err)?;
            }
        }
        wt.commit().map_err(db_err)?;
        tracing::info!(guid, "playbook deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Playbook contents
    // -----------------------------------------------------------------------

    /// Insert a new child record; fails if its key is taken.
    pub fn create<R: Record>(&self, record: &R) -> Result<()> {
        let local = record.local_key();
        let key = child_key(record.playbook_id(), &local);
        if !self.write_new(R::TABLE, &key, record)? {
            return Err(R::already_exists(&local));
        }
        Ok(())
    }

    /// Insert or overwrite a child record.
    pub fn save<R: Record>(&self, record: &R) -> Result<()> {
        let key = child_key(record.playbook_id(), &record.local_key());
        self.write(R::TABLE, &key, record)
    }

    pub fn find<R: Record>(&self, playbook_id: Uuid, local: &str) -> Result<Option<R>> {
        self.read(R::TABLE, &child_key(playbook_id, local))
    }

    pub fn get<R: Record>(&self, playbook_id: Uuid, local: &str) -> Result<R> {
        self.find(playbook_id, local)?
            .ok_or_else(|| R::not_found(local))
    }

    pub fn list<R: Record>(&self, playbook_id: Uuid) -> Result<Vec<R>> {
        let mut items: Vec<R> = self.scan(R::TABLE, &child_prefix(playbook_id))?;
        R::sort(&mut items);
        Ok(items)
    }

    pub fn delete<R: Record>(&self, playbook_id: Uuid, local: &str) -> Result<()> {
        if !self.remove(R::TABLE, &child_key(playbook_id, local))? {
            return Err(R::not_found(local));
        }
        Ok(())
    }

    pub fn search_memories(&self, playbook_id: Uuid, query: &MemoryQuery) -> Result<Vec<Memory>> {
        let mut items: Vec<Memory> = self.list(playbook_id)?;
        items.retain(|m| m.matches(query));
        Ok(items)
    }

    // -----------------------------------------------------------------------
    // API keys
    // -----------------------------------------------------------------------

    pub fn create_api_key(&self, key: &ApiKey) -> Result<()> {
        if !self.write_new(API_KEYS, &key.key_hash, key)? {
            return Err(PlaybookError::Database("api key hash collision".into()));
        }
        Ok(())
    }

    pub fn find_api_key(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        self.read(API_KEYS, key_hash)
    }

    pub fn list_api_keys(&self, playbook_id: Uuid) -> Result<Vec<ApiKey>> {
        let mut keys: Vec<ApiKey> = self.scan(API_KEYS, "")?;
        keys.retain(|k| k.playbook_id == playbook_id);
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    /// Mark a key inactive. The record is kept so listings show it as revoked.
    pub fn revoke_api_key(&self, playbook_id: Uuid, key_id: Uuid) -> Result<ApiKey> {
        let mut key = self
            .list_api_keys(playbook_id)?
            .into_iter()
            .find(|k| k.id == key_id)
            .ok_or_else(|| PlaybookError::ApiKeyNotFound(key_id.to_string()))?;
        key.is_active = false;
        self.write(API_KEYS, &key.key_hash, &key)?;
        tracing::info!(key_id = %key_id, "api key revoked");
        Ok(key)
    }

    pub fn touch_api_key(&self, key: &ApiKey, at: DateTime<Utc>) -> Result<()> {
        let mut key = key.clone();
        key.last_used_at = Some(at);
        self.write(API_KEYS, &key.key_hash, &key)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    pub fn create_session(&self, session: &Session) -> Result<()> {
        self.write(SESSIONS, &session.token_hash, session)
    }

    pub fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        self.read(SESSIONS, token_hash)
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        self.remove(SESSIONS, token_hash)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
