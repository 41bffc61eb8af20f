use super::{format_time, open};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use playbooks_core::api_key::{parse_permissions, ApiKey, Permission};
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum KeySubcommand {
    /// Issue a key for a playbook; the token is printed once
    Create {
        guid: String,
        #[arg(long, default_value = "cli")]
        name: String,
        /// Permission to grant (repeatable); defaults come from config.yaml
        #[arg(long = "permission", short = 'p')]
        permissions: Vec<String>,
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// List a playbook's keys
    List { guid: String },
    /// Deactivate a key by id
    Revoke { guid: String, id: String },
}

pub fn run(data_dir: &Path, subcmd: KeySubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        KeySubcommand::Create {
            guid,
            name,
            permissions,
            expires_in_days,
        } => create(data_dir, &guid, name, &permissions, expires_in_days, json),
        KeySubcommand::List { guid } => list(data_dir, &guid, json),
        KeySubcommand::Revoke { guid, id } => revoke(data_dir, &guid, &id, json),
    }
}

fn create(
    data_dir: &Path,
    guid: &str,
    name: String,
    permissions: &[String],
    expires_in_days: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let (config, store) = open(data_dir)?;
    let playbook = store
        .get_playbook(guid)
        .with_context(|| format!("playbook '{guid}' not found"))?;

    let perms = if permissions.is_empty() {
        config.auth.default_permissions()
    } else {
        parse_permissions(permissions)?
    };
    if let Some(days) = expires_in_days {
        if days <= 0 {
            anyhow::bail!("--expires-in-days must be positive");
        }
    }
    let expires_at = expires_in_days.map(|d| chrono::Utc::now() + chrono::Duration::days(d));

    let (key, token) = ApiKey::issue(playbook.id, &playbook.user_id, name, perms, expires_at);
    store.create_api_key(&key)?;

    if json {
        print_json(&serde_json::json!({
            "id": key.id,
            "name": key.name,
            "permissions": key.permissions,
            "expires_at": key.expires_at,
            "key": token,
        }))?;
    } else {
        println!("Created key '{}' ({})", key.name, key.id);
        println!("permissions: {}", join_permissions(&key.permissions));
        println!();
        println!("  {token}");
        println!();
        println!("Store this token now. It cannot be shown again.");
    }
    Ok(())
}

fn list(data_dir: &Path, guid: &str, json: bool) -> anyhow::Result<()> {
    let (_, store) = open(data_dir)?;
    let playbook = store
        .get_playbook(guid)
        .with_context(|| format!("playbook '{guid}' not found"))?;
    let keys = store.list_api_keys(playbook.id)?;

    if json {
        let summaries: Vec<_> = keys
            .iter()
            .map(|k| {
                serde_json::json!({
                    "id": k.id,
                    "name": k.name,
                    "key_prefix": k.key_prefix,
                    "permissions": k.permissions,
                    "is_active": k.is_active,
                    "expires_at": k.expires_at,
                    "last_used_at": k.last_used_at,
                    "created_at": k.created_at,
                })
            })
            .collect();
        return print_json(&summaries);
    }
    if keys.is_empty() {
        println!("No keys for {guid}.");
        return Ok(());
    }
    let rows = keys
        .iter()
        .map(|k| {
            vec![
                k.id.to_string(),
                k.name.clone(),
                format!("{}...", k.key_prefix),
                join_permissions(&k.permissions),
                if k.is_active { "active" } else { "revoked" }.to_string(),
                k.last_used_at
                    .as_ref()
                    .map(format_time)
                    .unwrap_or_else(|| "never".to_string()),
            ]
        })
        .collect();
    print_table(
        &["ID", "NAME", "PREFIX", "PERMISSIONS", "STATUS", "LAST USED"],
        rows,
    );
    Ok(())
}

fn revoke(data_dir: &Path, guid: &str, id: &str, json: bool) -> anyhow::Result<()> {
    let key_id = Uuid::parse_str(id).with_context(|| format!("invalid key id '{id}'"))?;
    let (_, store) = open(data_dir)?;
    let playbook = store
        .get_playbook(guid)
        .with_context(|| format!("playbook '{guid}' not found"))?;
    let key = store.revoke_api_key(playbook.id, key_id)?;

    if json {
        print_json(&serde_json::json!({ "id": key.id, "is_active": key.is_active }))?;
    } else {
        println!("Revoked key '{}' ({})", key.name, key.id);
    }
    Ok(())
}

fn join_permissions(perms: &[Permission]) -> String {
    perms
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
