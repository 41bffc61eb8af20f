use super::open;
use crate::output::print_json;
use clap::Subcommand;
use playbooks_core::api_key::hash_token;
use playbooks_core::session::Session;
use std::path::Path;

#[derive(Subcommand)]
pub enum SessionSubcommand {
    /// Issue a session token for a user
    Issue {
        user: String,
        /// Lifetime in hours (default: auth.session_ttl_hours)
        #[arg(long)]
        ttl_hours: Option<u32>,
    },
    /// Revoke a session token
    Revoke { token: String },
}

pub fn run(data_dir: &Path, subcmd: SessionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SessionSubcommand::Issue { user, ttl_hours } => issue(data_dir, &user, ttl_hours, json),
        SessionSubcommand::Revoke { token } => revoke(data_dir, &token, json),
    }
}

fn issue(data_dir: &Path, user: &str, ttl_hours: Option<u32>, json: bool) -> anyhow::Result<()> {
    let (config, store) = open(data_dir)?;
    let ttl = match ttl_hours {
        Some(0) => anyhow::bail!("--ttl-hours must be positive"),
        Some(h) => chrono::Duration::hours(i64::from(h)),
        None => config.auth.session_ttl(),
    };
    let (session, token) = Session::issue(user, ttl)?;
    store.create_session(&session)?;
    tracing::debug!(user, expires_at = %session.expires_at, "session issued");

    if json {
        print_json(&serde_json::json!({
            "user_id": session.user_id,
            "expires_at": session.expires_at,
            "token": token,
        }))?;
    } else {
        println!("Session for '{}' expires {}", session.user_id, session.expires_at);
        println!();
        println!("  {token}");
    }
    Ok(())
}

fn revoke(data_dir: &Path, token: &str, json: bool) -> anyhow::Result<()> {
    let (_, store) = open(data_dir)?;
    let removed = store.delete_session(&hash_token(token))?;
    if json {
        print_json(&serde_json::json!({ "revoked": removed }))?;
    } else if removed {
        println!("Session revoked.");
    } else {
        println!("No such session.");
    }
    Ok(())
}
