use super::{format_time, open};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use playbooks_core::export::{ExportScope, PublicPlaybook};
use playbooks_core::playbook::{Playbook, PlaybookInput};
use playbooks_core::PlaybookError;
use std::path::Path;

const GUID_ATTEMPTS: usize = 3;

#[derive(Subcommand)]
pub enum PlaybookSubcommand {
    /// Create a playbook owned by a user
    Create {
        name: String,
        /// Owning user id
        #[arg(long)]
        owner: String,
        #[arg(long)]
        description: Option<String>,
        /// List the playbook in the public directory
        #[arg(long)]
        public: bool,
    },
    /// List a user's playbooks, or the public directory when no owner is given
    List {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show a playbook with its contents
    Show {
        guid: String,
        /// Render as markdown instead of a summary
        #[arg(long)]
        markdown: bool,
    },
    /// Delete a playbook with everything in it
    Delete { guid: String },
}

pub fn run(data_dir: &Path, subcmd: PlaybookSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        PlaybookSubcommand::Create {
            name,
            owner,
            description,
            public,
        } => create(data_dir, name, &owner, description, public, json),
        PlaybookSubcommand::List { owner } => list(data_dir, owner.as_deref(), json),
        PlaybookSubcommand::Show { guid, markdown } => show(data_dir, &guid, markdown, json),
        PlaybookSubcommand::Delete { guid } => delete(data_dir, &guid, json),
    }
}

fn create(
    data_dir: &Path,
    name: String,
    owner: &str,
    description: Option<String>,
    public: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (_, store) = open(data_dir)?;
    let input = PlaybookInput {
        name: Some(name),
        description,
        is_public: Some(public),
        config: None,
    };
    let mut created = None;
    for _ in 0..GUID_ATTEMPTS {
        let candidate = Playbook::create(owner, input.clone())?;
        match store.create_playbook(&candidate) {
            Ok(()) => {
                created = Some(candidate);
                break;
            }
            Err(PlaybookError::PlaybookExists(_)) => continue,
            Err(e) => return Err(e).context("failed to create playbook"),
        }
    }
    let playbook = created.context("could not allocate a unique playbook guid")?;

    if json {
        print_json(&playbook)?;
    } else {
        println!("Created playbook '{}' ({})", playbook.name, playbook.guid);
    }
    Ok(())
}

fn list(data_dir: &Path, owner: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (_, store) = open(data_dir)?;
    let playbooks = match owner {
        Some(user) => store.list_playbooks_for_user(user)?,
        None => store.list_public_playbooks()?,
    };

    if json {
        return print_json(&playbooks);
    }
    if playbooks.is_empty() {
        println!("No playbooks.");
        return Ok(());
    }
    let rows = playbooks
        .iter()
        .map(|p| {
            vec![
                p.guid.clone(),
                p.name.clone(),
                p.user_id.clone(),
                if p.is_public { "public" } else { "private" }.to_string(),
                format_time(&p.updated_at),
            ]
        })
        .collect();
    print_table(&["GUID", "NAME", "OWNER", "VISIBILITY", "UPDATED"], rows);
    Ok(())
}

fn show(data_dir: &Path, guid: &str, markdown: bool, json: bool) -> anyhow::Result<()> {
    let (_, store) = open(data_dir)?;
    let playbook = store
        .get_playbook(guid)
        .with_context(|| format!("playbook '{guid}' not found"))?;
    let export = PublicPlaybook::load(&store, &playbook, ExportScope::all())?;

    if json {
        return print_json(&export);
    }
    if markdown {
        print!("{}", export.to_markdown());
        return Ok(());
    }

    println!("{} ({})", export.name, export.guid);
    if let Some(desc) = &export.description {
        println!("{desc}");
    }
    println!(
        "owner: {}  visibility: {}",
        playbook.user_id,
        if playbook.is_public { "public" } else { "private" }
    );
    println!();
    println!("personas:    {}", export.personas.len());
    println!("skills:      {}", export.skills.len());
    println!("mcp servers: {}", export.mcp_servers.len());
    println!("memories:    {}", export.memories.as_ref().map_or(0, Vec::len));
    println!("canvas:");
    for c in &export.canvas {
        println!("  {} ({} sections)", c.slug, c.sections.len());
    }
    Ok(())
}

fn delete(data_dir: &Path, guid: &str, json: bool) -> anyhow::Result<()> {
    let (_, store) = open(data_dir)?;
    store
        .delete_playbook(guid)
        .with_context(|| format!("failed to delete playbook '{guid}'"))?;
    if json {
        print_json(&serde_json::json!({ "deleted": guid }))?;
    } else {
        println!("Deleted playbook {guid}");
    }
    Ok(())
}
