use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use playbooks_core::markdown::parse_markdown_sections;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum CanvasSubcommand {
    /// Split a markdown file into addressable sections (`-` reads stdin)
    Sections { file: PathBuf },
}

pub fn run(subcmd: CanvasSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        CanvasSubcommand::Sections { file } => sections(&file, json),
    }
}

fn sections(file: &Path, json: bool) -> anyhow::Result<()> {
    let markdown = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?
    };

    let sections = parse_markdown_sections(&markdown);
    if json {
        return print_json(&sections);
    }
    let rows = sections
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.level.to_string(),
                s.heading.clone(),
                s.content.lines().count().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "LEVEL", "HEADING", "LINES"], rows);
    Ok(())
}
