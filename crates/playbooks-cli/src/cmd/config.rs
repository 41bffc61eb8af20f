use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use playbooks_core::config::{Config, WarnLevel};
use playbooks_core::paths;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Check config.yaml for problems
    Validate,
    /// Print the effective configuration
    Show,
}

pub fn run(data_dir: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(data_dir, json),
        ConfigSubcommand::Show => show(data_dir, json),
    }
}

fn validate(data_dir: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(data_dir).context("failed to load config")?;
    let warnings = config.validate();
    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);

    if json {
        print_json(&serde_json::json!({
            "valid": !has_errors,
            "warnings": warnings,
        }))?;
    } else if warnings.is_empty() {
        println!("{}: ok", paths::config_path(data_dir).display());
    } else {
        for w in &warnings {
            let tag = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{tag}] {}", w.message);
        }
    }

    if has_errors {
        anyhow::bail!("config has errors");
    }
    Ok(())
}

fn show(data_dir: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(data_dir).context("failed to load config")?;
    if json {
        print_json(&config)
    } else {
        print!("{}", config.to_yaml()?);
        Ok(())
    }
}
