use crate::output::print_json;
use anyhow::Context;
use playbooks_core::config::Config;
use playbooks_core::{io, paths};
use std::path::Path;

/// Create the data directory with a default `config.yaml` and an empty store.
/// Existing files are left untouched.
pub fn run(data_dir: &Path, json: bool) -> anyhow::Result<()> {
    io::ensure_dir(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let config_path = paths::config_path(data_dir);
    let yaml = Config::default()
        .to_yaml()
        .context("failed to render default config")?;
    let wrote_config = io::write_if_missing(&config_path, yaml.as_bytes())
        .context("failed to write config.yaml")?;

    let (config, _store) = super::open(data_dir)?;
    let store_path = config.store_path(data_dir);

    if json {
        print_json(&serde_json::json!({
            "data_dir": data_dir,
            "config": config_path,
            "config_created": wrote_config,
            "store": store_path,
        }))?;
    } else {
        println!("Initialized AgentPlaybooks in {}", data_dir.display());
        if wrote_config {
            println!("  created {}", config_path.display());
        } else {
            println!("  kept existing {}", config_path.display());
        }
        println!("  store   {}", store_path.display());
    }
    Ok(())
}
