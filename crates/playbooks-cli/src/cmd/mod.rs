pub mod canvas;
pub mod config;
pub mod init;
pub mod key;
pub mod playbook;
pub mod serve;
pub mod session;

use anyhow::Context;
use playbooks_core::config::Config;
use playbooks_core::Store;
use std::path::Path;

/// Load config and open the store for commands that touch data.
pub fn open(data_dir: &Path) -> anyhow::Result<(Config, Store)> {
    let config = Config::load(data_dir).context("failed to load config")?;
    let path = config.store_path(data_dir);
    let store = Store::open(&path)
        .with_context(|| format!("failed to open store at {}", path.display()))?;
    Ok((config, store))
}

pub fn format_time(t: &chrono::DateTime<chrono::Utc>) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}
