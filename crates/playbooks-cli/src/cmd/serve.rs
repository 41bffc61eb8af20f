use anyhow::Context;
use playbooks_core::config::{Config, WarnLevel};
use playbooks_server::state::AppState;
use std::path::Path;

pub fn run(data_dir: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load(data_dir).context("failed to load config")?;
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
        }
    }

    let addr = config.bind_addr();
    let state = AppState::open(data_dir, config)
        .with_context(|| format!("failed to open store in {}", data_dir.display()))?;
    tracing::info!(data_dir = %data_dir.display(), "starting AgentPlaybooks server");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        tokio::select! {
            res = playbooks_server::serve_on(listener, state) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
