use std::path::Path;
use std::sync::Arc;

use playbooks_core::config::Config;
use playbooks_core::Store;

use crate::error::AppError;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }

    /// Open the store named by `config` inside `data_dir`.
    pub fn open(data_dir: &Path, config: Config) -> playbooks_core::Result<Self> {
        let store = Store::open(&config.store_path(data_dir))?;
        Ok(Self::new(store, config))
    }
}

/// Run storage work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))?
}
