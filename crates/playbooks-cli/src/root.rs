use playbooks_core::paths::DATA_DIR;
use std::path::{Path, PathBuf};

/// Resolve the data directory.
///
/// Priority:
/// 1. `--data-dir` flag / `APB_DATA_DIR` env var (passed in as `explicit`)
/// 2. The first ancestor of `cwd` containing `.agentplaybooks/`
/// 3. `cwd/.agentplaybooks`
pub fn resolve_data_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_data_dir(&cwd).unwrap_or_else(|| cwd.join(DATA_DIR))
}

fn find_data_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DATA_DIR))
        .find(|candidate| candidate.is_dir())
}
