//! Shared wiring for the CLI commands: config loading, store and
//! extractor selection, service construction.

pub mod compact;
pub mod context;
pub mod correct;
pub mod facts;
pub mod history;
pub mod record;

use memline_config::AppConfig;
use memline_core::scope::StreamScope;
use memline_core::store::StateStore;
use memline_engine::MemoryService;
use memline_store::{InMemoryStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type CliError = Box<dyn std::error::Error>;

/// Map the `--project` flag to a stream scope.
pub fn scope_from(project: Option<String>) -> StreamScope {
    match project {
        Some(id) => StreamScope::project(id),
        None => StreamScope::Global,
    }
}

/// Build the fully wired memory service from config.
pub async fn build_service(config_path: Option<PathBuf>) -> Result<MemoryService, CliError> {
    let path = config_path.unwrap_or_else(AppConfig::default_path);
    let config = AppConfig::load(&path)?;
    let store = build_store(&config).await?;
    let extractor = memline_extract::from_config(&config.extractor);
    Ok(MemoryService::new(store, extractor, &config))
}

async fn build_store(config: &AppConfig) -> Result<Arc<dyn StateStore>, CliError> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        _ => {
            let path = expand_home(&config.store.path);
            if let Some(parent) = Path::new(&path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Arc::new(SqliteStore::new(&path).await?))
        }
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{home}/{rest}"),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_flag_mapping() {
        assert_eq!(scope_from(None), StreamScope::Global);
        assert_eq!(
            scope_from(Some("alpha".into())),
            StreamScope::project("alpha")
        );
    }

    #[test]
    fn tilde_expansion_uses_home() {
        unsafe { std::env::set_var("HOME", "/home/tester") };
        assert_eq!(expand_home("~/.memline/db"), "/home/tester/.memline/db");
        assert_eq!(expand_home("/abs/path.db"), "/abs/path.db");
    }
}
