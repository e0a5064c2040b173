use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub const FLAGS_FILE: &str = "flags.json";

/// Set once the one-time viewing notice has been acknowledged.
pub const NOTICE_SHOWN: &str = "notice_shown";

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode flags: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Named boolean flags persisted as a JSON object in a state directory.
#[derive(Debug, Clone)]
pub struct FlagStore {
    path: PathBuf,
}

impl FlagStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join(FLAGS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored flags. A missing or unreadable file reads as empty.
    pub async fn load(&self) -> BTreeMap<String, bool> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No flag file");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Ignoring corrupt flag file");
            BTreeMap::new()
        })
    }

    pub async fn is_set(&self, name: &str) -> bool {
        self.load().await.get(name).copied().unwrap_or(false)
    }

    pub async fn set(&self, name: &str, value: bool) -> Result<(), FlagError> {
        let mut flags = self.load().await;
        flags.insert(name.to_string(), value);
        let body = serde_json::to_string_pretty(&flags)?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(|source| FlagError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|source| FlagError::Io {
                path: self.path.clone(),
                source,
            })
    }
}
