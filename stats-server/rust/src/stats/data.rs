use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::fs;
use tracing::{debug, warn};

use super::domain::Store;

/// The snapshot file. Holds the entire store as one JSON document,
/// rewritten in full on every save.
#[derive(Clone)]
pub(crate) struct Repository {
    path: PathBuf,
}

impl Repository {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing, unreadable or malformed snapshot yields an empty store.
    pub(crate) async fn load(&self) -> Store {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot yet, starting empty");
                return Store::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "couldn't read snapshot, starting empty");
                return Store::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "couldn't parse snapshot, starting empty");
                Store::default()
            }
        }
    }

    /// Writes to a temp file next to the snapshot and renames it into place,
    /// so readers never see a truncated document.
    pub(crate) async fn save(&self, store: &Store) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(store)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, &json).await?;
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        debug!(path = %self.path.display(), bytes = json.len(), "saved snapshot");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stats-data.json".to_owned());
        self.path
            .with_file_name(format!("{}.tmp.{}", file_name, std::process::id()))
    }
}
