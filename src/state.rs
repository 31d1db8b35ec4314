//! Persisted set of already-published identifiers.
//!
//! # File Format
//!
//! A single JSON array of strings, sorted ascending:
//!
//! ```text
//! ["https://cebudailynews.inquirer.net/612345/...", "https://www.sunstar.com.ph/cebu/..."]
//! ```
//!
//! A missing file is an empty set. An unreadable or malformed file is also
//! treated as empty, with a warning: re-posting a story is recoverable, a
//! crashed run is not. Writes go to a temporary sibling and are renamed over
//! the target, so a crash mid-write leaves the previous file intact.

use crate::error::RelayError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

/// Identifiers of previously published items. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet {
    ids: BTreeSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns `false` if the identifier was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Sorted JSON array.
    pub fn to_json(&self) -> String {
        // a BTreeSet<String> always serializes
        serde_json::to_string(&self.ids).unwrap_or_else(|_| "[]".to_string())
    }

    /// Parse a JSON array of identifier strings. Duplicates collapse.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if `text` is not an array of strings.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let ids: Vec<String> = serde_json::from_str(text)?;
        Ok(ids.into_iter().collect())
    }
}

impl FromIterator<String> for SeenSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// File-backed home of the [`SeenSet`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Store backed by `path`. Nothing is touched until [`Self::load`] or
    /// [`Self::save`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the seen set, failing open to an empty set.
    ///
    /// # Returns
    ///
    /// The stored identifiers; an empty set when the file is missing,
    /// unreadable, or not a JSON array of strings (logged at `warn`).
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> SeenSet {
        match self.try_load().await {
            Ok(seen) => {
                info!(count = seen.len(), "Loaded seen identifiers");
                seen
            }
            Err(e) => {
                warn!(error = %e, "Starting from an empty seen set");
                SeenSet::new()
            }
        }
    }

    async fn try_load(&self) -> Result<SeenSet, RelayError> {
        let malformed = |reason: String| RelayError::MalformedState {
            path: self.path.clone(),
            reason,
        };
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SeenSet::new()),
            Err(e) => return Err(malformed(e.to_string())),
        };
        SeenSet::from_json(&text).map_err(|e| malformed(e.to_string()))
    }

    /// Atomically replace the state file with `seen`.
    ///
    /// The JSON is written and synced to a temporary sibling, then renamed
    /// over the target. On failure the temporary file is removed and the
    /// previous state file is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::StateWrite`] if the temporary file cannot be
    /// written or renamed.
    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = seen.len()))]
    pub async fn save(&self, seen: &SeenSet) -> Result<(), RelayError> {
        let write_err = |source: std::io::Error| RelayError::StateWrite {
            path: self.path.clone(),
            source,
        };

        let tmp = self.temp_path();
        if let Err(e) = write_then_rename(&tmp, &self.path, seen.to_json().as_bytes()).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }
        info!("Saved seen identifiers");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state.json".to_string());
        self.path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
    }
}

async fn write_then_rename(tmp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, target).await
}
