//! Local filter stores.
//!
//! [`DirFilterStore`] keeps one `<name>.gfxs` file per filter in a directory,
//! the same layout the render server uses. [`MemoryFilterStore`] holds
//! filters in a map.

use async_trait::async_trait;
use gfxs_api::{BackendError, BackendResult, FilterStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Extension of stored filter files.
pub const FILTER_EXTENSION: &str = "gfxs";

/// Filters stored as files in a directory.
#[derive(Debug, Clone)]
pub struct DirFilterStore {
    root: PathBuf,
}

impl DirFilterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> BackendResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{name}.{FILTER_EXTENSION}")))
    }
}

#[async_trait]
impl FilterStore for DirFilterStore {
    async fn list(&self) -> BackendResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            // Only filter files; anything else could not be read back by name.
            if let Some(name) = file_name.strip_suffix(&format!(".{FILTER_EXTENSION}")) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read(&self, name: &str) -> BackendResult<String> {
        let path = self.path_for(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BackendError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, name: &str, document: &str) -> BackendResult<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, document).await?;
        tracing::debug!("stored filter {} at {}", name, path.display());
        Ok(())
    }
}

/// Filters kept in memory.
#[derive(Debug, Default)]
pub struct MemoryFilterStore {
    filters: Mutex<BTreeMap<String, String>>,
}

impl MemoryFilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(self, name: &str, document: &str) -> Self {
        if let Ok(mut filters) = self.filters.lock() {
            filters.insert(name.to_string(), document.to_string());
        }
        self
    }

    fn lock(&self) -> BackendResult<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.filters
            .lock()
            .map_err(|_| BackendError::Io("filter store lock poisoned".into()))
    }
}

#[async_trait]
impl FilterStore for MemoryFilterStore {
    async fn list(&self) -> BackendResult<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn read(&self, name: &str) -> BackendResult<String> {
        self.lock()?
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    async fn write(&self, name: &str, document: &str) -> BackendResult<()> {
        validate_name(name)?;
        self.lock()?.insert(name.to_string(), document.to_string());
        Ok(())
    }
}

/// Filter names become file names; keep them to a single path component.
fn validate_name(name: &str) -> BackendResult<()> {
    let bad = name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(BackendError::Protocol(format!("invalid filter name: {name:?}")));
    }
    Ok(())
}
