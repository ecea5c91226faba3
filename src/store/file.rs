use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use log::{debug, warn};

use super::{check_revision, StateStore, StoreError, StoredEntry};
use crate::pipeline::{PipelineId, PipelineRenderState};

const LOCK_FILE: &str = ".lock";

/// Store keeping one JSON document per pipeline in a directory.
///
/// Writes go through a temporary file and a rename, and every
/// compare-and-swap holds an exclusive lock on `<dir>/.lock`, so several
/// processes may share the same directory. Defaults to a platform cache
/// directory:
/// - Linux: `~/.cache/stagecast/pipelines/`
/// - macOS: `~/Library/Caches/stagecast/pipelines/`
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| unavailable(&dir, &e))?;
        debug!("File store at: {}", dir.display());
        Ok(Self { dir })
    }

    /// Platform-specific default location, if the platform has a cache dir.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("stagecast").join("pipelines"))
    }

    fn entry_path(&self, pipeline_id: PipelineId) -> PathBuf {
        self.dir.join(format!("{pipeline_id}.json"))
    }

    fn read_entry(&self, pipeline_id: PipelineId) -> Result<Option<PipelineRenderState>, StoreError> {
        let path = self.entry_path(pipeline_id);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(&path, &e)),
        }
    }

    fn write_entry(&self, pipeline_id: PipelineId, state: &PipelineRenderState) -> Result<(), StoreError> {
        let path = self.entry_path(pipeline_id);
        let tmp = self.dir.join(format!("{pipeline_id}.json.tmp"));
        let content = serde_json::to_string(state)
            .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;

        fs::write(&tmp, content).map_err(|e| unavailable(&tmp, &e))?;
        fs::rename(&tmp, &path).map_err(|e| unavailable(&path, &e))
    }

    /// Runs `f` while holding the directory's exclusive lock.
    fn locked<T>(&self, f: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let lock_path = self.dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| unavailable(&lock_path, &e))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| unavailable(&lock_path, &e))?;

        let result = f();

        if let Err(e) = lock_file.unlock() {
            warn!("Failed to release {}: {e}", lock_path.display());
        }
        result
    }

    fn put_blocking(&self, pipeline_id: PipelineId, state: &PipelineRenderState) -> Result<u64, StoreError> {
        self.locked(|| {
            let current = self.read_entry(pipeline_id)?;
            let revision = check_revision(pipeline_id, current.as_ref(), state)?;

            let mut stored = state.clone();
            stored.revision = revision;
            self.write_entry(pipeline_id, &stored)?;

            debug!("Stored pipeline {pipeline_id} at revision {revision}");
            Ok(revision)
        })
    }

    fn delete_blocking(&self, pipeline_id: PipelineId) -> Result<bool, StoreError> {
        self.locked(|| {
            let path = self.entry_path(pipeline_id);
            match fs::remove_file(&path) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(unavailable(&path, &e)),
            }
        })
    }

    fn list_blocking(&self) -> Result<Vec<StoredEntry>, StoreError> {
        let dir = fs::read_dir(&self.dir).map_err(|e| unavailable(&self.dir, &e))?;

        let mut entries = Vec::new();
        for item in dir {
            let path = item.map_err(|e| unavailable(&self.dir, &e))?.path();
            let Some(pipeline_id) = entry_id(&path) else {
                continue;
            };

            match self.read_entry(pipeline_id) {
                Ok(Some(state)) => entries.push(StoredEntry {
                    pipeline_id,
                    updated_at: state.updated_at,
                }),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable entry {}: {e}", path.display()),
            }
        }

        entries.sort_by_key(|entry| entry.pipeline_id);
        Ok(entries)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }
}

fn entry_id(path: &Path) -> Option<PipelineId> {
    if path.extension()? != "json" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

fn unavailable(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, pipeline_id: PipelineId) -> Result<Option<PipelineRenderState>, StoreError> {
        self.blocking(move |store| store.read_entry(pipeline_id)).await
    }

    async fn put(
        &self,
        pipeline_id: PipelineId,
        state: &PipelineRenderState,
    ) -> Result<u64, StoreError> {
        let state = state.clone();
        self.blocking(move |store| store.put_blocking(pipeline_id, &state))
            .await
    }

    async fn delete(&self, pipeline_id: PipelineId) -> Result<bool, StoreError> {
        self.blocking(move |store| store.delete_blocking(pipeline_id))
            .await
    }

    async fn list(&self) -> Result<Vec<StoredEntry>, StoreError> {
        self.blocking(|store| store.list_blocking()).await
    }
}
