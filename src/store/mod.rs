//! Pipeline render-state persistence.
//!
//! The store only knows how to load and save whole [`PipelineRenderState`]
//! documents. Callers read, mutate a copy and write the full state back;
//! `put` is a compare-and-swap on [`PipelineRenderState::revision`] so two
//! writers racing on the same pipeline cannot silently clobber each other.

mod file;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::pipeline::{PipelineId, PipelineRenderState};

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing store could not be reached or written
    #[error("{0}")]
    Unavailable(String),

    /// Another writer stored a newer revision since this state was read
    #[error("pipeline {pipeline_id}: expected revision {expected}, found {found}")]
    Conflict {
        pipeline_id: PipelineId,
        expected: u64,
        found: u64,
    },

    /// A stored document could not be decoded
    #[error("{0}")]
    Corrupt(String),
}

/// Summary of a stored entry, used by retention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub pipeline_id: PipelineId,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the state for `pipeline_id`, if any has been stored.
    async fn get(&self, pipeline_id: PipelineId) -> Result<Option<PipelineRenderState>, StoreError>;

    /// Stores `state` if the stored revision still equals `state.revision`
    /// (0 meaning "no entry yet"). Returns the new revision.
    async fn put(
        &self,
        pipeline_id: PipelineId,
        state: &PipelineRenderState,
    ) -> Result<u64, StoreError>;

    /// Removes the entry. Returns whether one existed.
    async fn delete(&self, pipeline_id: PipelineId) -> Result<bool, StoreError>;

    /// Lists every stored entry.
    async fn list(&self) -> Result<Vec<StoredEntry>, StoreError>;
}

/// Revision check shared by the store implementations.
fn check_revision(
    pipeline_id: PipelineId,
    current: Option<&PipelineRenderState>,
    incoming: &PipelineRenderState,
) -> Result<u64, StoreError> {
    let found = current.map_or(0, |state| state.revision);
    if found == incoming.revision {
        Ok(found + 1)
    } else {
        Err(StoreError::Conflict {
            pipeline_id,
            expected: incoming.revision,
            found,
        })
    }
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStore for Box<S> {
    async fn get(&self, pipeline_id: PipelineId) -> Result<Option<PipelineRenderState>, StoreError> {
        (**self).get(pipeline_id).await
    }

    async fn put(
        &self,
        pipeline_id: PipelineId,
        state: &PipelineRenderState,
    ) -> Result<u64, StoreError> {
        (**self).put(pipeline_id, state).await
    }

    async fn delete(&self, pipeline_id: PipelineId) -> Result<bool, StoreError> {
        (**self).delete(pipeline_id).await
    }

    async fn list(&self) -> Result<Vec<StoredEntry>, StoreError> {
        (**self).list().await
    }
}
