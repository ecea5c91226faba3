use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{check_revision, StateStore, StoreError, StoredEntry};
use crate::pipeline::{PipelineId, PipelineRenderState};

/// In-process store. State is lost when the process exits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<PipelineId, PipelineRenderState>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, pipeline_id: PipelineId) -> Result<Option<PipelineRenderState>, StoreError> {
        Ok(self.entries.lock().get(&pipeline_id).cloned())
    }

    async fn put(
        &self,
        pipeline_id: PipelineId,
        state: &PipelineRenderState,
    ) -> Result<u64, StoreError> {
        let mut entries = self.entries.lock();
        let revision = check_revision(pipeline_id, entries.get(&pipeline_id), state)?;

        let mut stored = state.clone();
        stored.revision = revision;
        entries.insert(pipeline_id, stored);

        Ok(revision)
    }

    async fn delete(&self, pipeline_id: PipelineId) -> Result<bool, StoreError> {
        Ok(self.entries.lock().remove(&pipeline_id).is_some())
    }

    async fn list(&self) -> Result<Vec<StoredEntry>, StoreError> {
        let mut entries: Vec<StoredEntry> = self
            .entries
            .lock()
            .iter()
            .map(|(id, state)| StoredEntry {
                pipeline_id: *id,
                updated_at: state.updated_at,
            })
            .collect();
        entries.sort_by_key(|entry| entry.pipeline_id);
        Ok(entries)
    }
}
