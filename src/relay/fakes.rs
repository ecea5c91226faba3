use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;

use crate::pipeline::{JobId, MessageRef, PipelineId, PipelineRenderState};
use crate::providers::{ChatTransport, JobLogSource, LogFetchError, TransportError};
use crate::store::{MemoryStore, StateStore, StoreError, StoredEntry};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        channel: String,
        blocks: Vec<Value>,
        text: String,
    },
    Update {
        message: MessageRef,
        blocks: Vec<Value>,
        text: String,
    },
}

#[derive(Default)]
struct TransportState {
    calls: Vec<Call>,
    posted: u64,
    reject_creates: bool,
    reject_updates: bool,
}

/// Records every call; hands out sequential message timestamps.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<TransportState>>,
}

impl FakeTransport {
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Create { .. }))
            .count()
    }

    pub fn updates(&self) -> Vec<(MessageRef, Vec<Value>, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Update {
                    message,
                    blocks,
                    text,
                } => Some((message, blocks, text)),
                Call::Create { .. } => None,
            })
            .collect()
    }

    pub fn last_update(&self) -> Option<(MessageRef, Vec<Value>, String)> {
        self.updates().pop()
    }

    pub fn reject_creates(&self) {
        self.state.lock().reject_creates = true;
    }

    pub fn reject_updates(&self) {
        self.state.lock().reject_updates = true;
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn create_message(
        &self,
        channel: &str,
        blocks: &[Value],
        text: &str,
    ) -> Result<MessageRef, TransportError> {
        tokio::task::yield_now().await;

        let mut state = self.state.lock();
        state.calls.push(Call::Create {
            channel: channel.to_string(),
            blocks: blocks.to_vec(),
            text: text.to_string(),
        });
        if state.reject_creates {
            return Err(TransportError::Rejected("channel_not_found".to_string()));
        }

        state.posted += 1;
        Ok(MessageRef {
            channel: channel.to_string(),
            ts: format!("1700000000.{:06}", state.posted),
        })
    }

    async fn update_message(
        &self,
        message: &MessageRef,
        blocks: &[Value],
        text: &str,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Update {
            message: message.clone(),
            blocks: blocks.to_vec(),
            text: text.to_string(),
        });
        if state.reject_updates {
            return Err(TransportError::Rejected("message_not_found".to_string()));
        }
        Ok(())
    }
}

/// Job output keyed by job id; unknown jobs answer 404.
#[derive(Clone, Default)]
pub struct FakeLogs {
    logs: Arc<Mutex<HashMap<JobId, String>>>,
    fetches: Arc<Mutex<Vec<JobId>>>,
}

impl FakeLogs {
    pub fn with(self, job_id: JobId, text: &str) -> Self {
        self.logs.lock().insert(job_id, text.to_string());
        self
    }

    pub fn fetches(&self) -> Vec<JobId> {
        self.fetches.lock().clone()
    }
}

#[async_trait]
impl JobLogSource for FakeLogs {
    async fn fetch_job_text(&self, job_id: JobId) -> Result<String, LogFetchError> {
        self.fetches.lock().push(job_id);
        self.logs
            .lock()
            .get(&job_id)
            .cloned()
            .ok_or(LogFetchError::Status {
                job_id,
                status: 404,
            })
    }
}

/// A store whose backend is down.
pub struct UnavailableStore;

#[async_trait]
impl StateStore for UnavailableStore {
    async fn get(&self, _: PipelineId) -> Result<Option<PipelineRenderState>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn put(&self, _: PipelineId, _: &PipelineRenderState) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _: PipelineId) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn list(&self) -> Result<Vec<StoredEntry>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Simulates another relay instance writing just before each of the next
/// `writes` puts: an existing entry is rewritten unchanged (bumping its
/// revision); a missing one is created pointing at `rival`.
#[derive(Clone)]
pub struct InterferingStore {
    pub inner: MemoryStore,
    writes: Arc<Mutex<u32>>,
    rival: MessageRef,
}

impl InterferingStore {
    pub fn new(inner: MemoryStore, writes: u32) -> Self {
        Self {
            inner,
            writes: Arc::new(Mutex::new(writes)),
            rival: MessageRef {
                channel: "C-builds".to_string(),
                ts: "1600000000.000001".to_string(),
            },
        }
    }

    pub fn rival(&self) -> MessageRef {
        self.rival.clone()
    }

    fn take_write(&self) -> bool {
        let mut writes = self.writes.lock();
        if *writes == 0 {
            return false;
        }
        *writes -= 1;
        true
    }
}

#[async_trait]
impl StateStore for InterferingStore {
    async fn get(&self, pipeline_id: PipelineId) -> Result<Option<PipelineRenderState>, StoreError> {
        self.inner.get(pipeline_id).await
    }

    async fn put(
        &self,
        pipeline_id: PipelineId,
        state: &PipelineRenderState,
    ) -> Result<u64, StoreError> {
        if self.take_write() {
            match self.inner.get(pipeline_id).await? {
                Some(current) => {
                    self.inner.put(pipeline_id, &current).await?;
                }
                None => {
                    let rival = PipelineRenderState::new(
                        self.rival.clone(),
                        state.snapshot.clone(),
                        Utc::now(),
                    );
                    self.inner.put(pipeline_id, &rival).await?;
                }
            }
        }
        self.inner.put(pipeline_id, state).await
    }

    async fn delete(&self, pipeline_id: PipelineId) -> Result<bool, StoreError> {
        self.inner.delete(pipeline_id).await
    }

    async fn list(&self) -> Result<Vec<StoredEntry>, StoreError> {
        self.inner.list().await
    }
}
