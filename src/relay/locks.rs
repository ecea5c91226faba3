use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::pipeline::PipelineId;

/// One async mutex per pipeline id, created on demand.
///
/// Events for the same pipeline run one at a time in arrival order; events
/// for different pipelines do not wait on each other. Entries are dropped
/// once nobody holds or waits on them.
#[derive(Default)]
pub struct PipelineLocks {
    locks: Mutex<HashMap<PipelineId, Arc<AsyncMutex<()>>>>,
}

pub struct PipelineGuard<'a> {
    owner: &'a PipelineLocks,
    pipeline_id: PipelineId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PipelineLocks {
    pub async fn acquire(&self, pipeline_id: PipelineId) -> PipelineGuard<'_> {
        let lock = Arc::clone(self.locks.lock().entry(pipeline_id).or_default());
        let guard = lock.lock_owned().await;

        PipelineGuard {
            owner: self,
            pipeline_id,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

impl Drop for PipelineGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.owner.locks.lock();
        if locks
            .get(&self.pipeline_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.pipeline_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_pipeline_is_serialized() {
        let locks = Arc::new(PipelineLocks::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                tokio::spawn(async move {
                    let _guard = locks.acquire(1).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0, "Released locks should be cleaned up");
    }

    #[tokio::test]
    async fn different_pipelines_do_not_block() {
        let locks = PipelineLocks::default();

        let _first = locks.acquire(1).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2)).await;

        assert!(second.is_ok(), "Pipeline 2 must not wait on pipeline 1");
    }
}
