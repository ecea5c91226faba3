mod events;
mod status;
mod test_jobs;
mod types;

pub use events::{decode_event, InboundEvent, JobEvent};
pub use status::{job_emoji, stage_status, StageStatus};
pub use test_jobs::is_test_job;
pub use types::{
    Commit, Job, JobId, JobStatus, MessageRef, PipelineId, PipelineRenderState, PipelineSnapshot,
    Project,
};

#[cfg(test)]
pub(crate) use types::fixtures;
