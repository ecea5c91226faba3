use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CI-assigned pipeline identifier.
pub type PipelineId = u64;

/// CI-assigned job identifier.
pub type JobId = u64;

/// Lifecycle status of a single job, spelled the way GitLab spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Scheduled,
    Preparing,
    WaitingForResource,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Skipped => "skipped",
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Preparing => "preparing",
            Self::WaitingForResource => "waiting_for_resource",
            Self::Unknown => "unknown",
        }
    }
}

/// A job within a pipeline snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    /// Stage this job belongs to
    pub stage: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Project web page (e.g., <https://gitlab.com/group/project>)
    pub web_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub url: String,
    pub author_name: String,
}

impl Commit {
    /// First eight characters of the commit SHA, as GitLab displays it.
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// The full, latest-known structure of a pipeline.
///
/// Pipeline-level events replace it wholesale; job-level events only patch
/// the `status` of an entry already present in `builds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub pipeline_id: PipelineId,
    pub project: Project,
    /// Git reference that triggered the pipeline (e.g., "main")
    pub git_ref: String,
    pub commit: Commit,
    /// Stage names in pipeline-declared order
    pub stages: Vec<String>,
    pub builds: Vec<Job>,
}

impl PipelineSnapshot {
    /// Jobs belonging to `stage`, in snapshot order.
    pub fn jobs_in_stage<'a>(&'a self, stage: &'a str) -> impl Iterator<Item = &'a Job> + 'a {
        self.builds.iter().filter(move |job| job.stage == stage)
    }

    /// Sets the status of job `job_id`.
    ///
    /// Returns `false` without touching anything when the job is not part of
    /// the snapshot; job events never insert jobs.
    pub fn set_job_status(&mut self, job_id: JobId, status: JobStatus) -> bool {
        match self.builds.iter_mut().find(|job| job.id == job_id) {
            Some(job) => {
                job.status = status;
                true
            }
            None => false,
        }
    }
}

/// Locator of the one chat message representing a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: String,
    pub ts: String,
}

/// Everything needed to re-render a pipeline's message.
///
/// Exists only once the pipeline's message has been created, so
/// `message_ref` is never optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRenderState {
    pub message_ref: MessageRef,
    /// Stored as a sorted array so it survives any document store
    #[serde(default)]
    pub expanded_stages: BTreeSet<String>,
    pub snapshot: PipelineSnapshot,
    /// Store revision this state was read at (0 = not yet stored)
    #[serde(default)]
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRenderState {
    pub fn new(message_ref: MessageRef, snapshot: PipelineSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            message_ref,
            expanded_stages: BTreeSet::new(),
            snapshot,
            revision: 0,
            updated_at: now,
        }
    }
}
