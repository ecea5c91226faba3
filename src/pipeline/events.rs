use serde::Deserialize;

use super::types::{Commit, Job, JobId, JobStatus, PipelineId, PipelineSnapshot, Project};
use crate::error::Result;

/// A decoded inbound webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Full pipeline snapshot
    Pipeline(PipelineSnapshot),
    /// Single job status change
    Job(JobEvent),
    /// Any other `object_kind`; carries the kind for logging
    Unrecognized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobEvent {
    pub pipeline_id: PipelineId,
    pub job_id: JobId,
    pub status: JobStatus,
}

// -- GitLab webhook wire shapes --

#[derive(Deserialize)]
struct EventKind {
    #[serde(default)]
    object_kind: String,
}

#[derive(Deserialize)]
struct PipelineHook {
    object_attributes: PipelineAttributes,
    project: HookProject,
    commit: HookCommit,
    #[serde(default)]
    builds: Vec<HookBuild>,
}

#[derive(Deserialize)]
struct PipelineAttributes {
    id: PipelineId,
    #[serde(rename = "ref")]
    git_ref: String,
    #[serde(default)]
    stages: Vec<String>,
}

#[derive(Deserialize)]
struct HookProject {
    name: String,
    #[serde(default)]
    web_url: String,
}

#[derive(Deserialize)]
struct HookCommit {
    id: String,
    #[serde(default)]
    url: String,
    author: HookAuthor,
}

#[derive(Deserialize)]
struct HookAuthor {
    name: String,
}

#[derive(Deserialize)]
struct HookBuild {
    id: JobId,
    name: String,
    stage: String,
    status: JobStatus,
}

#[derive(Deserialize)]
struct BuildHook {
    pipeline_id: PipelineId,
    build_id: JobId,
    build_status: JobStatus,
}

/// Decodes a GitLab webhook body by its `object_kind`.
///
/// # Errors
///
/// Returns an error when the body is not JSON, or when a `pipeline` or
/// `build` event is missing required fields.
pub fn decode_event(body: &str) -> Result<InboundEvent> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let kind: EventKind = serde_json::from_value(value.clone())?;

    match kind.object_kind.as_str() {
        "pipeline" => {
            let hook: PipelineHook = serde_json::from_value(value)?;
            Ok(InboundEvent::Pipeline(hook.into_snapshot()))
        }
        "build" => {
            let hook: BuildHook = serde_json::from_value(value)?;
            Ok(InboundEvent::Job(JobEvent {
                pipeline_id: hook.pipeline_id,
                job_id: hook.build_id,
                status: hook.build_status,
            }))
        }
        _ => Ok(InboundEvent::Unrecognized(kind.object_kind)),
    }
}

impl PipelineHook {
    fn into_snapshot(self) -> PipelineSnapshot {
        PipelineSnapshot {
            pipeline_id: self.object_attributes.id,
            project: Project {
                name: self.project.name,
                web_url: self.project.web_url,
            },
            git_ref: self.object_attributes.git_ref,
            commit: Commit {
                id: self.commit.id,
                url: self.commit.url,
                author_name: self.commit.author.name,
            },
            stages: self.object_attributes.stages,
            builds: self
                .builds
                .into_iter()
                .map(|build| Job {
                    id: build.id,
                    name: build.name,
                    stage: build.stage,
                    status: build.status,
                })
                .collect(),
        }
    }
}
