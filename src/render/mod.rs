//! Deterministic rendering of a pipeline snapshot into message blocks.
//!
//! The same `(snapshot, expanded stages)` pair always yields the same
//! blocks: nothing here reads the clock, randomness, or a previous render.

pub mod blocks;

use std::collections::BTreeSet;

use serde_json::Value;

use crate::actions::{ActionId, JobTarget, StageTarget, TestTarget};
use crate::pipeline::{
    is_test_job, job_emoji, stage_status, Job, JobStatus, PipelineSnapshot, StageStatus,
};
use crate::providers::gitlab::links::{job_url, pipeline_url};
use blocks::{
    escape_mrkdwn, Block, Button, ButtonStyle, Element, Text, MAX_ACTION_ELEMENTS, MAX_BLOCKS,
    MAX_SECTION_FIELDS,
};

/// A rendered message: rich blocks plus the plain-text preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub blocks: Vec<Block>,
    pub text: String,
}

impl Rendered {
    /// Blocks as JSON values, the form transports and splicing work with.
    ///
    /// # Errors
    ///
    /// Returns an error if a block fails to serialize.
    pub fn json_blocks(&self) -> Result<Vec<Value>, serde_json::Error> {
        self.blocks.iter().map(serde_json::to_value).collect()
    }
}

/// Renders `snapshot` with the stages in `expanded` shown in detail.
///
/// Never emits more than [`MAX_BLOCKS`] blocks: stages, job fields and
/// diagnostic controls past the limit are counted in a context line instead.
pub fn render(snapshot: &PipelineSnapshot, expanded: &BTreeSet<String>) -> Rendered {
    let mut blocks = vec![Block::header(&snapshot.project.name), context_block(snapshot), Block::Divider];
    let controls = diagnostic_controls(snapshot);

    // Pipeline link, plus divider, heading, one row and an overflow line for diagnostics
    let reserved = if controls.is_empty() { 1 } else { 5 };
    let stage_room = MAX_BLOCKS - reserved - 1;
    let mut hidden_stages = 0;
    let mut hidden_jobs = 0;

    for stage in &snapshot.stages {
        if blocks.len() >= stage_room {
            hidden_stages += 1;
            continue;
        }

        let jobs: Vec<&Job> = snapshot.jobs_in_stage(stage).collect();
        let status = stage_status(jobs.iter().copied());

        if status == StageStatus::NotStarted {
            blocks.push(Block::section(&stage_line(stage, status, 0)));
            continue;
        }

        let is_expanded = expanded.contains(stage);
        blocks.push(Block::section_with_button(
            &stage_line(stage, status, jobs.len()),
            toggle_button(stage, snapshot.pipeline_id, is_expanded),
        ));

        if is_expanded {
            for chunk in jobs.chunks(MAX_SECTION_FIELDS) {
                if blocks.len() >= stage_room {
                    hidden_jobs += chunk.len();
                    continue;
                }
                blocks.push(Block::fields(
                    chunk.iter().map(|job| job_field(snapshot, job)).collect(),
                ));
            }
        }
    }

    if hidden_stages > 0 || hidden_jobs > 0 {
        blocks.push(overflow_line(&[(hidden_stages, "stage"), (hidden_jobs, "job")]));
    }

    if !controls.is_empty() {
        blocks.push(Block::Divider);
        blocks.push(Block::section("*:mag: Diagnostics*"));

        let mut rows = MAX_BLOCKS - 1 - blocks.len();
        if controls.len() > rows * MAX_ACTION_ELEMENTS {
            rows -= 1;
        }
        let shown = controls.len().min(rows * MAX_ACTION_ELEMENTS);

        blocks.extend(
            controls[..shown]
                .chunks(MAX_ACTION_ELEMENTS)
                .map(|chunk| Block::Actions {
                    elements: chunk.iter().cloned().map(Element::Button).collect(),
                }),
        );
        if shown < controls.len() {
            blocks.push(overflow_line(&[(controls.len() - shown, "diagnostic")]));
        }
    }

    blocks.push(Block::Actions {
        elements: vec![Element::Button(Button::link(
            "View pipeline",
            ActionId::ViewPipeline.as_str(),
            pipeline_url(&snapshot.project.web_url, snapshot.pipeline_id),
        ))],
    });

    Rendered {
        blocks,
        text: fallback_text(snapshot),
    }
}

/// Context line such as "+3 more stages, +12 more jobs not shown".
fn overflow_line(counts: &[(usize, &str)]) -> Block {
    let parts: Vec<String> = counts
        .iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, noun)| {
            let plural = if *count == 1 { "" } else { "s" };
            format!("+{count} more {noun}{plural}")
        })
        .collect();

    Block::Context {
        elements: vec![Text::mrkdwn(&format!("_{} not shown_", parts.join(", ")))],
    }
}

fn context_block(snapshot: &PipelineSnapshot) -> Block {
    let pipeline = pipeline_url(&snapshot.project.web_url, snapshot.pipeline_id);
    Block::Context {
        elements: vec![
            Text::mrkdwn(&format!("*Pipeline:* <{pipeline}|#{}>", snapshot.pipeline_id)),
            Text::mrkdwn(&format!("*Branch:* `{}`", escape_mrkdwn(&snapshot.git_ref))),
            Text::mrkdwn(&format!(
                "*Commit:* <{}|{}>",
                snapshot.commit.url,
                escape_mrkdwn(snapshot.commit.short_id())
            )),
            Text::mrkdwn(&format!("*Author:* {}", escape_mrkdwn(&snapshot.commit.author_name))),
        ],
    }
}

fn stage_line(stage: &str, status: StageStatus, job_count: usize) -> String {
    let stage = escape_mrkdwn(stage);
    match status {
        StageStatus::NotStarted => format!("{} *{stage}*  _{}_", status.emoji(), status.label()),
        _ => {
            let noun = if job_count == 1 { "job" } else { "jobs" };
            format!(
                "{} *{stage}*  _{}_  ({job_count} {noun})",
                status.emoji(),
                status.label()
            )
        }
    }
}

fn toggle_button(stage: &str, pipeline_id: u64, is_expanded: bool) -> Button {
    let target = StageTarget {
        stage: stage.to_string(),
        pipeline_id,
    }
    .encode();

    if is_expanded {
        Button::new("Hide jobs", ActionId::Hide.as_str(), target)
    } else {
        Button::new("Show jobs", ActionId::Show.as_str(), target)
    }
}

fn job_field(snapshot: &PipelineSnapshot, job: &Job) -> Text {
    Text::mrkdwn(&format!(
        "{} <{}|{}>",
        job_emoji(job.status),
        job_url(&snapshot.project.web_url, job.id),
        escape_mrkdwn(&job.name)
    ))
}

/// Jobs in stage order, then snapshot order; jobs of undeclared stages last.
fn ordered_jobs(snapshot: &PipelineSnapshot) -> Vec<&Job> {
    let mut jobs: Vec<&Job> = snapshot
        .stages
        .iter()
        .flat_map(|stage| snapshot.jobs_in_stage(stage))
        .collect();
    jobs.extend(
        snapshot
            .builds
            .iter()
            .filter(|job| !snapshot.stages.contains(&job.stage)),
    );
    jobs
}

/// Log controls for failed jobs and test-summary controls for finished
/// test jobs.
fn diagnostic_controls(snapshot: &PipelineSnapshot) -> Vec<Button> {
    let mut controls = Vec::new();

    for job in ordered_jobs(snapshot) {
        let failed = job.status == JobStatus::Failed;
        if failed {
            controls.push(
                Button::new(
                    &format!(":page_facing_up: {} log", job.name),
                    ActionId::ShowLog.as_str(),
                    JobTarget { job_id: job.id }.encode(),
                )
                .with_style(ButtonStyle::Danger),
            );
        }

        if (failed || job.status == JobStatus::Success) && is_test_job(&job.name) {
            controls.push(Button::new(
                &format!(":test_tube: {} tests", job.name),
                ActionId::ShowTestSummary.as_str(),
                TestTarget {
                    job_id: job.id,
                    job_name: job.name.clone(),
                }
                .encode(),
            ));
        }
    }

    controls
}

fn fallback_text(snapshot: &PipelineSnapshot) -> String {
    let overall = stage_status(&snapshot.builds);
    let failed = snapshot
        .builds
        .iter()
        .filter(|job| job.status == JobStatus::Failed)
        .count();

    let mut text = format!(
        "{} pipeline #{} on {}: {}",
        snapshot.project.name,
        snapshot.pipeline_id,
        snapshot.git_ref,
        overall.label()
    );
    if failed > 0 {
        text.push_str(&format!(" ({failed} failed)"));
    }
    text
}

#[cfg(test)]
mod tests;
