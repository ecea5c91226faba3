//! Event merging and action orchestration.
//!
//! The relay owns the write discipline for a pipeline's message: read the
//! stored render state, mutate a copy, persist it, then push a full
//! re-render to the chat platform. The only exception is creation, where
//! the message has to exist before there is a `MessageRef` to persist.

mod locks;
pub mod retention;

#[cfg(test)]
mod fakes;

use std::collections::BTreeSet;

use chrono::Utc;
use log::{debug, info, warn};
use serde_json::Value;

use crate::actions::{
    has_control, log_block, parse_test_summary, splice, test_summary_block, ActionId,
    ActionRequest, JobTarget, StageTarget, TestTarget,
};
use crate::error::{RelayError, Result};
use crate::pipeline::{
    decode_event, InboundEvent, JobEvent, JobId, MessageRef, PipelineId, PipelineRenderState,
    PipelineSnapshot,
};
use crate::providers::{ChatTransport, JobLogSource};
use crate::render::render;
use crate::store::{StateStore, StoreError};

use locks::PipelineLocks;

#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Channel new pipeline messages are posted to
    pub channel: String,
    /// Lines of job output shown by a log patch
    pub log_lines: usize,
    /// Read-modify-write attempts before giving up on a contended pipeline
    pub max_attempts: u32,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            channel: String::new(),
            log_lines: 30,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    UnrecognizedEvent(String),
    /// Job event for a pipeline with no stored state
    UnknownPipeline(PipelineId),
    JobNotInSnapshot {
        pipeline_id: PipelineId,
        job_id: JobId,
    },
    /// The activated control is no longer on the message, or its value is
    /// not one the relay produced
    StaleActionPayload,
    UnknownAction(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Created(MessageRef),
    Updated(MessageRef),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Updated(MessageRef),
    /// Informational control; nothing to change
    Acknowledged,
    Ignored(IgnoreReason),
}

enum Mutation {
    Applied(PipelineRenderState),
    Missing,
    Declined(IgnoreReason),
}

pub struct Relay<S, T, L> {
    store: S,
    transport: T,
    logs: L,
    options: RelayOptions,
    locks: PipelineLocks,
}

impl<S, T, L> Relay<S, T, L>
where
    S: StateStore,
    T: ChatTransport,
    L: JobLogSource,
{
    pub fn new(store: S, transport: T, logs: L, options: RelayOptions) -> Self {
        Self {
            store,
            transport,
            logs,
            options,
            locks: PipelineLocks::default(),
        }
    }

    /// Applies one inbound webhook body.
    ///
    /// # Errors
    ///
    /// Returns an error when the body cannot be decoded, the store is
    /// unavailable or keeps conflicting, or the chat platform rejects the
    /// message. State persisted before a rejected update stays persisted.
    pub async fn handle_event(&self, body: &str) -> Result<EventOutcome> {
        match decode_event(body)? {
            InboundEvent::Pipeline(snapshot) => self.apply_pipeline(snapshot).await,
            InboundEvent::Job(event) => self.apply_job(event).await,
            InboundEvent::Unrecognized(kind) => {
                warn!("Ignoring webhook with object_kind '{kind}'");
                Ok(EventOutcome::Ignored(IgnoreReason::UnrecognizedEvent(kind)))
            }
        }
    }

    /// Applies one activated control.
    ///
    /// # Errors
    ///
    /// Returns an error when the store, the log source or the chat platform
    /// fails. A failed log fetch leaves the message untouched so the control
    /// can be clicked again.
    pub async fn handle_action(&self, request: &ActionRequest) -> Result<ActionOutcome> {
        let Some(action) = ActionId::parse(&request.action_id) else {
            warn!("Ignoring unknown action '{}'", request.action_id);
            return Ok(ActionOutcome::Ignored(IgnoreReason::UnknownAction(
                request.action_id.clone(),
            )));
        };

        match action {
            ActionId::Show => self.toggle_stage(request, true).await,
            ActionId::Hide => self.toggle_stage(request, false).await,
            ActionId::ShowLog => self.show_log(request).await,
            ActionId::ShowTestSummary => self.show_test_summary(request).await,
            ActionId::ViewPipeline | ActionId::ConfigureAlerts => {
                debug!("Acknowledged informational action '{}'", request.action_id);
                Ok(ActionOutcome::Acknowledged)
            }
        }
    }

    async fn apply_pipeline(&self, snapshot: PipelineSnapshot) -> Result<EventOutcome> {
        let pipeline_id = snapshot.pipeline_id;
        let _guard = self.locks.acquire(pipeline_id).await;

        for _ in 0..self.options.max_attempts {
            let mutation = self
                .update_state(pipeline_id, |state| {
                    state.snapshot = snapshot.clone();
                    Ok(())
                })
                .await?;

            match mutation {
                Mutation::Applied(state) => {
                    self.dispatch_update(&state).await?;
                    info!("Updated message for pipeline {pipeline_id}");
                    return Ok(EventOutcome::Updated(state.message_ref));
                }
                Mutation::Declined(reason) => return Ok(EventOutcome::Ignored(reason)),
                Mutation::Missing => {
                    if let Some(message_ref) = self.create(&snapshot).await? {
                        return Ok(EventOutcome::Created(message_ref));
                    }
                }
            }
        }

        Err(RelayError::StoreContention {
            pipeline_id,
            attempts: self.options.max_attempts,
        })
    }

    /// Posts the first message for a pipeline and stores its state.
    ///
    /// Returns `None` when another writer stored state for the pipeline in
    /// the meantime; the message just posted is then orphaned.
    async fn create(&self, snapshot: &PipelineSnapshot) -> Result<Option<MessageRef>> {
        let pipeline_id = snapshot.pipeline_id;
        let rendered = render(snapshot, &BTreeSet::new());
        let blocks = rendered.json_blocks()?;

        let message_ref = self
            .transport
            .create_message(&self.options.channel, &blocks, &rendered.text)
            .await?;

        let state = PipelineRenderState::new(message_ref.clone(), snapshot.clone(), Utc::now());
        match self.store.put(pipeline_id, &state).await {
            Ok(_) => {
                info!(
                    "Created message {}/{} for pipeline {pipeline_id}",
                    message_ref.channel, message_ref.ts
                );
                Ok(Some(message_ref))
            }
            Err(StoreError::Conflict { .. }) => {
                warn!(
                    "Pipeline {pipeline_id} was created concurrently; message {}/{} is orphaned",
                    message_ref.channel, message_ref.ts
                );
                Ok(None)
            }
            Err(err) => {
                warn!(
                    "Message {}/{} for pipeline {pipeline_id} was posted but not stored",
                    message_ref.channel, message_ref.ts
                );
                Err(err.into())
            }
        }
    }

    async fn apply_job(&self, event: JobEvent) -> Result<EventOutcome> {
        let JobEvent {
            pipeline_id,
            job_id,
            status,
        } = event;
        let _guard = self.locks.acquire(pipeline_id).await;

        let mutation = self
            .update_state(pipeline_id, |state| {
                if state.snapshot.set_job_status(job_id, status) {
                    Ok(())
                } else {
                    Err(IgnoreReason::JobNotInSnapshot {
                        pipeline_id,
                        job_id,
                    })
                }
            })
            .await?;

        match mutation {
            Mutation::Applied(state) => {
                self.dispatch_update(&state).await?;
                debug!("Job {job_id} of pipeline {pipeline_id} is now {}", status.as_str());
                Ok(EventOutcome::Updated(state.message_ref))
            }
            Mutation::Missing => {
                warn!("Dropping job {job_id} event: pipeline {pipeline_id} has no message yet");
                Ok(EventOutcome::Ignored(IgnoreReason::UnknownPipeline(pipeline_id)))
            }
            Mutation::Declined(reason) => {
                warn!("Dropping job {job_id} event: not part of pipeline {pipeline_id}");
                Ok(EventOutcome::Ignored(reason))
            }
        }
    }

    async fn toggle_stage(&self, request: &ActionRequest, expand: bool) -> Result<ActionOutcome> {
        let Some(target) = StageTarget::decode(&request.value) else {
            return Ok(self.stale(request));
        };
        let pipeline_id = target.pipeline_id;
        let _guard = self.locks.acquire(pipeline_id).await;

        let mutation = self
            .update_state(pipeline_id, |state| {
                if !state.snapshot.stages.contains(&target.stage) {
                    return Err(IgnoreReason::StaleActionPayload);
                }
                if expand {
                    state.expanded_stages.insert(target.stage.clone());
                } else {
                    state.expanded_stages.remove(&target.stage);
                }
                Ok(())
            })
            .await?;

        match mutation {
            Mutation::Applied(state) => {
                if state.message_ref != request.message_ref {
                    warn!(
                        "Toggle for pipeline {pipeline_id} came from {}/{}; updating stored message {}/{}",
                        request.message_ref.channel,
                        request.message_ref.ts,
                        state.message_ref.channel,
                        state.message_ref.ts
                    );
                }
                self.dispatch_update(&state).await?;
                Ok(ActionOutcome::Updated(state.message_ref))
            }
            Mutation::Missing => Ok(ActionOutcome::Ignored(IgnoreReason::UnknownPipeline(
                pipeline_id,
            ))),
            Mutation::Declined(reason) => {
                debug!("Ignoring toggle of stage '{}' on pipeline {pipeline_id}", target.stage);
                Ok(ActionOutcome::Ignored(reason))
            }
        }
    }

    async fn show_log(&self, request: &ActionRequest) -> Result<ActionOutcome> {
        let Some(target) = JobTarget::decode(&request.value) else {
            return Ok(self.stale(request));
        };
        if !has_control(&request.blocks, &request.action_id, &request.value) {
            return Ok(self.stale(request));
        }

        let raw = self.logs.fetch_job_text(target.job_id).await?;
        let block = log_block(target.job_id, &raw, self.options.log_lines);
        self.patch(request, serde_json::to_value(block)?).await
    }

    async fn show_test_summary(&self, request: &ActionRequest) -> Result<ActionOutcome> {
        let Some(target) = TestTarget::decode(&request.value) else {
            return Ok(self.stale(request));
        };
        if !has_control(&request.blocks, &request.action_id, &request.value) {
            return Ok(self.stale(request));
        }

        let raw = self.logs.fetch_job_text(target.job_id).await?;
        let summary = parse_test_summary(&raw);
        if summary.is_none() {
            debug!("No test summary found in output of job {}", target.job_id);
        }
        let block = test_summary_block(&target.job_name, summary.as_ref());
        self.patch(request, serde_json::to_value(block)?).await
    }

    /// Replaces the clicked control's block in the message it came from.
    async fn patch(&self, request: &ActionRequest, replacement: Value) -> Result<ActionOutcome> {
        let Some(blocks) = splice(
            &request.blocks,
            &request.action_id,
            &request.value,
            replacement,
        ) else {
            return Ok(self.stale(request));
        };

        self.transport
            .update_message(&request.message_ref, &blocks, &request.text)
            .await?;
        Ok(ActionOutcome::Updated(request.message_ref.clone()))
    }

    fn stale(&self, request: &ActionRequest) -> ActionOutcome {
        debug!(
            "Stale '{}' action with value '{}'",
            request.action_id, request.value
        );
        ActionOutcome::Ignored(IgnoreReason::StaleActionPayload)
    }

    /// Read-modify-write of a pipeline's state with compare-and-swap retry.
    async fn update_state<F>(&self, pipeline_id: PipelineId, mut mutate: F) -> Result<Mutation>
    where
        F: FnMut(&mut PipelineRenderState) -> std::result::Result<(), IgnoreReason> + Send,
    {
        for attempt in 1..=self.options.max_attempts {
            let Some(mut state) = self.store.get(pipeline_id).await? else {
                return Ok(Mutation::Missing);
            };

            if let Err(reason) = mutate(&mut state) {
                return Ok(Mutation::Declined(reason));
            }
            state.updated_at = Utc::now();

            match self.store.put(pipeline_id, &state).await {
                Ok(revision) => {
                    state.revision = revision;
                    return Ok(Mutation::Applied(state));
                }
                Err(StoreError::Conflict {
                    expected, found, ..
                }) => {
                    warn!(
                        "Pipeline {pipeline_id} changed concurrently (revision {expected} -> {found}), attempt {attempt}"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RelayError::StoreContention {
            pipeline_id,
            attempts: self.options.max_attempts,
        })
    }

    async fn dispatch_update(&self, state: &PipelineRenderState) -> Result<()> {
        let rendered = render(&state.snapshot, &state.expanded_stages);
        let blocks = rendered.json_blocks()?;
        self.transport
            .update_message(&state.message_ref, &blocks, &rendered.text)
            .await?;
        Ok(())
    }
}
