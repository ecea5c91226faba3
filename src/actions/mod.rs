//! Interactive controls on a pipeline message and the patches they produce.
//!
//! Every control carries a stable identity: its [`ActionId`] plus a
//! self-describing value naming its target. Patches locate the clicked
//! control by that identity in the blocks the user actually saw.

mod diagnostics;
mod log_tail;
mod splice;
mod test_summary;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::{JobId, MessageRef, PipelineId};

pub use diagnostics::{log_block, test_summary_block};
pub use splice::{has_control, splice};
pub use test_summary::{parse_test_summary, TestSummary};

/// Kinds of interactive control the relay renders or recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionId {
    /// Expand a stage's job list
    Show,
    /// Collapse a stage's job list
    Hide,
    ShowLog,
    ShowTestSummary,
    /// Link button to the pipeline page; nothing to do server-side
    ViewPipeline,
    /// Placeholder control; acknowledged only
    ConfigureAlerts,
}

impl ActionId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Hide => "hide",
            Self::ShowLog => "show_log",
            Self::ShowTestSummary => "show_test_summary",
            Self::ViewPipeline => "view_pipeline",
            Self::ConfigureAlerts => "configure_alerts",
        }
    }

    pub fn parse(action_id: &str) -> Option<Self> {
        match action_id {
            "show" => Some(Self::Show),
            "hide" => Some(Self::Hide),
            "show_log" => Some(Self::ShowLog),
            "show_test_summary" => Some(Self::ShowTestSummary),
            "view_pipeline" => Some(Self::ViewPipeline),
            "configure_alerts" => Some(Self::ConfigureAlerts),
            _ => None,
        }
    }
}

/// Value of a stage toggle control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTarget {
    pub stage: String,
    pub pipeline_id: PipelineId,
}

/// Value of a show-log control: the job id in decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTarget {
    pub job_id: JobId,
}

/// Value of a show-test-summary control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTarget {
    pub job_id: JobId,
    pub job_name: String,
}

impl StageTarget {
    pub fn encode(&self) -> String {
        serde_json::json!({ "stage": self.stage, "pipeline_id": self.pipeline_id }).to_string()
    }

    pub fn decode(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }
}

impl JobTarget {
    pub fn encode(self) -> String {
        self.job_id.to_string()
    }

    pub fn decode(value: &str) -> Option<Self> {
        value.trim().parse().ok().map(|job_id| Self { job_id })
    }
}

impl TestTarget {
    pub fn encode(&self) -> String {
        serde_json::json!({ "job_id": self.job_id, "job_name": self.job_name }).to_string()
    }

    pub fn decode(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }
}

/// An activated control, as delivered by the chat platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub action_id: String,
    pub value: String,
    /// Message hosting the control
    pub message_ref: MessageRef,
    /// The message's blocks as the user saw them
    pub blocks: Vec<Value>,
    /// The message's current plain-text fallback
    pub text: String,
}
