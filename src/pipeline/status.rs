use super::types::{Job, JobStatus};

/// Display state of a stage line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// No jobs have been associated with the stage yet
    NotStarted,
    Pending,
    Running,
    Success,
    Failed,
}

impl StageStatus {
    pub fn emoji(self) -> &'static str {
        match self {
            Self::NotStarted => ":white_circle:",
            Self::Pending => ":hourglass_flowing_sand:",
            Self::Running => ":arrows_counterclockwise:",
            Self::Success => ":white_check_mark:",
            Self::Failed => ":x:",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "passed",
            Self::Failed => "failed",
        }
    }
}

/// Derives a stage's status from its jobs.
///
/// Precedence: any failed, then all success, then all created/pending,
/// otherwise running. An empty stage is `NotStarted`.
pub fn stage_status<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> StageStatus {
    let mut seen_any = false;
    let mut all_success = true;
    let mut all_waiting = true;

    for job in jobs {
        seen_any = true;
        match job.status {
            JobStatus::Failed => return StageStatus::Failed,
            JobStatus::Success => all_waiting = false,
            JobStatus::Created | JobStatus::Pending => all_success = false,
            _ => {
                all_success = false;
                all_waiting = false;
            }
        }
    }

    if !seen_any {
        StageStatus::NotStarted
    } else if all_success {
        StageStatus::Success
    } else if all_waiting {
        StageStatus::Pending
    } else {
        StageStatus::Running
    }
}

/// Emoji shown next to a job in an expanded stage.
pub fn job_emoji(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Success => ":white_check_mark:",
        JobStatus::Failed => ":x:",
        JobStatus::Running => ":arrows_counterclockwise:",
        JobStatus::Created | JobStatus::Pending | JobStatus::Preparing | JobStatus::Scheduled => {
            ":hourglass_flowing_sand:"
        }
        JobStatus::WaitingForResource => ":lock:",
        JobStatus::Canceled => ":no_entry_sign:",
        JobStatus::Skipped => ":fast_forward:",
        JobStatus::Manual => ":raised_hand:",
        JobStatus::Unknown => ":grey_question:",
    }
}
