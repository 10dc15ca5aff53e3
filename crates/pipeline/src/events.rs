//! Events emitted by a pipeline run.
//!
//! A run produces zero or more [`PipelineEvent::Step`] events, one per executed
//! stage, followed by exactly one [`PipelineEvent::Finished`]. Nothing is
//! emitted after the terminal event.

use serde::{Deserialize, Serialize};

use crate::{Message, PlannerError, StageName, StepCeiling, TripState};

/// Default number of characters of the newest message shown in progress views.
pub const PREVIEW_CHARS: usize = 300;

/// How a single stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage's update was merged.
    Succeeded,
    /// The stage reported an agent failure; a record was appended to the log.
    Failed { cause: String },
}

/// Record of one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// 1-based, strictly increasing within a run.
    pub step: u32,
    pub stage: StageName,
    pub outcome: StageOutcome,
    /// Snapshot of the state after the stage's update was merged.
    pub state: TripState,
}

impl StepEvent {
    /// The newest message in the snapshot.
    pub fn latest_message(&self) -> Option<&Message> {
        self.state.last_message()
    }

    /// Preview of the newest message, at most `max_chars` characters.
    pub fn preview(&self, max_chars: usize) -> Option<String> {
        self.latest_message().map(|m| m.preview(max_chars))
    }
}

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every stage ran.
    Completed,
    /// The step ceiling cut the run short. Degraded but not fatal.
    RecursionLimitExceeded { ceiling: StepCeiling },
    /// The caller cancelled the run between stages.
    Cancelled,
    /// An orchestrator-level fault aborted the run.
    Failed { error: PlannerError },
}

impl RunStatus {
    /// `true` only for [`RunStatus::Completed`].
    pub fn is_complete(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// The terminal event of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTermination {
    pub status: RunStatus,
    /// Stages executed, including failed ones.
    pub steps: u32,
    /// The state as it stood when the run ended. After a completed run the
    /// marker reads [`crate::END_MARKER`]; otherwise it is left as the last
    /// step event showed it.
    pub state: TripState,
}

impl RunTermination {
    /// Converts the termination into a `Result`, treating anything but
    /// [`RunStatus::Completed`] as an error.
    pub fn into_result(self) -> Result<TripState, PlannerError> {
        match self.status {
            RunStatus::Completed => Ok(self.state),
            RunStatus::RecursionLimitExceeded { ceiling } => {
                Err(PlannerError::RecursionLimitExceeded {
                    ceiling,
                    executed: self.steps,
                })
            }
            RunStatus::Cancelled => Err(PlannerError::Cancelled {
                executed: self.steps,
            }),
            RunStatus::Failed { error } => Err(error),
        }
    }
}

/// One item of a run's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Step(StepEvent),
    Finished(RunTermination),
}

/// Coarse lifecycle of a run, observable while it executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    Pending,
    Running { step: u32, stage: StageName },
    Completed,
    Failed,
}
