//! Error and retry-policy types for the travel planner domain.
//!
//! The taxonomy has four members, each with a different propagation rule:
//!
//! | Error | Raised | Effect on the run |
//! |-------|--------|-------------------|
//! | [`ValidationError`] | building a [`crate::TripRequest`] | run never starts |
//! | [`AgentFailure`] | a single stage | recorded in the message log, run continues |
//! | [`PlannerError::RecursionLimitExceeded`] | step ceiling reached | run ends early, partial state kept |
//! | [`OrchestratorFault`] | core state handling | run aborts with a terminal failure |
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Role, StageName, StepCeiling, SummarySlot};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let the caller decide whether to
/// re-invoke an operation before giving up.
///
/// - `Retryable` errors: timeouts, transient rate-limit responses, 5xx replies.
/// - `NonRetryable` errors: authentication failures, malformed requests,
///   unparseable responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A malformed trip request, rejected before any stage runs.
///
/// Fully recoverable: the caller re-prompts for the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// The origin city is blank.
    #[error("Origin city must not be empty")]
    MissingOrigin,

    /// The destination city is blank.
    #[error("Destination city must not be empty")]
    MissingDestination,

    /// Origin and destination name the same city.
    #[error("Origin and destination must differ (both are '{city}')")]
    SameOriginAndDestination {
        /// The repeated city.
        city: String,
    },

    /// The departure date lies before today.
    #[error("Departure date {departure} is in the past (today is {today})")]
    DepartureInPast {
        /// Requested departure.
        departure: NaiveDate,
        /// The reference date used for validation.
        today: NaiveDate,
    },

    /// The return date is not strictly after the departure date.
    #[error("Return date must be after departure date (departure {departure}, return {return_date})")]
    ReturnNotAfterDeparture {
        /// Requested departure.
        departure: NaiveDate,
        /// Requested return.
        return_date: NaiveDate,
    },

    /// A date lies beyond the booking horizon.
    #[error("Date {date} is beyond the booking horizon (latest {latest})")]
    BeyondBookingHorizon {
        /// The offending date.
        date: NaiveDate,
        /// Last bookable date.
        latest: NaiveDate,
    },

    /// The traveler count is outside `[1, 10]`.
    #[error("Traveler count {count} is out of range (1-10)")]
    TravelerCountOutOfRange {
        /// The requested count.
        count: u32,
    },
}

// ---------------------------------------------------------------------------
// Stage-level failure
// ---------------------------------------------------------------------------

/// A single stage could not produce its work.
///
/// Does not abort the run: the orchestrator records the cause in the message
/// log and moves on, leaving the stage's slot absent.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Stage '{stage}' failed: {cause}")]
pub struct AgentFailure {
    /// The stage that failed.
    pub stage: StageName,
    /// Human-readable cause.
    pub cause: String,
}

impl AgentFailure {
    /// Creates a failure for `stage`.
    pub fn new(stage: &StageName, cause: impl Into<String>) -> Self {
        Self {
            stage: stage.clone(),
            cause: cause.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator faults
// ---------------------------------------------------------------------------

/// A structural or integrity violation in core state handling.
///
/// Fatal to the run and surfaced as a terminal failure distinct from
/// [`AgentFailure`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum OrchestratorFault {
    /// An update tried to assign a slot that already holds a value.
    #[error("Slot '{slot}' is already set; refusing overwrite from stage '{stage}'")]
    SlotAlreadySet {
        /// The slot that was targeted.
        slot: SummarySlot,
        /// The stage whose update was rejected.
        stage: StageName,
    },

    /// An update targeted a slot the producing stage does not own.
    #[error("Stage '{stage}' may not write slot '{slot}'")]
    ForeignSlotWrite {
        /// The stage whose update was rejected.
        stage: StageName,
        /// The slot that was targeted.
        slot: SummarySlot,
    },

    /// An update carried a message the producing stage may not author: a
    /// non-assistant role, or one attributed to another stage.
    #[error("Stage '{stage}' may not append a {role:?} message attributed to {author:?}")]
    ForeignMessage {
        /// The stage whose update was rejected.
        stage: StageName,
        /// Role of the offending message.
        role: Role,
        /// Stage the offending message claims as its author.
        author: Option<StageName>,
    },

    /// The stage list contains no stages.
    #[error("Stage list is empty")]
    EmptyStageList,

    /// Two stages share a name.
    #[error("Stage list contains '{stage}' more than once")]
    DuplicateStage {
        /// The repeated stage name.
        stage: StageName,
    },

    /// A stage terminated outside the agent contract (e.g. it panicked).
    #[error("Stage '{stage}' aborted outside the agent contract: {detail}")]
    StageAborted {
        /// The stage that aborted.
        stage: StageName,
        /// Diagnostic detail from the runtime.
        detail: String,
    },

    /// The run's driver task ended without emitting a terminal event.
    #[error("Pipeline driver ended without a terminal event: {detail}")]
    DriverLost {
        /// Diagnostic detail from the runtime.
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Errors a caller sees when it asks for a run's result as a `Result`.
///
/// [`PlannerError::RecursionLimitExceeded`] and [`PlannerError::Cancelled`]
/// are degraded outcomes: the partial state is still available on the
/// terminal event that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PlannerError {
    /// The trip request was rejected before any stage ran.
    #[error("Invalid trip request: {0}")]
    Validation(#[from] ValidationError),

    /// The orchestrator aborted the run.
    #[error("Orchestrator fault: {0}")]
    Orchestrator(#[from] OrchestratorFault),

    /// The step ceiling was reached before every stage completed.
    #[error("Recursion limit of {ceiling} steps reached after {executed} stages")]
    RecursionLimitExceeded {
        /// Configured ceiling.
        ceiling: StepCeiling,
        /// Stages executed before the cut-off.
        executed: u32,
    },

    /// The caller cancelled the run between stages.
    #[error("Run cancelled after {executed} stages")]
    Cancelled {
        /// Stages executed before cancellation was observed.
        executed: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_failure_mentions_stage_and_cause() {
        let stage = StageName::new("hotel_specialist").unwrap();
        let failure = AgentFailure::new(&stage, "provider timed out");
        assert_eq!(
            failure.to_string(),
            "Stage 'hotel_specialist' failed: provider timed out"
        );
    }

    #[test]
    fn faults_convert_into_planner_errors() {
        let err: PlannerError = OrchestratorFault::EmptyStageList.into();
        assert!(matches!(
            err,
            PlannerError::Orchestrator(OrchestratorFault::EmptyStageList)
        ));
    }

    #[test]
    fn retry_policy_classification() {
        assert!(RetryPolicy::Retryable { after: None }.is_retryable());
        assert!(!RetryPolicy::NonRetryable.is_retryable());
    }
}
