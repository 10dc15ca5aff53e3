//! The agent port: one unit of work in the pipeline.
//!
//! An agent reads the current [`TripState`] and returns a [`StateUpdate`]. It
//! never mutates the state directly; the orchestrator merges the update and
//! enforces slot ownership on the agent's behalf.

use async_trait::async_trait;

use crate::{AgentFailure, StageName, StateUpdate, SummarySlot, TripState};

/// A pipeline stage.
///
/// Implementations may await external calls (e.g. an LLM provider). The
/// orchestrator never runs two stages of the same run concurrently, so an
/// implementation can rely on every earlier stage's update being visible in
/// `state`.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The registered stage name, unique within a stage list.
    fn name(&self) -> &StageName;

    /// The summary slot this agent may assign, or `None` if it only appends
    /// messages.
    fn owned_slot(&self) -> Option<SummarySlot>;

    /// Produces this stage's contribution.
    ///
    /// # Errors
    ///
    /// Returns [`AgentFailure`] if the work could not be produced. The run
    /// continues without this stage's slot.
    async fn execute(&self, state: &TripState) -> Result<StateUpdate, AgentFailure>;
}
