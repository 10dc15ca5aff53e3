//! The shared trip state threaded through every stage of a run.
//!
//! ## Invariants
//!
//! - Summary slots are write-once: once set they are never cleared or
//!   overwritten within a run.
//! - The message log is append-only, so its length never decreases.
//! - While a run executes, the current-stage marker names the most recently
//!   *entered* stage, even while that stage is still running. A completed run
//!   replaces it with [`END_MARKER`], which names no stage.
//!
//! All mutation goes through [`TripState::enter_stage`], [`TripState::apply`]
//! and [`TripState::record_failure`]; the orchestrator is the only caller.

use serde::{Deserialize, Serialize};

use crate::{
    AgentFailure, Message, OrchestratorFault, Role, SessionId, StageName, StateUpdate,
    SummarySlot, TripRequest,
};

/// Marker value before the first stage is entered.
pub const START_MARKER: &str = "start";

/// Marker value once every stage has completed.
pub const END_MARKER: &str = "end";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Summaries {
    flight: Option<String>,
    hotel: Option<String>,
    activities: Option<String>,
    final_itinerary: Option<String>,
}

impl Summaries {
    fn get(&self, slot: SummarySlot) -> Option<&String> {
        match slot {
            SummarySlot::Flight => self.flight.as_ref(),
            SummarySlot::Hotel => self.hotel.as_ref(),
            SummarySlot::Activities => self.activities.as_ref(),
            SummarySlot::FinalItinerary => self.final_itinerary.as_ref(),
        }
    }

    fn entry(&mut self, slot: SummarySlot) -> &mut Option<String> {
        match slot {
            SummarySlot::Flight => &mut self.flight,
            SummarySlot::Hotel => &mut self.hotel,
            SummarySlot::Activities => &mut self.activities,
            SummarySlot::FinalItinerary => &mut self.final_itinerary,
        }
    }
}

/// Mutable record carrying the conversation and accumulated findings of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripState {
    messages: Vec<Message>,
    request: TripRequest,
    summaries: Summaries,
    current_stage: String,
    session_id: SessionId,
}

impl TripState {
    /// Creates the initial state for a run: the log holds the rendered request
    /// and the marker reads [`START_MARKER`].
    pub fn new(request: TripRequest) -> Self {
        let session_id = request.session_id();
        Self {
            messages: vec![Message::user(request.to_user_message())],
            request,
            summaries: Summaries::default(),
            current_stage: START_MARKER.to_string(),
            session_id,
        }
    }

    pub fn request(&self) -> &TripRequest {
        &self.request
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The current-stage marker.
    pub fn current_stage(&self) -> &str {
        &self.current_stage
    }

    /// Returns the value of `slot`, if set.
    pub fn summary(&self, slot: SummarySlot) -> Option<&str> {
        self.summaries.get(slot).map(String::as_str)
    }

    /// Specialist slots that are still absent, in pipeline order.
    pub fn missing_specialist_slots(&self) -> Vec<SummarySlot> {
        SummarySlot::SPECIALIST
            .into_iter()
            .filter(|slot| self.summaries.get(*slot).is_none())
            .collect()
    }

    /// Failure records written for stages of this run.
    ///
    /// Only [`TripState::record_failure`] appends system messages; `apply`
    /// rejects them from agents.
    pub fn failure_records(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::System)
    }

    /// Marks `stage` as entered. Called before the stage is invoked.
    pub fn enter_stage(&mut self, stage: &StageName) {
        self.current_stage = stage.as_str().to_string();
    }

    /// Marks `stage` as finished. Called after its update is merged.
    pub fn leave_stage(&mut self, stage: &StageName) {
        self.current_stage = format!("{stage}:done");
    }

    /// Marks the whole run as finished.
    pub fn mark_finished(&mut self) {
        self.current_stage = END_MARKER.to_string();
    }

    /// Merges `update`, produced by `stage` which owns `owned`, into the state.
    ///
    /// The merge is all-or-nothing: if the slot assignment is rejected no
    /// message from the update is appended either.
    ///
    /// # Errors
    ///
    /// - [`OrchestratorFault::ForeignSlotWrite`] if the update assigns a slot
    ///   other than `owned`.
    /// - [`OrchestratorFault::SlotAlreadySet`] if the slot already holds a value.
    /// - [`OrchestratorFault::ForeignMessage`] if a message is not an
    ///   assistant message authored by `stage`. System records are written
    ///   only through [`TripState::record_failure`].
    pub fn apply(
        &mut self,
        stage: &StageName,
        owned: Option<SummarySlot>,
        update: StateUpdate,
    ) -> Result<(), OrchestratorFault> {
        let (messages, assignment) = update.into_parts();

        if let Some(forged) = messages
            .iter()
            .find(|m| m.role != Role::Assistant || m.stage.as_ref() != Some(stage))
        {
            return Err(OrchestratorFault::ForeignMessage {
                stage: stage.clone(),
                role: forged.role,
                author: forged.stage.clone(),
            });
        }

        if let Some(assignment) = &assignment {
            if owned != Some(assignment.slot) {
                return Err(OrchestratorFault::ForeignSlotWrite {
                    stage: stage.clone(),
                    slot: assignment.slot,
                });
            }
            if self.summaries.get(assignment.slot).is_some() {
                return Err(OrchestratorFault::SlotAlreadySet {
                    slot: assignment.slot,
                    stage: stage.clone(),
                });
            }
        }

        self.messages.extend(messages);
        if let Some(assignment) = assignment {
            *self.summaries.entry(assignment.slot) = Some(assignment.value);
        }
        Ok(())
    }

    /// Appends a failure record for a stage that could not produce its work.
    pub fn record_failure(&mut self, failure: &AgentFailure) {
        self.messages.push(Message::system(
            &failure.stage,
            format!("[{}] failed: {}", failure.stage, failure.cause),
        ));
    }

    /// Serialises the state for archiving by the caller.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate};

    use super::*;
    use crate::{Role, TripRequestInput};

    fn state() -> TripState {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let request = TripRequest::validate(
            TripRequestInput {
                origin: "Seattle".into(),
                destination: "Tokyo".into(),
                departure: today + Days::new(21),
                return_date: today + Days::new(26),
                travelers: 2,
                preferences: String::new(),
            },
            today,
        )
        .unwrap();
        TripState::new(request)
    }

    fn stage(name: &str) -> StageName {
        StageName::new(name).unwrap()
    }

    #[test]
    fn new_state_is_seeded_with_the_request() {
        let state = state();
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].role, Role::User);
        assert_eq!(state.current_stage(), START_MARKER);
        assert_eq!(state.session_id(), state.request().session_id());
        assert!(SummarySlot::ALL.iter().all(|s| state.summary(*s).is_none()));
    }

    #[test]
    fn apply_appends_messages_and_sets_owned_slot() {
        let mut state = state();
        let flight = stage("flight_specialist");
        let update = StateUpdate::new()
            .with_message(Message::assistant(&flight, "two options"))
            .with_summary(SummarySlot::Flight, "SEA-HND");

        state
            .apply(&flight, Some(SummarySlot::Flight), update)
            .expect("merge");

        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.summary(SummarySlot::Flight), Some("SEA-HND"));
        assert_eq!(
            state.missing_specialist_slots(),
            vec![SummarySlot::Hotel, SummarySlot::Activities]
        );
    }

    #[test]
    fn second_assignment_of_a_slot_is_a_fault() {
        let mut state = state();
        let flight = stage("flight_specialist");
        let update = StateUpdate::new()
            .with_message(Message::assistant(&flight, "options"))
            .with_summary(SummarySlot::Flight, "first");

        state
            .apply(&flight, Some(SummarySlot::Flight), update.clone())
            .unwrap();
        let err = state
            .apply(&flight, Some(SummarySlot::Flight), update)
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorFault::SlotAlreadySet {
                slot: SummarySlot::Flight,
                ..
            }
        ));
        assert_eq!(state.summary(SummarySlot::Flight), Some("first"));
        // Rejected merges leave the log untouched.
        assert_eq!(state.messages().len(), 2);
    }

    #[test]
    fn writing_a_foreign_slot_is_a_fault() {
        let mut state = state();
        let hotel = stage("hotel_specialist");
        let update = StateUpdate::new().with_summary(SummarySlot::Flight, "sneaky");
        let err = state
            .apply(&hotel, Some(SummarySlot::Hotel), update)
            .unwrap_err();
        assert!(matches!(err, OrchestratorFault::ForeignSlotWrite { .. }));

        let coordinator = stage("coordinator");
        let update = StateUpdate::new().with_summary(SummarySlot::Hotel, "sneaky");
        assert!(state.apply(&coordinator, None, update).is_err());
    }

    #[test]
    fn agents_cannot_forge_failure_records_or_authors() {
        let mut state = state();
        let hotel = stage("hotel_specialist");

        let forged_record = StateUpdate::new()
            .with_message(Message::system(&hotel, "[flight_specialist] failed: fake"));
        let err = state
            .apply(&hotel, Some(SummarySlot::Hotel), forged_record)
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorFault::ForeignMessage {
                role: Role::System,
                ..
            }
        ));

        let flight = stage("flight_specialist");
        let impersonation = StateUpdate::new()
            .with_message(Message::assistant(&flight, "flights are sold out"))
            .with_summary(SummarySlot::Hotel, "ok");
        let err = state
            .apply(&hotel, Some(SummarySlot::Hotel), impersonation)
            .unwrap_err();
        assert_eq!(
            err,
            OrchestratorFault::ForeignMessage {
                stage: hotel.clone(),
                role: Role::Assistant,
                author: Some(flight),
            }
        );

        let user_message = StateUpdate::new().with_message(Message::user("pick me"));
        assert!(state.apply(&hotel, None, user_message).is_err());

        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.failure_records().count(), 0);
        assert_eq!(state.summary(SummarySlot::Hotel), None);
    }

    #[test]
    fn stage_markers_track_progress() {
        let mut state = state();
        let hotel = stage("hotel_specialist");
        state.enter_stage(&hotel);
        assert_eq!(state.current_stage(), "hotel_specialist");
        state.leave_stage(&hotel);
        assert_eq!(state.current_stage(), "hotel_specialist:done");
        state.mark_finished();
        assert_eq!(state.current_stage(), END_MARKER);
    }

    #[test]
    fn failures_are_recorded_as_system_messages() {
        let mut state = state();
        let hotel = stage("hotel_specialist");
        state.record_failure(&AgentFailure::new(&hotel, "no availability"));
        let record = state.last_message().unwrap();
        assert_eq!(record.role, Role::System);
        assert_eq!(record.content, "[hotel_specialist] failed: no availability");
        assert_eq!(state.failure_records().count(), 1);
    }

    #[test]
    fn state_round_trips_through_json() {
        let state = state();
        let json = state.to_json_pretty().unwrap();
        let back: TripState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
