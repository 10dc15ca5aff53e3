use async_trait::async_trait;
use pipeline::{Agent, AgentFailure, Message, StageName, StateUpdate, SummarySlot, TripState};

use super::{stage_name, AgentDeps, COORDINATOR};

/// Interprets the request and lays out the plan for the specialists.
///
/// Owns no slot; contributes one message to the log.
#[derive(Debug, Clone)]
pub struct Coordinator {
    name: StageName,
    deps: AgentDeps,
}

impl Coordinator {
    pub fn new(deps: AgentDeps) -> Self {
        Self {
            name: stage_name(COORDINATOR),
            deps,
        }
    }

    fn draft(&self, state: &TripState) -> String {
        let request = state.request();
        let profile = self.deps.catalog.profile(request.destination());
        let preferences = if request.preferences().is_empty() {
            "none stated".to_string()
        } else {
            request.preferences().to_string()
        };

        format!(
            "Trip brief: {origin} → {destination}, {country}\n\
             - Dates: {departure} to {return_date} ({nights} nights)\n\
             - Travelers: {travelers}\n\
             - Preferences: {preferences}\n\n\
             Plan: the flight specialist will price the route, the hotel specialist will \
             find a base in {neighbourhood}, the activity specialist will fill each day, \
             and the plan synthesizer will assemble the itinerary.",
            origin = request.origin(),
            destination = request.destination(),
            country = profile.country,
            departure = request.departure().format("%Y-%m-%d"),
            return_date = request.return_date().format("%Y-%m-%d"),
            nights = request.nights(),
            travelers = request.travelers(),
            neighbourhood = profile.neighbourhood,
        )
    }
}

#[async_trait]
impl Agent for Coordinator {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        None
    }

    async fn execute(&self, state: &TripState) -> Result<StateUpdate, AgentFailure> {
        let brief = self
            .deps
            .refine(&self.name, "trip coordinator", self.draft(state))
            .await?;
        Ok(StateUpdate::new().with_message(Message::assistant(&self.name, brief)))
    }
}
