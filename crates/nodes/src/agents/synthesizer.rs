use async_trait::async_trait;
use pipeline::{Agent, AgentFailure, Message, StageName, StateUpdate, SummarySlot, TripState};
use tracing::warn;

use super::{
    stage_name, AgentDeps, ACTIVITY_SPECIALIST, FLIGHT_SPECIALIST, HOTEL_SPECIALIST,
    PLAN_SYNTHESIZER,
};

/// Assembles the final itinerary. Owns [`SummarySlot::FinalItinerary`].
///
/// Works with whatever specialist slots are present: an absent slot becomes a
/// "not available" section instead of a failure. A provider error falls back
/// to the unrefined itinerary, so this stage never fails the run.
#[derive(Debug, Clone)]
pub struct PlanSynthesizer {
    name: StageName,
    deps: AgentDeps,
}

impl PlanSynthesizer {
    pub fn new(deps: AgentDeps) -> Self {
        Self {
            name: stage_name(PLAN_SYNTHESIZER),
            deps,
        }
    }

    fn draft(&self, state: &TripState) -> String {
        let request = state.request();
        let profile = self.deps.catalog.profile(request.destination());

        let mut out = format!(
            "# {origin} → {destination}, {country}\n\n\
             ## Overview\n\
             {nights} nights, {departure} to {return_date}, {travelers} travelers.\n",
            origin = request.origin(),
            destination = request.destination(),
            country = profile.country,
            nights = request.nights(),
            departure = request.departure().format("%Y-%m-%d"),
            return_date = request.return_date().format("%Y-%m-%d"),
            travelers = request.travelers(),
        );
        if !request.preferences().is_empty() {
            out.push_str(&format!("Preferences: {}\n", request.preferences()));
        }

        for (heading, slot, owner) in [
            ("Flights", SummarySlot::Flight, FLIGHT_SPECIALIST),
            ("Accommodation", SummarySlot::Hotel, HOTEL_SPECIALIST),
            ("Activities", SummarySlot::Activities, ACTIVITY_SPECIALIST),
        ] {
            out.push_str(&format!("\n## {heading}\n"));
            match state.summary(slot) {
                Some(summary) => out.push_str(summary),
                None => out.push_str(&format!(
                    "_Not available: the {} stage did not produce a result. \
                     See the run log for details._",
                    owner
                )),
            }
            out.push('\n');
        }

        let missing = state.missing_specialist_slots();
        if !missing.is_empty() {
            out.push_str(&format!(
                "\n> This itinerary is incomplete ({} of 3 sections missing).\n",
                missing.len()
            ));
        }
        out
    }
}

#[async_trait]
impl Agent for PlanSynthesizer {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        Some(SummarySlot::FinalItinerary)
    }

    async fn execute(&self, state: &TripState) -> Result<StateUpdate, AgentFailure> {
        let draft = self.draft(state);
        let itinerary = match self
            .deps
            .refine(&self.name, "itinerary editor", draft.clone())
            .await
        {
            Ok(refined) => refined,
            Err(failure) => {
                warn!(
                    stage = %self.name,
                    cause = %failure.cause,
                    "Refinement failed; keeping the unrefined itinerary"
                );
                draft
            }
        };

        Ok(StateUpdate::new()
            .with_message(Message::assistant(&self.name, itinerary.clone()))
            .with_summary(SummarySlot::FinalItinerary, itinerary))
    }
}
