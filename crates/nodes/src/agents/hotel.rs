use async_trait::async_trait;
use pipeline::{Agent, AgentFailure, Message, StageName, StateUpdate, SummarySlot, TripState};

use super::{stage_name, AgentDeps, HOTEL_SPECIALIST};

/// Boutique stays are priced at this percentage of the standard rate.
const BOUTIQUE_RATE_PERCENT: u32 = 120;

/// Recommends accommodation. Owns [`SummarySlot::Hotel`].
#[derive(Debug, Clone)]
pub struct HotelSpecialist {
    name: StageName,
    deps: AgentDeps,
}

impl HotelSpecialist {
    pub fn new(deps: AgentDeps) -> Self {
        Self {
            name: stage_name(HOTEL_SPECIALIST),
            deps,
        }
    }

    fn draft(&self, state: &TripState) -> String {
        let request = state.request();
        let profile = self.deps.catalog.profile(request.destination());
        let boutique = request.prefers("boutique");

        let (style, nightly) = if boutique {
            (
                "Boutique hotel",
                profile.nightly_rate_usd * BOUTIQUE_RATE_PERCENT / 100,
            )
        } else {
            ("Well-reviewed hotel", profile.nightly_rate_usd)
        };
        let rooms = request.travelers().rooms_needed();
        let nights = request.nights();
        let total = nightly * rooms * nights;

        format!(
            "{style} in {neighbourhood}, {city}: {rooms} room(s) for {nights} nights, \
             about ${nightly} per room per night (≈ ${total} total). \
             Central for transit and close to {first_highlight}.",
            neighbourhood = profile.neighbourhood,
            city = profile.city,
            first_highlight = profile
                .highlights
                .first()
                .map(String::as_str)
                .unwrap_or("the main sights"),
        )
    }
}

#[async_trait]
impl Agent for HotelSpecialist {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        Some(SummarySlot::Hotel)
    }

    async fn execute(&self, state: &TripState) -> Result<StateUpdate, AgentFailure> {
        let summary = self
            .deps
            .refine(&self.name, "hotel specialist", self.draft(state))
            .await?;
        Ok(StateUpdate::new()
            .with_message(Message::assistant(&self.name, summary.clone()))
            .with_summary(SummarySlot::Hotel, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::trip;
    use crate::DestinationCatalog;

    #[tokio::test]
    async fn boutique_preference_is_priced_in() {
        let agent = HotelSpecialist::new(AgentDeps::offline(DestinationCatalog::builtin()));
        let update = agent.execute(&trip("boutique hotel")).await.unwrap();
        let summary = &update.assignment().unwrap().value;

        // Tokyo: 240 * 1.2 = 288 per night, 1 room, 5 nights.
        assert!(summary.starts_with("Boutique hotel in Shibuya, Tokyo"));
        assert!(summary.contains("$288 per room"));
        assert!(summary.contains("$1440 total"));
    }

    #[tokio::test]
    async fn standard_stay_without_preference() {
        let agent = HotelSpecialist::new(AgentDeps::offline(DestinationCatalog::builtin()));
        let update = agent.execute(&trip("")).await.unwrap();
        assert!(update
            .assignment()
            .unwrap()
            .value
            .starts_with("Well-reviewed hotel"));
    }
}
