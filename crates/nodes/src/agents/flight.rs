use async_trait::async_trait;
use pipeline::{
    Agent, AgentFailure, Message, StageName, StateUpdate, SummarySlot, TripRequest, TripState,
};

use super::{stage_name, AgentDeps, FLIGHT_SPECIALIST};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cabin {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl Cabin {
    fn preferred(request: &TripRequest) -> Self {
        if request.prefers("first class") || request.prefers("first-class") {
            Cabin::First
        } else if request.prefers("business") {
            Cabin::Business
        } else if request.prefers("premium") {
            Cabin::PremiumEconomy
        } else {
            Cabin::Economy
        }
    }

    /// The cabin offered as the alternative option.
    fn alternative(self) -> Self {
        match self {
            Cabin::Economy => Cabin::PremiumEconomy,
            Cabin::PremiumEconomy => Cabin::Economy,
            Cabin::Business => Cabin::PremiumEconomy,
            Cabin::First => Cabin::Business,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Cabin::Economy => "Economy",
            Cabin::PremiumEconomy => "Premium economy",
            Cabin::Business => "Business class",
            Cabin::First => "First class",
        }
    }
}

/// Proposes round-trip flight options. Owns [`SummarySlot::Flight`].
#[derive(Debug, Clone)]
pub struct FlightSpecialist {
    name: StageName,
    deps: AgentDeps,
}

impl FlightSpecialist {
    pub fn new(deps: AgentDeps) -> Self {
        Self {
            name: stage_name(FLIGHT_SPECIALIST),
            deps,
        }
    }

    fn draft(&self, state: &TripState) -> String {
        let request = state.request();
        let from = self.deps.catalog.airport_for(request.origin());
        let to = self.deps.catalog.airport_for(request.destination());
        let cabin = Cabin::preferred(request);

        format!(
            "Flight options for {travelers} travelers, {from} ⇄ {to}:\n\
             1. {primary}, nonstop where available — out {departure}, back {return_date}.\n\
             2. {alternative}, one stop with a flexible fare — same dates.\n\
             Book seats together early; hold option 1 for 24 hours if the fare allows.",
            travelers = request.travelers(),
            primary = cabin.label(),
            alternative = cabin.alternative().label(),
            departure = request.departure().format("%Y-%m-%d"),
            return_date = request.return_date().format("%Y-%m-%d"),
        )
    }
}

#[async_trait]
impl Agent for FlightSpecialist {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        Some(SummarySlot::Flight)
    }

    async fn execute(&self, state: &TripState) -> Result<StateUpdate, AgentFailure> {
        let summary = self
            .deps
            .refine(&self.name, "flight specialist", self.draft(state))
            .await?;
        Ok(StateUpdate::new()
            .with_message(Message::assistant(&self.name, summary.clone()))
            .with_summary(SummarySlot::Flight, summary))
    }
}
