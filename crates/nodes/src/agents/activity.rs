use async_trait::async_trait;
use chrono::Days;
use pipeline::{Agent, AgentFailure, Message, StageName, StateUpdate, SummarySlot, TripState};

use super::{stage_name, AgentDeps, ACTIVITY_SPECIALIST};

/// Plans one activity per trip day. Owns [`SummarySlot::Activities`].
#[derive(Debug, Clone)]
pub struct ActivitySpecialist {
    name: StageName,
    deps: AgentDeps,
}

impl ActivitySpecialist {
    pub fn new(deps: AgentDeps) -> Self {
        Self {
            name: stage_name(ACTIVITY_SPECIALIST),
            deps,
        }
    }

    fn draft(&self, state: &TripState) -> String {
        let request = state.request();
        let profile = self.deps.catalog.profile(request.destination());

        let mut lines = vec![format!("Activities in {}:", profile.city)];
        for day in 0..request.nights() {
            let date = request
                .departure()
                .checked_add_days(Days::new(u64::from(day)))
                .unwrap_or(request.departure());
            let highlight = if profile.highlights.is_empty() {
                "Free day to explore"
            } else {
                profile.highlights[day as usize % profile.highlights.len()].as_str()
            };
            lines.push(format!(
                "- Day {} ({}): {}",
                day + 1,
                date.format("%a %b %-d"),
                highlight
            ));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl Agent for ActivitySpecialist {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        Some(SummarySlot::Activities)
    }

    async fn execute(&self, state: &TripState) -> Result<StateUpdate, AgentFailure> {
        let summary = self
            .deps
            .refine(&self.name, "activity specialist", self.draft(state))
            .await?;
        Ok(StateUpdate::new()
            .with_message(Message::assistant(&self.name, summary.clone()))
            .with_summary(SummarySlot::Activities, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::trip;
    use crate::DestinationCatalog;

    #[tokio::test]
    async fn one_line_per_night_cycling_highlights() {
        let agent = ActivitySpecialist::new(AgentDeps::offline(DestinationCatalog::builtin()));
        let update = agent.execute(&trip("")).await.unwrap();
        let summary = &update.assignment().unwrap().value;

        let days: Vec<&str> = summary.lines().filter(|l| l.starts_with("- Day")).collect();
        assert_eq!(days.len(), 5);
        assert!(days[0].contains("Senso-ji"));
        assert!(days[4].contains("Omoide Yokocho"));
    }
}
