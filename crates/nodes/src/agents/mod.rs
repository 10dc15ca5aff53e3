//! The five built-in pipeline stages.
//!
//! Each specialist composes a deterministic draft from the [`DestinationCatalog`]
//! and, when an [`LlmProvider`] is attached, asks the provider to refine it.
//! A provider error becomes an [`AgentFailure`] so the orchestrator's
//! partial-failure handling applies. The plan synthesizer is the exception: it
//! falls back to its draft instead of failing.

use std::sync::Arc;

use pipeline::{AgentFailure, CompletionRequest, LlmProvider, StageName};
use tracing::debug;

use crate::catalog::DestinationCatalog;

mod activity;
mod coordinator;
mod flight;
mod hotel;
mod synthesizer;

pub use activity::ActivitySpecialist;
pub use coordinator::Coordinator;
pub use flight::FlightSpecialist;
pub use hotel::HotelSpecialist;
pub use synthesizer::PlanSynthesizer;

pub const COORDINATOR: &str = "coordinator";
pub const FLIGHT_SPECIALIST: &str = "flight_specialist";
pub const HOTEL_SPECIALIST: &str = "hotel_specialist";
pub const ACTIVITY_SPECIALIST: &str = "activity_specialist";
pub const PLAN_SYNTHESIZER: &str = "plan_synthesizer";

/// Sampling settings forwarded to the provider on every refinement call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineSettings {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for RefineSettings {
    fn default() -> Self {
        Self {
            temperature: Some(0.4),
            max_tokens: Some(800),
        }
    }
}

/// Collaborators shared by every built-in stage.
#[derive(Clone)]
pub struct AgentDeps {
    pub catalog: Arc<DestinationCatalog>,
    pub provider: Option<Arc<dyn LlmProvider>>,
    pub settings: RefineSettings,
}

impl AgentDeps {
    /// Catalog-only drafting, no LLM.
    pub fn offline(catalog: DestinationCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            provider: None,
            settings: RefineSettings::default(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_settings(mut self, settings: RefineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the draft unchanged without a provider; otherwise the provider's
    /// refinement of it.
    pub(crate) async fn refine(
        &self,
        stage: &StageName,
        role: &str,
        draft: String,
    ) -> Result<String, AgentFailure> {
        let Some(provider) = &self.provider else {
            return Ok(draft);
        };

        let mut request = CompletionRequest::new(
            format!(
                "You are the {role} of a travel planning team. Improve the draft you are \
                 given: keep every concrete fact, keep it concise, and answer in markdown."
            ),
            format!("Draft to refine:\n\n{draft}"),
        );
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;

        debug!(stage = %stage, provider = %provider.describe(), "Refining draft");
        let response = provider
            .complete(request)
            .await
            .map_err(|e| AgentFailure::new(stage, format!("LLM call failed: {e}")))?;

        let text = response.text.trim();
        if text.is_empty() {
            return Err(AgentFailure::new(stage, "LLM returned an empty answer"));
        }
        Ok(text.to_string())
    }
}

impl std::fmt::Debug for AgentDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDeps")
            .field("provider", &self.provider.as_ref().map(|p| p.describe()))
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

pub(crate) fn stage_name(name: &'static str) -> StageName {
    // Built-in names are non-blank literals.
    StageName::new(name).unwrap_or_else(|| unreachable!("blank built-in stage name"))
}
