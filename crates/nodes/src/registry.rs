//! Ordered, validated stage lists.

use std::collections::HashSet;
use std::sync::Arc;

use pipeline::{Agent, OrchestratorFault, StageName};

use crate::agents::{
    ActivitySpecialist, AgentDeps, Coordinator, FlightSpecialist, HotelSpecialist,
    PlanSynthesizer,
};

/// A fixed, linear sequence of stages.
///
/// Construction validates the list, so a registry handed to the executor is
/// never empty and never contains two stages with the same name.
#[derive(Clone)]
pub struct StageRegistry {
    stages: Vec<Arc<dyn Agent>>,
}

impl StageRegistry {
    /// Builds a registry from `stages`, in execution order.
    ///
    /// # Errors
    ///
    /// [`OrchestratorFault::EmptyStageList`] or
    /// [`OrchestratorFault::DuplicateStage`] for a malformed list.
    pub fn new(stages: Vec<Arc<dyn Agent>>) -> Result<Self, OrchestratorFault> {
        if stages.is_empty() {
            return Err(OrchestratorFault::EmptyStageList);
        }
        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.name().clone()) {
                return Err(OrchestratorFault::DuplicateStage {
                    stage: stage.name().clone(),
                });
            }
        }
        Ok(Self { stages })
    }

    /// The default travel pipeline: coordinator, flight, hotel, activity,
    /// plan synthesizer.
    pub fn travel_planner(deps: AgentDeps) -> Self {
        Self {
            stages: vec![
                Arc::new(Coordinator::new(deps.clone())),
                Arc::new(FlightSpecialist::new(deps.clone())),
                Arc::new(HotelSpecialist::new(deps.clone())),
                Arc::new(ActivitySpecialist::new(deps.clone())),
                Arc::new(PlanSynthesizer::new(deps)),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false` for a constructed registry.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Agent>> {
        self.stages.iter()
    }

    pub fn names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name().clone()).collect()
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name().as_str()))
            .finish()
    }
}
