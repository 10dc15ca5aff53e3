//! Travel planner pipeline stages and the executor that drives them.
//!
//! This crate provides the five default stages (coordinator through plan
//! synthesizer), the destination catalog they draft from, the stage registry,
//! and the [`PipelineExecutor`] that runs a registry against one
//! [`pipeline::TripState`] and streams progress events.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence calls between domain types in the
//! [`pipeline`] crate and the [`pipeline::LlmProvider`] port. The merge rules
//! they rely on live in [`pipeline::TripState`], not here.
//!
//! ## Example
//!
//! ```no_run
//! # async fn demo(state: pipeline::TripState) {
//! use nodes::{AgentDeps, DestinationCatalog, PipelineExecutor, StageRegistry};
//! use pipeline::PipelineEvent;
//!
//! let registry = StageRegistry::travel_planner(AgentDeps::offline(DestinationCatalog::builtin()));
//! let mut run = PipelineExecutor::default().run(state, registry);
//! while let Some(event) = run.next_event().await {
//!     match event {
//!         PipelineEvent::Step(step) => println!("{} done", step.stage),
//!         PipelineEvent::Finished(end) => println!("{:?}", end.status),
//!     }
//! }
//! # }
//! ```

pub mod agents;
pub mod catalog;
pub mod executor;
pub mod registry;

pub use agents::{
    ActivitySpecialist, AgentDeps, Coordinator, FlightSpecialist, HotelSpecialist,
    PlanSynthesizer, RefineSettings,
};
pub use catalog::{DestinationCatalog, DestinationProfile};
pub use executor::{ExecutorConfig, PipelineExecutor, RunHandle, RunReport};
pub use registry::StageRegistry;
