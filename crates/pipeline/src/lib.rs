//! Core domain for the travel planner.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, port trait, and error type used throughout the pipeline. The `nodes`
//! crate drives runs on top of these types; infrastructure crates implement the
//! ports defined here and never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`SessionId`, `StageName`, `CityName`) |
//! | [`types`] | Shared value types (`TravelerCount`, `StepCeiling`, `Message`, `SummarySlot`, `Timestamp`) |
//! | [`request`] | Validated `TripRequest` |
//! | [`state`] | `TripState` and its merge rules |
//! | [`update`] | `StateUpdate` patches produced by agents |
//! | [`agent`] | The `Agent` port |
//! | [`llm`] | The `LlmProvider` port |
//! | [`events`] | Step and terminal events emitted by a run |
//! | [`errors`] | Error taxonomy and retry policy |

pub mod agent;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod llm;
pub mod request;
pub mod state;
pub mod types;
pub mod update;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use agent::Agent;
pub use errors::{AgentFailure, OrchestratorFault, PlannerError, RetryPolicy, ValidationError};
pub use events::{
    PipelineEvent, RunPhase, RunStatus, RunTermination, StageOutcome, StepEvent, PREVIEW_CHARS,
};
pub use identifiers::{CityName, SessionId, StageName};
pub use llm::{CompletionRequest, CompletionResponse, LlmError, LlmProvider};
pub use request::{TripRequest, TripRequestInput, BOOKING_HORIZON_DAYS};
pub use state::{TripState, END_MARKER, START_MARKER};
pub use types::{Message, Role, StepCeiling, SummarySlot, Timestamp, TravelerCount};
pub use update::{SlotAssignment, StateUpdate};
