//! End-to-end behaviour of the pipeline executor against the built-in and
//! scripted stages.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use nodes::{
    ActivitySpecialist, AgentDeps, Coordinator, DestinationCatalog, ExecutorConfig,
    FlightSpecialist, PipelineExecutor, PlanSynthesizer, RunReport, StageRegistry,
};
use pipeline::{
    Agent, AgentFailure, Message, OrchestratorFault, PipelineEvent, PlannerError, Role, RunPhase,
    RunStatus, StageName, StageOutcome, StateUpdate, StepCeiling, SummarySlot, TripRequest,
    TripRequestInput, TripState, ValidationError,
};
use tokio::sync::Notify;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn input(origin: &str, destination: &str) -> TripRequestInput {
    TripRequestInput {
        origin: origin.into(),
        destination: destination.into(),
        departure: today() + Days::new(21),
        return_date: today() + Days::new(26),
        travelers: 2,
        preferences: "boutique hotel".into(),
    }
}

fn seattle_to_tokyo() -> TripState {
    TripState::new(TripRequest::validate(input("Seattle", "Tokyo"), today()).unwrap())
}

fn deps() -> AgentDeps {
    AgentDeps::offline(DestinationCatalog::builtin())
}

fn name(value: &str) -> StageName {
    StageName::new(value).unwrap()
}

async fn run(stages: Vec<Arc<dyn Agent>>, ceiling: u32) -> RunReport {
    let registry = StageRegistry::new(stages).unwrap();
    PipelineExecutor::default()
        .run_with_ceiling(seattle_to_tokyo(), registry, StepCeiling::new(ceiling).unwrap())
        .collect()
        .await
        .unwrap()
}

fn default_stages() -> Vec<Arc<dyn Agent>> {
    StageRegistry::travel_planner(deps()).iter().cloned().collect()
}

/// Stage that always reports an agent failure.
struct FailingStage {
    name: StageName,
    slot: SummarySlot,
}

#[async_trait]
impl Agent for FailingStage {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        Some(self.slot)
    }

    async fn execute(&self, _state: &TripState) -> Result<StateUpdate, AgentFailure> {
        Err(AgentFailure::new(&self.name, "no rooms available"))
    }
}

/// Stage that writes a fixed slot, whether or not it owns it.
struct SlotWriter {
    name: StageName,
    owns: Option<SummarySlot>,
    writes: SummarySlot,
}

#[async_trait]
impl Agent for SlotWriter {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        self.owns
    }

    async fn execute(&self, _state: &TripState) -> Result<StateUpdate, AgentFailure> {
        Ok(StateUpdate::new()
            .with_message(Message::assistant(&self.name, "writing"))
            .with_summary(self.writes, "value"))
    }
}

/// Stage that records the marker it observes, then waits for a signal.
struct GateStage {
    name: StageName,
    gate: Arc<Notify>,
    observed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Agent for GateStage {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        None
    }

    async fn execute(&self, state: &TripState) -> Result<StateUpdate, AgentFailure> {
        self.observed
            .lock()
            .unwrap()
            .push(state.current_stage().to_string());
        self.gate.notified().await;
        Ok(StateUpdate::new().with_message(Message::assistant(&self.name, "released")))
    }
}

/// Stage that takes a while and counts how many times it was started.
struct SlowStage {
    name: StageName,
    started: Arc<AtomicUsize>,
}

#[async_trait]
impl Agent for SlowStage {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        None
    }

    async fn execute(&self, _state: &TripState) -> Result<StateUpdate, AgentFailure> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(StateUpdate::new().with_message(Message::assistant(&self.name, "slow work")))
    }
}

struct PanickingStage {
    name: StageName,
}

#[async_trait]
impl Agent for PanickingStage {
    fn name(&self) -> &StageName {
        &self.name
    }

    fn owned_slot(&self) -> Option<SummarySlot> {
        None
    }

    async fn execute(&self, _state: &TripState) -> Result<StateUpdate, AgentFailure> {
        panic!("stage exploded")
    }
}

// ---------------------------------------------------------------------------
// Ordering and counters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_event_per_stage_in_declared_order() {
    let report = run(default_stages(), 10).await;

    let stages: Vec<&str> = report.steps.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(
        stages,
        [
            "coordinator",
            "flight_specialist",
            "hotel_specialist",
            "activity_specialist",
            "plan_synthesizer"
        ]
    );
    let counters: Vec<u32> = report.steps.iter().map(|s| s.step).collect();
    assert_eq!(counters, [1, 2, 3, 4, 5]);
    assert_eq!(report.termination.status, RunStatus::Completed);
    assert_eq!(report.termination.steps, 5);
}

#[tokio::test]
async fn snapshots_grow_monotonically() {
    let report = run(default_stages(), 10).await;

    let mut previous_len = 1;
    let mut previous_slots = 0;
    for step in &report.steps {
        let len = step.state.messages().len();
        let slots = SummarySlot::ALL
            .iter()
            .filter(|s| step.state.summary(**s).is_some())
            .count();
        assert!(len >= previous_len);
        assert!(slots >= previous_slots);
        assert_eq!(step.state.current_stage(), format!("{}:done", step.stage));
        previous_len = len;
        previous_slots = slots;
    }
}

#[tokio::test]
async fn marker_names_the_running_stage() {
    let gate = Arc::new(Notify::new());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let probe = GateStage {
        name: name("probe"),
        gate: gate.clone(),
        observed: observed.clone(),
    };
    gate.notify_one();

    let stages: Vec<Arc<dyn Agent>> = vec![Arc::new(Coordinator::new(deps())), Arc::new(probe)];
    let report = run(stages, 10).await;

    assert_eq!(*observed.lock().unwrap(), ["probe"]);
    assert_eq!(report.final_state().current_stage(), pipeline::END_MARKER);
}

// ---------------------------------------------------------------------------
// Failure semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hotel_failure_still_produces_an_itinerary() {
    let stages: Vec<Arc<dyn Agent>> = vec![
        Arc::new(Coordinator::new(deps())),
        Arc::new(FlightSpecialist::new(deps())),
        Arc::new(FailingStage {
            name: name("hotel_specialist"),
            slot: SummarySlot::Hotel,
        }),
        Arc::new(ActivitySpecialist::new(deps())),
        Arc::new(PlanSynthesizer::new(deps())),
    ];
    let report = run(stages, 10).await;

    assert_eq!(report.steps.len(), 5);
    assert_eq!(
        report.steps[2].outcome,
        StageOutcome::Failed {
            cause: "no rooms available".into()
        }
    );
    assert_eq!(report.steps[4].stage.as_str(), "plan_synthesizer");
    assert_eq!(report.termination.status, RunStatus::Completed);

    let state = report.final_state();
    assert!(state.summary(SummarySlot::Hotel).is_none());
    assert!(state.summary(SummarySlot::FinalItinerary).is_some());
    assert!(state.messages().iter().any(|m| m.role == Role::System
        && m.content == "[hotel_specialist] failed: no rooms available"));
}

#[tokio::test]
async fn step_ceiling_cuts_the_run_short() {
    let report = run(default_stages(), 2).await;

    assert_eq!(report.steps.len(), 2);
    assert_eq!(
        report.termination.status,
        RunStatus::RecursionLimitExceeded {
            ceiling: StepCeiling::new(2).unwrap()
        }
    );
    // The partial state is kept as-is.
    let state = report.final_state();
    assert!(state.summary(SummarySlot::Flight).is_some());
    assert!(state.summary(SummarySlot::Hotel).is_none());

    let err = report.termination.into_result().unwrap_err();
    assert!(matches!(
        err,
        PlannerError::RecursionLimitExceeded { executed: 2, .. }
    ));
}

#[tokio::test]
async fn ceiling_equal_to_stage_count_completes() {
    let report = run(default_stages(), 5).await;
    assert_eq!(report.steps.len(), 5);
    assert!(report.termination.status.is_complete());
}

#[tokio::test]
async fn writing_a_slot_twice_aborts_the_run() {
    let stages: Vec<Arc<dyn Agent>> = vec![
        Arc::new(FlightSpecialist::new(deps())),
        Arc::new(SlotWriter {
            name: name("flight_specialist_again"),
            owns: Some(SummarySlot::Flight),
            writes: SummarySlot::Flight,
        }),
        Arc::new(PlanSynthesizer::new(deps())),
    ];
    let report = run(stages, 10).await;

    assert_eq!(report.steps.len(), 1);
    assert!(matches!(
        report.termination.status,
        RunStatus::Failed {
            error: PlannerError::Orchestrator(OrchestratorFault::SlotAlreadySet {
                slot: SummarySlot::Flight,
                ..
            })
        }
    ));
    // The original value survives.
    assert_ne!(
        report.final_state().summary(SummarySlot::Flight),
        Some("value")
    );
}

#[tokio::test]
async fn writing_a_foreign_slot_aborts_the_run() {
    let stages: Vec<Arc<dyn Agent>> = vec![Arc::new(SlotWriter {
        name: name("coordinator"),
        owns: None,
        writes: SummarySlot::FinalItinerary,
    })];
    let report = run(stages, 10).await;

    assert!(report.steps.is_empty());
    assert!(matches!(
        report.termination.status,
        RunStatus::Failed {
            error: PlannerError::Orchestrator(OrchestratorFault::ForeignSlotWrite { .. })
        }
    ));
}

#[tokio::test]
async fn panicking_stage_is_an_orchestrator_fault() {
    let stages: Vec<Arc<dyn Agent>> = vec![
        Arc::new(Coordinator::new(deps())),
        Arc::new(PanickingStage {
            name: name("flight_specialist"),
        }),
        Arc::new(PlanSynthesizer::new(deps())),
    ];
    let executor = PipelineExecutor::default();
    let handle = executor.run(
        seattle_to_tokyo(),
        StageRegistry::new(stages).unwrap(),
    );
    let phase = handle.watch_phase();
    let report = handle.collect().await.unwrap();

    assert_eq!(report.steps.len(), 1);
    match &report.termination.status {
        RunStatus::Failed {
            error: PlannerError::Orchestrator(OrchestratorFault::StageAborted { stage, detail }),
        } => {
            assert_eq!(stage.as_str(), "flight_specialist");
            assert!(detail.contains("stage exploded"));
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(*phase.borrow(), RunPhase::Failed);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_requests_never_reach_the_executor() {
    let mut raw = input("Seattle", "Tokyo");
    raw.return_date = raw.departure;

    let err = TripRequest::validate(raw, today()).unwrap_err();
    assert!(matches!(err, ValidationError::ReturnNotAfterDeparture { .. }));
    assert!(matches!(
        PlannerError::from(err),
        PlannerError::Validation(_)
    ));
}

// ---------------------------------------------------------------------------
// Cancellation and concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_is_observed_at_the_next_stage_boundary() {
    let gate = Arc::new(Notify::new());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let stages: Vec<Arc<dyn Agent>> = vec![
        Arc::new(GateStage {
            name: name("coordinator"),
            gate: gate.clone(),
            observed: observed.clone(),
        }),
        Arc::new(FlightSpecialist::new(deps())),
    ];
    let handle = PipelineExecutor::default().run(
        seattle_to_tokyo(),
        StageRegistry::new(stages).unwrap(),
    );

    let mut phase = handle.watch_phase();
    phase
        .wait_for(|p| matches!(p, RunPhase::Running { step: 1, .. }))
        .await
        .unwrap();
    handle.cancel();
    gate.notify_one();

    let report = handle.collect().await.unwrap();
    // The running stage finished; the next one never started.
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].outcome, StageOutcome::Succeeded);
    assert_eq!(report.termination.status, RunStatus::Cancelled);
    assert!(report.final_state().summary(SummarySlot::Flight).is_none());
}

#[tokio::test]
async fn dropping_the_event_stream_stops_the_run() {
    let started = Arc::new(AtomicUsize::new(0));
    let stages: Vec<Arc<dyn Agent>> = ["first", "second", "third", "fourth"]
        .into_iter()
        .map(|stage| {
            Arc::new(SlowStage {
                name: name(stage),
                started: started.clone(),
            }) as Arc<dyn Agent>
        })
        .collect();
    let executor = PipelineExecutor::new(ExecutorConfig {
        event_buffer: 1,
        ..ExecutorConfig::default()
    });
    let mut handle = executor.run(seattle_to_tokyo(), StageRegistry::new(stages).unwrap());

    let first = handle.next_event().await.unwrap();
    assert!(matches!(first, PipelineEvent::Step(ref step) if step.step == 1));
    let mut phase = handle.watch_phase();
    drop(handle);

    tokio::time::timeout(
        Duration::from_secs(5),
        phase.wait_for(|p| *p == RunPhase::Failed),
    )
    .await
    .expect("run did not stop after the consumer left")
    .unwrap();

    // At most the stage already past the boundary check runs after the drop.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(started.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn concurrent_runs_do_not_interfere() {
    let executor = PipelineExecutor::new(ExecutorConfig {
        step_ceiling: StepCeiling::DEFAULT,
        event_buffer: 1,
    });
    let paris = TripState::new(TripRequest::validate(input("Boston", "Paris"), today()).unwrap());
    let tokyo = seattle_to_tokyo();
    let (paris_id, tokyo_id) = (paris.session_id(), tokyo.session_id());

    let a = executor.run(paris, StageRegistry::travel_planner(deps()));
    let b = executor.run(tokyo, StageRegistry::travel_planner(deps()));
    let (a, b) = tokio::join!(a.collect(), b.collect());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(paris_id, tokyo_id);
    assert_eq!(a.final_state().session_id(), paris_id);
    assert_eq!(b.final_state().session_id(), tokyo_id);
    assert!(a
        .final_state()
        .summary(SummarySlot::FinalItinerary)
        .unwrap()
        .contains("Paris"));
    assert!(b
        .final_state()
        .summary(SummarySlot::FinalItinerary)
        .unwrap()
        .contains("Tokyo"));
}

#[tokio::test]
async fn events_can_be_consumed_one_at_a_time() {
    let mut handle = PipelineExecutor::default().run(
        seattle_to_tokyo(),
        StageRegistry::travel_planner(deps()),
    );

    let mut previews = Vec::new();
    let mut finished = false;
    while let Some(event) = handle.next_event().await {
        match event {
            PipelineEvent::Step(step) => {
                previews.push(step.preview(pipeline::PREVIEW_CHARS).unwrap());
            }
            PipelineEvent::Finished(_) => finished = true,
        }
    }

    assert!(finished);
    assert_eq!(previews.len(), 5);
    assert!(previews
        .iter()
        .all(|p| p.chars().count() <= pipeline::PREVIEW_CHARS + 3));
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn seattle_to_tokyo_end_to_end() {
    let report = run(default_stages(), 10).await;

    assert_eq!(report.steps.len(), 5);
    let state = report.final_state();
    for slot in SummarySlot::ALL {
        assert!(state.summary(slot).is_some(), "{slot} missing");
    }
    assert!(state.messages().len() >= 6);
    for step in &report.steps {
        assert!(state
            .messages()
            .iter()
            .any(|m| m.stage.as_ref() == Some(&step.stage)));
    }

    let itinerary = state.summary(SummarySlot::FinalItinerary).unwrap();
    assert!(itinerary.contains("Boutique hotel in Shibuya"));
    assert!(itinerary.contains("SEA ⇄ HND"));
}
