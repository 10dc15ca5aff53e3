//! The pipeline executor: runs a stage list against one trip state.
//!
//! A run is a straight-line state machine. For each stage, in order:
//!
//! 1. stop if the caller cancelled or the step ceiling is used up;
//! 2. set the current-stage marker to the stage's name;
//! 3. invoke the agent and wait for it to finish;
//! 4. merge its update (or record its [`AgentFailure`]);
//! 5. emit a [`StepEvent`] carrying a snapshot of the state.
//!
//! Exactly one [`RunTermination`] follows the last step event. Stages of one
//! run never overlap, so the state needs no locking; separate runs share
//! nothing and may execute concurrently.
//!
//! Each agent invocation runs in its own task. A panic there is outside the
//! agent contract and ends the run with [`OrchestratorFault::StageAborted`].

use std::any::Any;
use std::sync::Arc;

use pipeline::{
    Agent, AgentFailure, OrchestratorFault, PipelineEvent, PlannerError, RunPhase, RunStatus,
    RunTermination, SessionId, StageOutcome, StateUpdate, StepCeiling, StepEvent, TripState,
};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::registry::StageRegistry;

/// Executor-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Ceiling applied by [`PipelineExecutor::run`].
    pub step_ceiling: StepCeiling,
    /// Capacity of each run's event channel.
    pub event_buffer: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_ceiling: StepCeiling::DEFAULT,
            event_buffer: 16,
        }
    }
}

/// Starts pipeline runs.
///
/// Must be used from within a tokio runtime: every run is driven by a spawned
/// task.
#[derive(Debug, Clone, Default)]
pub struct PipelineExecutor {
    config: ExecutorConfig,
}

impl PipelineExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Starts a run with the configured step ceiling.
    pub fn run(&self, state: TripState, stages: StageRegistry) -> RunHandle {
        self.run_with_ceiling(state, stages, self.config.step_ceiling)
    }

    /// Starts a run of `stages` against `state`, stopping after `ceiling` steps.
    ///
    /// The state is moved into the run; the caller gets it back through the
    /// events. A run cannot be restarted: replaying needs a fresh state.
    pub fn run_with_ceiling(
        &self,
        state: TripState,
        stages: StageRegistry,
        ceiling: StepCeiling,
    ) -> RunHandle {
        let (event_tx, event_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let (phase_tx, phase_rx) = watch::channel(RunPhase::Pending);
        let cancel = CancellationToken::new();
        let session_id = state.session_id();

        let driver = RunDriver {
            state,
            stages,
            ceiling,
            events: event_tx,
            phase: phase_tx,
            cancel: cancel.clone(),
            steps: 0,
        };
        let span = info_span!(
            "pipeline_run",
            session_id = %session_id,
            ceiling = %ceiling,
        );
        let join = tokio::spawn(driver.drive().instrument(span));

        RunHandle {
            session_id,
            events: event_rx,
            phase: phase_rx,
            cancel,
            driver: join,
        }
    }
}

// ---------------------------------------------------------------------------
// Run handle
// ---------------------------------------------------------------------------

/// Every event of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub steps: Vec<StepEvent>,
    pub termination: RunTermination,
}

impl RunReport {
    /// The state carried by the terminal event.
    ///
    /// On a completed run this equals the last step event's snapshot except
    /// for the marker, which reads [`pipeline::END_MARKER`] instead of
    /// `{last_stage}:done`. Messages and slots are identical.
    pub fn final_state(&self) -> &TripState {
        &self.termination.state
    }
}

/// The consumer side of one run.
///
/// Events arrive strictly in order: step events, then one terminal event.
/// Dropping the handle stops the run at the next stage boundary.
#[derive(Debug)]
pub struct RunHandle {
    session_id: SessionId,
    events: mpsc::Receiver<PipelineEvent>,
    phase: watch::Receiver<RunPhase>,
    cancel: CancellationToken,
    driver: JoinHandle<()>,
}

impl RunHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Waits for the next event; `None` once the terminal event was delivered.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Requests cancellation. Observed before the next stage starts; the
    /// running stage is never interrupted.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this run, for callers wiring external signals.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The run's current lifecycle phase.
    pub fn phase(&self) -> RunPhase {
        self.phase.borrow().clone()
    }

    /// A receiver notified on every phase change.
    pub fn watch_phase(&self) -> watch::Receiver<RunPhase> {
        self.phase.clone()
    }

    /// Drains the remaining events.
    ///
    /// # Errors
    ///
    /// [`OrchestratorFault::DriverLost`] if the event stream ends without a
    /// terminal event.
    pub async fn collect(mut self) -> Result<RunReport, OrchestratorFault> {
        let mut steps = Vec::new();
        while let Some(event) = self.events.recv().await {
            match event {
                PipelineEvent::Step(step) => steps.push(step),
                PipelineEvent::Finished(termination) => {
                    return Ok(RunReport { steps, termination });
                }
            }
        }

        let detail = match self.driver.await {
            Err(join_error) => join_error.to_string(),
            Ok(()) => "event stream closed early".to_string(),
        };
        Err(OrchestratorFault::DriverLost { detail })
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

struct RunDriver {
    state: TripState,
    stages: StageRegistry,
    ceiling: StepCeiling,
    events: mpsc::Sender<PipelineEvent>,
    phase: watch::Sender<RunPhase>,
    cancel: CancellationToken,
    steps: u32,
}

/// Why the stage loop stopped early.
enum Halt {
    Status(RunStatus),
    ConsumerGone,
}

impl RunDriver {
    async fn drive(mut self) {
        info!(stages = self.stages.len(), "Pipeline run started");

        match self.run_stages().await {
            Ok(()) => {
                self.state.mark_finished();
                self.finish(RunStatus::Completed).await;
            }
            Err(Halt::Status(status)) => self.finish(status).await,
            Err(Halt::ConsumerGone) => {
                info!(steps = self.steps, "Event consumer dropped; stopping run");
                self.phase.send_replace(RunPhase::Failed);
            }
        }
    }

    async fn run_stages(&mut self) -> Result<(), Halt> {
        let stages: Vec<Arc<dyn Agent>> = self.stages.iter().cloned().collect();

        for agent in stages {
            if self.events.is_closed() {
                return Err(Halt::ConsumerGone);
            }
            if self.cancel.is_cancelled() {
                info!(steps = self.steps, "Run cancelled at stage boundary");
                return Err(Halt::Status(RunStatus::Cancelled));
            }
            if self.ceiling.is_reached_by(self.steps) {
                warn!(
                    ceiling = %self.ceiling,
                    next_stage = %agent.name(),
                    "Step ceiling reached before the pipeline completed"
                );
                return Err(Halt::Status(RunStatus::RecursionLimitExceeded {
                    ceiling: self.ceiling,
                }));
            }

            let stage = agent.name().clone();
            self.steps += 1;
            self.state.enter_stage(&stage);
            self.phase.send_replace(RunPhase::Running {
                step: self.steps,
                stage: stage.clone(),
            });

            let span = info_span!("stage", stage = %stage, step = self.steps);
            let result = invoke(Arc::clone(&agent), self.state.clone())
                .instrument(span)
                .await;

            let outcome = match result {
                Ok(Ok(update)) => {
                    if update.is_empty() {
                        debug!(stage = %stage, "Stage returned an empty update");
                    }
                    if let Err(fault) = self.state.apply(&stage, agent.owned_slot(), update) {
                        error!(stage = %stage, error = %fault, "Rejected stage update");
                        return Err(Halt::Status(RunStatus::Failed {
                            error: PlannerError::Orchestrator(fault),
                        }));
                    }
                    debug!(stage = %stage, step = self.steps, "Stage update merged");
                    StageOutcome::Succeeded
                }
                Ok(Err(failure)) => {
                    // Attribute the failure to the stage that actually ran.
                    let failure = AgentFailure::new(&stage, failure.cause);
                    warn!(stage = %stage, cause = %failure.cause, "Stage failed; continuing");
                    self.state.record_failure(&failure);
                    StageOutcome::Failed {
                        cause: failure.cause,
                    }
                }
                Err(join_error) => {
                    let fault = OrchestratorFault::StageAborted {
                        stage: stage.clone(),
                        detail: describe_join_error(join_error),
                    };
                    error!(stage = %stage, error = %fault, "Stage aborted");
                    return Err(Halt::Status(RunStatus::Failed {
                        error: PlannerError::Orchestrator(fault),
                    }));
                }
            };

            self.state.leave_stage(&stage);
            info!(stage = %stage, step = self.steps, ?outcome, "Stage completed");

            let event = StepEvent {
                step: self.steps,
                stage,
                outcome,
                state: self.state.clone(),
            };
            if self.events.send(PipelineEvent::Step(event)).await.is_err() {
                return Err(Halt::ConsumerGone);
            }
        }
        Ok(())
    }

    async fn finish(self, status: RunStatus) {
        let phase = match &status {
            RunStatus::Failed { .. } => RunPhase::Failed,
            _ => RunPhase::Completed,
        };
        info!(steps = self.steps, ?status, "Pipeline run finished");

        // Publish the phase first so a consumer holding the terminal event
        // never observes a stale phase.
        self.phase.send_replace(phase);

        let termination = RunTermination {
            status,
            steps: self.steps,
            state: self.state,
        };
        // A consumer that already left does not need the terminal event.
        let _ = self.events.send(PipelineEvent::Finished(termination)).await;
    }
}

async fn invoke(
    agent: Arc<dyn Agent>,
    snapshot: TripState,
) -> Result<Result<StateUpdate, AgentFailure>, JoinError> {
    tokio::spawn(async move { agent.execute(&snapshot).await }.in_current_span()).await
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        let payload: Box<dyn Any + Send> = err.into_panic();
        if let Some(msg) = payload.downcast_ref::<&str>() {
            return format!("panicked: {msg}");
        }
        if let Some(msg) = payload.downcast_ref::<String>() {
            return format!("panicked: {msg}");
        }
        "panicked".to_string()
    } else {
        err.to_string()
    }
}
