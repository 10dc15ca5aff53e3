//! Travel planner CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `travel-planner.toml` (or `--config`) and
//!    validate it; command-line flags override file values.
//! 2. **Wire observability**: configure `tracing-subscriber` with a pretty or
//!    JSON layer and, when configured, an OpenTelemetry OTLP exporter. All
//!    `tracing` spans and structured events emitted by every crate in the
//!    workspace flow through it.
//! 3. **Construct infrastructure**: build the `OpenAiCompatibleProvider` when an
//!    `[llm]` section is present and inject it into the built-in stages.
//! 4. **Run one trip**: validate the request, drive the pipeline, render each
//!    step as it completes, and export the itinerary.
//!
//! Exit codes: `0` completed, `2` invalid trip request, `3` partial plan
//! (step ceiling reached or cancelled), `1` any other failure.

mod config;
mod render;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Days, Local, NaiveDate};
use clap::Parser;
use llm::OpenAiCompatibleProvider;
use nodes::{AgentDeps, DestinationCatalog, PipelineExecutor, StageRegistry};
use pipeline::{
    LlmProvider, PipelineEvent, RunStatus, RunTermination, TripRequest, TripRequestInput,
    TripState,
};
use tracing::{error, info, warn};

use crate::config::CliConfig;

const DEFAULT_PREFERENCES: &str =
    "We'd love a boutique hotel, business-class flights and memorable activities.";
const DEFAULT_LEAD_DAYS: u64 = 21;
const DEFAULT_TRIP_DAYS: u64 = 5;

const EXIT_FAILURE: u8 = 1;
const EXIT_INVALID_REQUEST: u8 = 2;
const EXIT_PARTIAL: u8 = 3;

/// Plan a trip with a team of specialist agents.
#[derive(Debug, Parser)]
#[command(name = "travel-planner", version, about)]
struct Args {
    /// City the trip starts from.
    #[arg(long)]
    origin: String,

    /// City to travel to.
    #[arg(long)]
    destination: String,

    /// Departure date (YYYY-MM-DD). Defaults to three weeks from today.
    #[arg(long)]
    departure: Option<NaiveDate>,

    /// Return date (YYYY-MM-DD). Defaults to five days after departure.
    #[arg(long = "return")]
    return_date: Option<NaiveDate>,

    /// Number of travelers (1-10).
    #[arg(long, default_value_t = 2)]
    travelers: u32,

    /// Free-text preferences, e.g. "boutique hotel, business class".
    #[arg(long, default_value = DEFAULT_PREFERENCES)]
    preferences: String,

    /// Maximum number of stages to execute.
    #[arg(long)]
    step_ceiling: Option<u32>,

    /// Configuration file. Defaults to ./travel-planner.toml when present.
    #[arg(long, env = "TRAVEL_PLANNER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the itinerary file is written to.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Skip writing the itinerary file.
    #[arg(long)]
    no_export: bool,

    /// Ignore the [llm] section and draft from the destination catalog only.
    #[arg(long)]
    offline: bool,

    /// Print every pipeline event as a JSON line instead of rendered text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let config =
        CliConfig::discover(args.config.as_deref()).context("Failed to load configuration")?;
    let telemetry = telemetry::init(&config.telemetry).context("Failed to initialise logging")?;
    info!(otlp = telemetry.exporting(), "Telemetry initialised");

    let result = plan_trip(&args, &config).await;
    telemetry.shutdown();
    result
}

async fn plan_trip(args: &Args, config: &CliConfig) -> anyhow::Result<ExitCode> {
    let today = Local::now().date_naive();
    let input = trip_input(args, today)?;
    let request = match TripRequest::validate(input, today) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Invalid trip request: {e}");
            return Ok(ExitCode::from(EXIT_INVALID_REQUEST));
        }
    };

    let executor = PipelineExecutor::new(config.executor_config(args.step_ceiling)?);
    let registry = StageRegistry::travel_planner(agent_deps(config, args.offline)?);
    let total = registry.len();
    let state = TripState::new(request);

    info!(
        session_id = %state.session_id(),
        origin = %state.request().origin(),
        destination = %state.request().destination(),
        ceiling = %executor.config().step_ceiling,
        "Planning trip"
    );
    if !args.json {
        println!(
            "Planning {} -> {} for {} travelers (session {})",
            state.request().origin(),
            state.request().destination(),
            state.request().travelers().get(),
            state.session_id(),
        );
    }

    let mut run = executor.run(state, registry);
    let cancel = run.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current stage");
            cancel.cancel();
        }
    });

    let mut termination = None;
    while let Some(event) = run.next_event().await {
        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        }
        match event {
            PipelineEvent::Step(step) => {
                if !args.json {
                    println!("{}", render::progress_block(&step, total));
                }
            }
            PipelineEvent::Finished(end) => termination = Some(end),
        }
    }
    let termination = termination.context("Pipeline ended without a terminal event")?;

    finish(args, &termination)
}

fn finish(args: &Args, termination: &RunTermination) -> anyhow::Result<ExitCode> {
    let state = &termination.state;

    if !args.json {
        println!("\n{}", render::termination_line(termination));
        if !matches!(termination.status, RunStatus::Failed { .. }) {
            println!("\n{}", render::final_report(state));
        }
    }

    if !args.no_export {
        let exported = render::export_itinerary(&args.output_dir, state).with_context(|| {
            format!(
                "Failed to write itinerary to {}",
                args.output_dir.display()
            )
        })?;
        if let Some(path) = exported {
            info!(path = %path.display(), "Itinerary exported");
            if !args.json {
                println!("Itinerary saved to {}", path.display());
            }
        }
    }

    Ok(match &termination.status {
        RunStatus::Completed => ExitCode::SUCCESS,
        RunStatus::RecursionLimitExceeded { .. } | RunStatus::Cancelled => {
            ExitCode::from(EXIT_PARTIAL)
        }
        RunStatus::Failed { error } => {
            error!(error = %error, "Pipeline aborted");
            ExitCode::from(EXIT_FAILURE)
        }
    })
}

fn trip_input(args: &Args, today: NaiveDate) -> anyhow::Result<TripRequestInput> {
    let departure = match args.departure {
        Some(date) => date,
        None => today
            .checked_add_days(Days::new(DEFAULT_LEAD_DAYS))
            .context("Default departure date is out of range")?,
    };
    let return_date = match args.return_date {
        Some(date) => date,
        None => departure
            .checked_add_days(Days::new(DEFAULT_TRIP_DAYS))
            .context("Default return date is out of range")?,
    };

    Ok(TripRequestInput {
        origin: args.origin.clone(),
        destination: args.destination.clone(),
        departure,
        return_date,
        travelers: args.travelers,
        preferences: args.preferences.clone(),
    })
}

fn agent_deps(config: &CliConfig, offline: bool) -> anyhow::Result<AgentDeps> {
    let deps = AgentDeps::offline(DestinationCatalog::builtin());
    let Some(section) = config.llm.as_ref().filter(|_| !offline) else {
        info!("No LLM configured; stages draft from the destination catalog");
        return Ok(deps);
    };

    let api_key = std::env::var(&section.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty());
    if api_key.is_none() {
        warn!(
            env = %section.api_key_env,
            "API key variable is not set; requests are sent without credentials"
        );
    }

    let provider = OpenAiCompatibleProvider::new(section.to_llm_config(api_key))
        .context("Failed to construct LLM provider")?;
    info!(provider = %provider.describe(), "LLM refinement enabled");

    Ok(deps
        .with_provider(Arc::new(provider))
        .with_settings(section.refine_settings()))
}
