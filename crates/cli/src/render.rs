//! Terminal rendering and itinerary export.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use pipeline::{
    RunStatus, RunTermination, StageOutcome, StepEvent, SummarySlot, TripRequest, TripState,
    PREVIEW_CHARS,
};

/// One progress block for a finished stage: header with the step fraction,
/// then the preview of the stage's newest message.
pub fn progress_block(event: &StepEvent, total: usize) -> String {
    let total = total.max(1);
    let percent = (event.step as usize * 100 / total).min(100);
    let mut out = format!(
        "[{step}/{total} {percent:>3}%] {title}",
        step = event.step,
        title = event.stage.display_title(),
    );

    match &event.outcome {
        StageOutcome::Succeeded => {
            if let Some(preview) = event.preview(PREVIEW_CHARS) {
                for line in preview.lines() {
                    let _ = write!(out, "\n    {line}");
                }
            }
        }
        StageOutcome::Failed { cause } => {
            let _ = write!(out, "\n    failed: {cause}");
        }
    }
    out
}

fn slot_heading(slot: SummarySlot) -> &'static str {
    match slot {
        SummarySlot::Flight => "Flight Options",
        SummarySlot::Hotel => "Accommodation",
        SummarySlot::Activities => "Activities",
        SummarySlot::FinalItinerary => "Complete Itinerary",
    }
}

/// The final itinerary followed by each specialist summary.
pub fn final_report(state: &TripState) -> String {
    let mut out = String::new();
    let request = state.request();
    let _ = writeln!(
        out,
        "Trip {} -> {} ({} to {}, {} travelers)",
        request.origin(),
        request.destination(),
        request.departure(),
        request.return_date(),
        request.travelers().get(),
    );

    for slot in [SummarySlot::FinalItinerary]
        .into_iter()
        .chain(SummarySlot::SPECIALIST)
    {
        let _ = writeln!(out, "\n== {} ==", slot_heading(slot));
        match state.summary(slot) {
            Some(text) => {
                let _ = writeln!(out, "{}", text.trim_end());
            }
            None => {
                let _ = writeln!(out, "(not available)");
            }
        }
    }

    let failures: Vec<_> = state.failure_records().collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "\n== Stage Failures ==");
        for failure in failures {
            let _ = writeln!(out, "- {}", failure.content);
        }
    }
    out
}

/// A one-line description of how the run ended.
pub fn termination_line(termination: &RunTermination) -> String {
    match &termination.status {
        RunStatus::Completed => format!("Trip planning complete ({} steps).", termination.steps),
        RunStatus::RecursionLimitExceeded { ceiling } => format!(
            "Stopped after {} steps: step ceiling of {ceiling} reached. The plan is partial.",
            termination.steps
        ),
        RunStatus::Cancelled => format!(
            "Cancelled after {} steps. The plan is partial.",
            termination.steps
        ),
        RunStatus::Failed { error } => format!("Run aborted: {error}"),
    }
}

/// `travel_itinerary_{destination}_{departure}.txt`, with whitespace and
/// path separators in the destination replaced by underscores.
pub fn itinerary_file_name(request: &TripRequest) -> String {
    let destination: String = request
        .destination()
        .as_str()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '/' | '\\') {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!(
        "travel_itinerary_{destination}_{}.txt",
        request.departure().format("%Y-%m-%d")
    )
}

/// Writes the final itinerary into `dir`. Returns `None` when the run produced
/// no itinerary.
pub fn export_itinerary(dir: &Path, state: &TripState) -> std::io::Result<Option<PathBuf>> {
    let Some(itinerary) = state.summary(SummarySlot::FinalItinerary) else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(itinerary_file_name(state.request()));
    std::fs::write(&path, itinerary)?;
    Ok(Some(path))
}
