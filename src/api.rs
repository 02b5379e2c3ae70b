use crate::config::AppConfig;
use crate::events::{log_event, EventType};
use crate::model::{InputKind, Run, RunStatus};
use crate::pipeline::is_direct_profile_url;
use crate::store::CanonicalStore;
use anyhow::{Context, Result};
use serde_json::json;
use uuid::Uuid;

/// Creates a run row in `intake`. The caller's input-kind hint is
/// overridden by the URL-pattern test on the subject; a recognizable
/// profile URL is always scraped directly.
pub fn start_run(
    store: &CanonicalStore,
    config: &AppConfig,
    subject: &str,
    input_kind_hint: Option<InputKind>,
    max_provider_calls: Option<u32>,
) -> Result<Run> {
    let input_kind = resolve_input_kind(subject, input_kind_hint, &config.scraper.profile_host);
    let budget = max_provider_calls
        .unwrap_or(config.pipeline.default_max_provider_calls)
        .max(1);
    let run = store.create_run(Run::new(subject, input_kind, budget))?;
    log_event(
        &store.run_dir(&run.id),
        run.id,
        EventType::RunCreated,
        json!({
            "subject": run.subject,
            "input_kind": run.input_kind,
            "max_provider_calls": run.max_provider_calls,
        }),
    )?;
    Ok(run)
}

/// Current run row, counters and status included.
pub fn get_status(store: &CanonicalStore, run_id: Uuid) -> Result<Run> {
    store
        .get_run(&run_id)?
        .with_context(|| format!("Run {run_id} not found"))
}

/// Cancels a run by writing the absorbing `error` status with a message.
/// The orchestrator observes the write at its next stage transition and
/// refuses to advance further.
pub fn cancel_run(store: &CanonicalStore, run_id: Uuid, reason: &str) -> Result<Run> {
    let run = store.update_run_status(
        &run_id,
        RunStatus::Error,
        None,
        None,
        Some(format!("cancelled: {reason}")),
    )?;
    let _ = log_event(
        &store.run_dir(&run_id),
        run_id,
        EventType::RunCancelled,
        json!({ "reason": reason }),
    );
    Ok(run)
}

fn resolve_input_kind(
    subject: &str,
    hint: Option<InputKind>,
    profile_host: &str,
) -> InputKind {
    if is_direct_profile_url(subject, profile_host) {
        InputKind::DirectUrl
    } else {
        hint.unwrap_or(InputKind::SearchQuery)
    }
}
