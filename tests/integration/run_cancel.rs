use super::support::{alice_payload, FakeScraper};
use super::PipelineHarness;
use anyhow::Result;
use dossier::api;
use dossier::model::RunStatus;
use dossier::pipeline::RunPipeline;

const ALICE_URL: &str = "https://www.linkedin.com/in/alice";

#[test]
fn cancelled_run_is_never_driven() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, alice_payload());

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    api::cancel_run(&store, run.id, "operator request")?;

    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    let finished = pipeline.execute(run.id)?;

    assert_eq!(finished.status, RunStatus::Error);
    assert_eq!(provider.trigger_calls(), 0);
    let message = finished.error_message.expect("cancellation message kept");
    assert!(message.contains("operator request"));
    Ok(())
}

#[test]
fn cancellation_message_survives_status_reads() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    api::cancel_run(&store, run.id, "budget freeze")?;

    let status = api::get_status(&store, run.id)?;
    assert_eq!(status.status, RunStatus::Error);
    assert!(status.error_message.unwrap().contains("budget freeze"));
    Ok(())
}

#[test]
fn runs_are_listed_in_creation_order() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();

    let first = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let second = api::start_run(&store, &config, "Alice Example", None, Some(2))?;

    let runs = store.list_runs()?;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, first.id);
    assert_eq!(runs[1].id, second.id);
    Ok(())
}
