use super::support::FakeScraper;
use super::PipelineHarness;
use anyhow::Result;
use dossier::api;
use dossier::model::{InputKind, RunStatus};
use dossier::pipeline::RunPipeline;

#[test]
fn scraper_timeout_completes_with_empty_minimal_report() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().failing_with_timeout();

    let run = api::start_run(
        &store,
        &config,
        "https://www.linkedin.com/in/alice",
        None,
        Some(1),
    )?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    let finished = pipeline.execute(run.id)?;

    // A failed harvest call is absorbed: the run still completes.
    assert_eq!(finished.status, RunStatus::Completed);
    assert_eq!(provider.trigger_calls(), 1);
    assert_eq!(finished.evidence_count, 0);
    assert!(finished.error_message.is_none());

    let retrieved = pipeline.report(run.id)?;
    assert!((retrieved.report.confidence_score - 0.5).abs() < f64::EPSILON);
    assert!(retrieved.report.timeline.is_empty());
    assert!(retrieved.report.summary.contains("0 evidence"));
    Ok(())
}

#[test]
fn single_token_search_errors_without_provider_calls() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new();

    let run = api::start_run(&store, &config, "Alice", Some(InputKind::SearchQuery), Some(5))?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    let finished = pipeline.execute(run.id)?;

    assert_eq!(finished.status, RunStatus::Error);
    assert_eq!(provider.trigger_calls(), 0);
    let message = finished.error_message.expect("error message recorded");
    assert!(message.contains("two name tokens"), "unexpected message {message}");
    Ok(())
}

#[test]
fn partial_scrape_failures_reduce_evidence_but_never_abort() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    // Search succeeds, but none of the fan-out profile payloads decode.
    let provider = FakeScraper::new()
        .with_search_results(vec![serde_json::json!({
            "name": "Alice One",
            "url": "https://www.linkedin.com/in/alice-1"
        })])
        .with_profile(
            "https://www.linkedin.com/in/alice-1",
            serde_json::json!({ "followers": "not-a-number" }),
        );

    let run = api::start_run(
        &store,
        &config,
        "Alice Example",
        Some(InputKind::SearchQuery),
        Some(5),
    )?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    let finished = pipeline.execute(run.id)?;

    assert_eq!(finished.status, RunStatus::Completed);
    // Web search + profile search evidence survive the failed fan-out.
    assert_eq!(store.evidence_for_run(&run.id)?.len(), 2);
    Ok(())
}
