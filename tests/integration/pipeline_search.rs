use super::support::{alice_payload, FakeScraper};
use super::PipelineHarness;
use anyhow::Result;
use dossier::api;
use dossier::model::{InputKind, RunStatus};
use dossier::pipeline::RunPipeline;
use serde_json::json;

fn search_hit(slug: &str) -> serde_json::Value {
    json!({ "name": format!("Alice {slug}"), "url": format!("https://www.linkedin.com/in/{slug}") })
}

#[test]
fn search_happy_path_spends_four_calls_and_completes() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new()
        .with_search_results(vec![search_hit("alice-1"), search_hit("alice-2")])
        .with_profile("https://www.linkedin.com/in/alice-1", alice_payload());

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
    // web search + profile search + 2 profile scrapes
    assert_eq!(provider.trigger_calls(), 4);
    assert_eq!(store.evidence_for_run(&run.id)?.len(), 4);
    Ok(())
}

#[test]
fn budget_exhaustion_stops_fanout_and_still_completes() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let hits: Vec<_> = (0..10).map(|i| search_hit(&format!("alice-{i}"))).collect();
    let provider = FakeScraper::new().with_search_results(hits);

    let run = api::start_run(
        &store,
        &config,
        "Alice Example",
        Some(InputKind::SearchQuery),
        Some(3),
    )?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    let finished = pipeline.execute(run.id)?;

    assert_eq!(finished.status, RunStatus::Completed);
    assert_eq!(provider.trigger_calls(), 3);
    Ok(())
}

#[test]
fn trigger_calls_never_exceed_the_run_budget() -> Result<()> {
    for budget in [1u32, 2, 3, 5, 8] {
        let harness = PipelineHarness::new();
        let config = harness.config();
        let store = harness.store();
        let hits: Vec<_> = (0..10).map(|i| search_hit(&format!("p-{i}"))).collect();
        let provider = FakeScraper::new().with_search_results(hits);

        let run = api::start_run(
            &store,
            &config,
            "Alice Example",
            Some(InputKind::SearchQuery),
            Some(budget),
        )?;
        let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
        pipeline.execute(run.id)?;
        assert!(
            provider.trigger_calls() <= budget,
            "budget {budget} exceeded: {} calls",
            provider.trigger_calls()
        );
    }
    Ok(())
}
