use super::support::{alice_payload, vector_store, FakeScraper};
use super::PipelineHarness;
use anyhow::Result;
use dossier::api;
use dossier::events::{EventLog, EventType};
use dossier::model::{content_hash, InputKind, RunStatus};
use dossier::pipeline::{ProfileStrength, RunPipeline, TractionRating};

const ALICE_URL: &str = "https://www.linkedin.com/in/alice";

#[test]
fn direct_url_happy_path_reaches_completed_with_strong_report() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let vectors = vector_store(harness.workspace_path());
    let provider = FakeScraper::new().with_profile(ALICE_URL, alice_payload());

    let run = api::start_run(&store, &config, ALICE_URL, Some(InputKind::SearchQuery), Some(1))?;
    assert_eq!(run.input_kind, InputKind::DirectUrl);

    let pipeline = RunPipeline::new(&config, &store, Some(&vectors), &provider, None);
    let finished = pipeline.execute(run.id)?;

    assert_eq!(finished.status, RunStatus::Completed);
    assert_eq!(provider.trigger_calls(), 1);
    assert_eq!(finished.evidence_count, 1);

    let claims = store.claims_for_run(&run.id)?;
    assert!(claims.len() >= 5, "expected at least 5 claims, got {}", claims.len());
    let find = |predicate: &str| {
        claims
            .iter()
            .find(|c| c.predicate == predicate)
            .unwrap_or_else(|| panic!("missing claim {predicate}"))
    };
    assert_eq!(find("works_at").object, "Acme");
    assert_eq!(find("has_title").object, "Engineer");
    assert_eq!(find("located_in").object, "Paris, FR");
    assert_eq!(find("graduated_from").object, "MIT");
    assert_eq!(find("has_followers").object, "5000");

    let retrieved = pipeline.report(run.id)?;
    let analysis = retrieved
        .report
        .linkedin_profile_analysis
        .expect("profile analysis present");
    assert_eq!(analysis.profile_strength, ProfileStrength::Strong);
    assert_eq!(analysis.engagement_metrics.traction_rating, TractionRating::Medium);
    assert!(analysis.completeness_score >= 0.8);
    assert_eq!(analysis.recommendations.len(), 5);
    Ok(())
}

#[test]
fn stored_state_upholds_pipeline_invariants() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, alice_payload());

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    pipeline.execute(run.id)?;

    let evidence = store.evidence_for_run(&run.id)?;
    let claims = store.claims_for_run(&run.id)?;

    for row in &evidence {
        assert_eq!(row.content_hash, content_hash(&row.content));
    }
    for claim in &claims {
        assert!(
            evidence.iter().any(|e| e.id == claim.provenance.evidence_id),
            "claim {} has no originating evidence",
            claim.predicate
        );
        let verified_tags: Vec<_> = claim
            .policy_tags
            .iter()
            .filter(|t| t.starts_with("verified:"))
            .collect();
        assert_eq!(verified_tags.len(), 1, "claim {} tags: {:?}", claim.predicate, claim.policy_tags);
        assert!(
            claim.policy_tags.iter().any(|t| t.starts_with("source:")),
            "claim {} lacks a source tag",
            claim.predicate
        );
    }
    Ok(())
}

#[test]
fn stage_transitions_are_observed_in_order() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, alice_payload());

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    pipeline.execute(run.id)?;

    let events = EventLog::for_run_dir(&store.run_dir(&run.id)).load_events()?;
    let stages: Vec<String> = events
        .iter()
        .filter(|e| e.event_type == EventType::StageEntered)
        .filter_map(|e| e.details.get("stage").and_then(|s| s.as_str()).map(String::from))
        .collect();
    assert_eq!(
        stages,
        vec![
            "intake",
            "discover",
            "fetch",
            "normalize",
            "extract",
            "verify",
            "upsert",
            "synthesize",
            "publish",
            "completed"
        ]
    );
    Ok(())
}

#[test]
fn restart_resumes_from_persisted_status_without_rescraping() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new();

    // Simulate a crash after the fetch stage: the run row says
    // normalize, and its evidence is already durable.
    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let evidence = dossier::model::Evidence::new(
        run.id,
        ALICE_URL,
        ALICE_URL,
        alice_payload().to_string(),
        dossier::model::ContentKind::Json,
    );
    store.create_evidence(&evidence)?;
    store.update_run_status(&run.id, RunStatus::Normalize, Some(1), None, None)?;

    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    let finished = pipeline.execute(run.id)?;

    assert_eq!(finished.status, RunStatus::Completed);
    // The harvest stage is behind the resume point; no provider calls.
    assert_eq!(provider.trigger_calls(), 0);
    assert!(!store.claims_for_run(&run.id)?.is_empty());

    let events = EventLog::for_run_dir(&store.run_dir(&run.id)).load_events()?;
    let stages: Vec<&str> = events
        .iter()
        .filter(|e| e.event_type == EventType::StageEntered)
        .filter_map(|e| e.details.get("stage").and_then(|s| s.as_str()))
        .collect();
    assert!(!stages.contains(&"intake"));
    assert!(!stages.contains(&"fetch"));
    assert_eq!(stages.first(), Some(&"normalize"));
    assert_eq!(stages.last(), Some(&"completed"));
    Ok(())
}

#[test]
fn rerunning_a_completed_run_is_a_no_op() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, alice_payload());

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    pipeline.execute(run.id)?;
    let calls_after_first = provider.trigger_calls();

    let second = pipeline.execute(run.id)?;
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(provider.trigger_calls(), calls_after_first);
    Ok(())
}
