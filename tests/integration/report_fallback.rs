use super::support::{alice_payload, CannedModel, FakeScraper};
use super::PipelineHarness;
use anyhow::Result;
use dossier::api;
use dossier::model::RunStatus;
use dossier::pipeline::RunPipeline;

const ALICE_URL: &str = "https://www.linkedin.com/in/alice";

#[test]
fn malformed_llm_output_triggers_deterministic_fallback() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, alice_payload());
    // The model answers every call with junk: extraction falls back to
    // field mapping, the overlay is ignored, synthesis falls back too.
    let model = CannedModel::answering("### definitely not json ###");

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, Some(&model));
    let finished = pipeline.execute(run.id)?;

    assert_eq!(finished.status, RunStatus::Completed);
    let retrieved = pipeline.report(run.id)?;
    let report = retrieved.report;
    assert!((report.confidence_score - 0.9).abs() < f64::EPSILON);
    assert!(!report.summary.is_empty());
    assert!(!report.timeline.is_empty());
    let analysis = report.linkedin_profile_analysis.expect("analysis present");
    assert_eq!(analysis.recommendations.len(), 5);
    Ok(())
}

#[test]
fn llm_extraction_claims_flow_through_verification() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, alice_payload());
    let model = CannedModel::answering(
        serde_json::json!({
            "entities": ["Alice", "Acme"],
            "claims": [
                {"predicate": "works_at", "object": "Acme", "confidence": 0.93},
                {"predicate": "has_skill", "object": "Rust", "confidence": 0.7}
            ]
        })
        .to_string(),
    );

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, Some(&model));
    pipeline.execute(run.id)?;

    let claims = store.claims_for_run(&run.id)?;
    let works_at = claims.iter().find(|c| c.predicate == "works_at").unwrap();
    assert!(works_at.policy_tags.contains(&"verified:high".to_string()));
    assert!(works_at.policy_tags.contains(&"extracted:ai".to_string()));
    let skill = claims.iter().find(|c| c.predicate == "has_skill").unwrap();
    assert!(skill.policy_tags.contains(&"verified:medium".to_string()));
    Ok(())
}

#[test]
fn extraction_is_persisted_back_onto_evidence() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, alice_payload());

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    pipeline.execute(run.id)?;

    let evidence = store.evidence_for_run(&run.id)?;
    assert_eq!(evidence.len(), 1);
    let extraction = evidence[0].extraction.as_ref().expect("extraction attached");
    assert!(!extraction.claims.is_empty());
    Ok(())
}
