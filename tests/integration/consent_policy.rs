use super::support::{CannedModel, FakeScraper};
use super::PipelineHarness;
use anyhow::Result;
use dossier::api;
use dossier::model::RunStatus;
use dossier::pipeline::{ConsentFlags, RunPipeline};

const ALICE_URL: &str = "https://www.linkedin.com/in/alice";

fn email_emitting_model() -> CannedModel {
    CannedModel::answering(
        serde_json::json!({
            "entities": ["Alice"],
            "claims": [
                {"predicate": "works_at", "object": "Acme", "confidence": 0.9},
                {"predicate": "has_email", "object": "alice@example.com", "confidence": 0.95}
            ]
        })
        .to_string(),
    )
}

fn profile_payload() -> serde_json::Value {
    serde_json::json!({ "name": "Alice", "current_company_name": "Acme" })
}

#[test]
fn email_claims_are_dropped_under_default_consent() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, profile_payload());
    let model = email_emitting_model();

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, Some(&model));
    let finished = pipeline.execute(run.id)?;

    assert_eq!(finished.status, RunStatus::Completed);
    let claims = store.claims_for_run(&run.id)?;
    assert!(claims.iter().any(|c| c.predicate == "works_at"));
    assert!(
        !claims.iter().any(|c| c.predicate == "has_email"),
        "email claim must not be stored without consent"
    );
    Ok(())
}

#[test]
fn granted_email_consent_stores_only_the_redacted_value() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, profile_payload());
    let model = email_emitting_model();

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let consent = ConsentFlags {
        email: true,
        ..ConsentFlags::default()
    };
    let pipeline =
        RunPipeline::new(&config, &store, None, &provider, Some(&model)).with_consent(consent);
    pipeline.execute(run.id)?;

    let claims = store.claims_for_run(&run.id)?;
    let email = claims
        .iter()
        .find(|c| c.predicate == "has_email")
        .expect("email claim stored under granted consent");
    assert_eq!(email.object, "a***@example.com");
    assert!(email.policy_tags.contains(&"sensitive:contact".to_string()));
    assert!(email.policy_tags.contains(&"consent:explicit".to_string()));
    Ok(())
}

#[test]
fn report_badges_reflect_stored_consent_tags() -> Result<()> {
    let harness = PipelineHarness::new();
    let config = harness.config();
    let store = harness.store();
    let provider = FakeScraper::new().with_profile(ALICE_URL, profile_payload());

    let run = api::start_run(&store, &config, ALICE_URL, None, Some(1))?;
    let pipeline = RunPipeline::new(&config, &store, None, &provider, None);
    pipeline.execute(run.id)?;

    let retrieved = pipeline.report(run.id)?;
    assert!(retrieved
        .report
        .consent_badges
        .contains(&"public_data".to_string()));
    Ok(())
}
