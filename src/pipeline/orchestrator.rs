use super::extractor::Extractor;
use super::harvester::Harvester;
use super::report::Report;
use super::synthesizer::Synthesizer;
use super::verifier::{ConsentFlags, Verifier};
use crate::config::AppConfig;
use crate::events::{log_event, EventType};
use crate::llm::ChatModel;
use crate::model::{Claim, Evidence, InputKind, Run, RunStatus};
use crate::scraper::ScrapeProvider;
use crate::store::{CanonicalStore, VectorStore};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde_json::json;
use uuid::Uuid;

const STAGE_SEQUENCE: [RunStatus; 10] = [
    RunStatus::Intake,
    RunStatus::Discover,
    RunStatus::Fetch,
    RunStatus::Normalize,
    RunStatus::Extract,
    RunStatus::Verify,
    RunStatus::Upsert,
    RunStatus::Synthesize,
    RunStatus::Publish,
    RunStatus::Completed,
];

/// Everything report retrieval hands back: the run row plus the state
/// the report was synthesized from.
#[derive(Debug)]
pub struct RunReport {
    pub run: Run,
    pub report: Report,
    pub evidence: Vec<Evidence>,
    pub claims: Vec<Claim>,
}

enum StageFlow {
    Finished,
    Cancelled,
}

/// Drives one run end to end through the stage sequence
/// `intake → discover → fetch → normalize → extract → verify → upsert →
/// synthesize → publish → completed`.
///
/// The status is written to the canonical store before each stage
/// executes, so external observers always see the stage in progress.
/// Per-item failures are absorbed inside their stage; canonical store
/// failures send the run to `error`; vector index failures never do.
pub struct RunPipeline<'a> {
    config: &'a AppConfig,
    store: &'a CanonicalStore,
    vector: Option<&'a VectorStore>,
    provider: &'a dyn ScrapeProvider,
    model: Option<&'a dyn ChatModel>,
    consent: ConsentFlags,
}

impl<'a> RunPipeline<'a> {
    pub fn new(
        config: &'a AppConfig,
        store: &'a CanonicalStore,
        vector: Option<&'a VectorStore>,
        provider: &'a dyn ScrapeProvider,
        model: Option<&'a dyn ChatModel>,
    ) -> Self {
        Self {
            config,
            store,
            vector,
            provider,
            model,
            consent: ConsentFlags::default(),
        }
    }

    pub fn with_consent(mut self, consent: ConsentFlags) -> Self {
        self.consent = consent;
        self
    }

    /// Executes the run to a terminal state and returns the final row.
    /// A run already in a terminal state is returned untouched; a run
    /// left mid-pipeline by a restart resumes from its persisted status.
    pub fn execute(&self, run_id: Uuid) -> Result<Run> {
        let run = self
            .store
            .get_run(&run_id)?
            .with_context(|| format!("Run {run_id} not found"))?;
        if run.status.is_terminal() {
            return Ok(run);
        }

        match self.run_stages(&run) {
            Ok(StageFlow::Finished) | Ok(StageFlow::Cancelled) => Ok(self
                .store
                .get_run(&run_id)?
                .with_context(|| format!("Run {run_id} row disappeared"))?),
            Err(err) => {
                let message = format!("{err:#}");
                let _ = log_event(
                    &self.store.run_dir(&run_id),
                    run_id,
                    EventType::RunFailed,
                    json!({ "error": message }),
                );
                match self.store.update_run_status(
                    &run_id,
                    RunStatus::Error,
                    None,
                    None,
                    Some(message),
                ) {
                    Ok(updated) => Ok(updated),
                    // The failure write itself failed; surface the cause.
                    Err(_) => Err(err),
                }
            }
        }
    }

    fn run_stages(&self, start: &Run) -> Result<StageFlow> {
        let run_id = start.id;
        let start_rank = start.status.sequence_rank().unwrap_or(0);

        // Stage inputs are transient; a resume past extract or verify
        // rebuilds them from the store before re-entering the sequence.
        let mut evidence: Vec<Evidence> = Vec::new();
        let mut claims: Vec<Claim> = Vec::new();
        let mut approved: Vec<Claim> = Vec::new();
        if start_rank > stage_rank(RunStatus::Extract) {
            let (rebuilt_evidence, rebuilt_claims) = self.collect_extractions(start)?;
            evidence = rebuilt_evidence;
            claims = rebuilt_claims;
        }
        if start_rank > stage_rank(RunStatus::Verify) {
            approved = self.stage_verify(start, std::mem::take(&mut claims))?;
        }

        for status in STAGE_SEQUENCE {
            if stage_rank(status) < start_rank {
                continue;
            }
            let run = match self.enter(&run_id, status)? {
                Some(run) => run,
                None => return self.observe_cancellation(&run_id),
            };
            match status {
                RunStatus::Intake => self.stage_intake(&run)?,
                // Reserved pass-through stages: discover for future
                // source discovery, normalize for cross-source schema
                // alignment. Synthesis itself runs lazily at report
                // retrieval; publish closes out the sequence.
                RunStatus::Discover
                | RunStatus::Normalize
                | RunStatus::Synthesize
                | RunStatus::Publish => {}
                RunStatus::Fetch => self.stage_fetch(&run)?,
                RunStatus::Extract => {
                    let (extracted_evidence, extracted_claims) = self.stage_extract(&run)?;
                    evidence = extracted_evidence;
                    claims = extracted_claims;
                }
                RunStatus::Verify => {
                    approved = self.stage_verify(&run, std::mem::take(&mut claims))?;
                }
                RunStatus::Upsert => self.stage_upsert(&run, &evidence, &approved)?,
                RunStatus::Completed => {
                    log_event(
                        &self.store.run_dir(&run_id),
                        run_id,
                        EventType::RunCompleted,
                        json!({}),
                    )?;
                }
                RunStatus::Error => unreachable!("error is not part of the stage sequence"),
            }
        }
        Ok(StageFlow::Finished)
    }

    /// Writes the next status before its stage runs. Returns `None` when
    /// the stored status is no longer monotone with the requested one:
    /// an external cancel wrote `error`, or another driver moved ahead.
    fn enter(&self, run_id: &Uuid, status: RunStatus) -> Result<Option<Run>> {
        let current = self
            .store
            .get_run(run_id)?
            .with_context(|| format!("Run {run_id} row disappeared"))?;
        if current.status == RunStatus::Error {
            return Ok(None);
        }
        if let (Some(current_rank), Some(next_rank)) =
            (current.status.sequence_rank(), status.sequence_rank())
        {
            if next_rank < current_rank {
                return Ok(None);
            }
        }
        let run = self
            .store
            .update_run_status(run_id, status, None, None, None)?;
        log_event(
            &self.store.run_dir(run_id),
            *run_id,
            EventType::StageEntered,
            json!({ "stage": status.label() }),
        )?;
        Ok(Some(run))
    }

    fn observe_cancellation(&self, run_id: &Uuid) -> Result<StageFlow> {
        let _ = log_event(
            &self.store.run_dir(run_id),
            *run_id,
            EventType::RunCancelled,
            json!({}),
        );
        Ok(StageFlow::Cancelled)
    }

    fn stage_intake(&self, run: &Run) -> Result<()> {
        if run.input_kind == InputKind::SearchQuery
            && run.subject.split_whitespace().count() < 2
        {
            bail!(
                "search subject {:?} needs at least two name tokens (first and last name)",
                run.subject
            );
        }
        if run.max_provider_calls == 0 {
            bail!("run budget must allow at least one provider call");
        }
        Ok(())
    }

    fn stage_fetch(&self, run: &Run) -> Result<()> {
        let harvester = Harvester::new(self.provider, &self.config.scraper, &self.config.pipeline);
        let outcome = harvester.harvest(run)?;
        let run_dir = self.store.run_dir(&run.id);
        for issue in &outcome.issues {
            log_event(
                &run_dir,
                run.id,
                EventType::HarvestCallFailed,
                json!({
                    "source": issue.source,
                    "reason": format!("{:?}", issue.reason),
                    "message": issue.message,
                }),
            )?;
        }
        for evidence in &outcome.evidence {
            self.store.create_evidence(evidence)?;
        }
        let persisted = self.store.evidence_for_run(&run.id)?.len() as u64;
        self.store
            .update_run_status(&run.id, RunStatus::Fetch, Some(persisted), None, None)?;
        log_event(
            &run_dir,
            run.id,
            EventType::HarvestCompleted,
            json!({
                "calls_made": outcome.calls_made,
                "evidence": outcome.evidence.len(),
                "issues": outcome.issues.len(),
            }),
        )?;
        Ok(())
    }

    /// Parallel per-evidence extraction. Extractions are persisted back
    /// onto their evidence rows (an idempotent in-place update); claim
    /// persistence waits for the upsert stage.
    fn collect_extractions(&self, run: &Run) -> Result<(Vec<Evidence>, Vec<Claim>)> {
        let rows = self.store.evidence_for_run(&run.id)?;
        let extractor = Extractor::new(self.model, &self.config.llm);
        let parallelism = self.config.pipeline.extract_parallelism.max(1) as usize;
        let pool = ThreadPoolBuilder::new()
            .num_threads(parallelism)
            .build()
            .context("Failed to configure extraction thread pool")?;
        let outcomes: Vec<_> = pool.install(|| {
            rows.into_par_iter()
                .map(|evidence| {
                    let outcome = extractor.extract(&evidence);
                    (evidence, outcome)
                })
                .collect()
        });

        let run_dir = self.store.run_dir(&run.id);
        let mut evidence_rows = Vec::new();
        let mut claims = Vec::new();
        for (mut evidence, outcome) in outcomes {
            if let Some(extraction) = outcome.extraction {
                evidence.attach_extraction(extraction);
                self.store.create_evidence(&evidence)?;
            }
            if let Some(issue) = outcome.issue {
                log_event(
                    &run_dir,
                    run.id,
                    EventType::ExtractionFailed,
                    json!({ "evidence_id": evidence.id, "message": issue }),
                )?;
            }
            claims.extend(outcome.claims);
            evidence_rows.push(evidence);
        }
        Ok((evidence_rows, claims))
    }

    fn stage_extract(&self, run: &Run) -> Result<(Vec<Evidence>, Vec<Claim>)> {
        let (evidence, claims) = self.collect_extractions(run)?;
        self.store.update_run_status(
            &run.id,
            RunStatus::Extract,
            None,
            Some(claims.len() as u64),
            None,
        )?;
        log_event(
            &self.store.run_dir(&run.id),
            run.id,
            EventType::ExtractionCompleted,
            json!({ "evidence": evidence.len(), "claims": claims.len() }),
        )?;
        Ok((evidence, claims))
    }

    fn stage_verify(&self, run: &Run, claims: Vec<Claim>) -> Result<Vec<Claim>> {
        let verifier = Verifier::new(self.model);
        let run_dir = self.store.run_dir(&run.id);
        let mut approved: Vec<Claim> = Vec::new();
        for mut claim in claims {
            let verdict = verifier.verify(&claim, &self.consent, &approved);
            if verdict.approved {
                claim.object = verdict.object;
                claim.policy_tags = verdict.tags;
                claim.last_verified_at = Utc::now();
                approved.push(claim);
            } else {
                log_event(
                    &run_dir,
                    run.id,
                    EventType::ClaimRejected,
                    json!({
                        "predicate": claim.predicate,
                        "reason": verdict.reason,
                    }),
                )?;
            }
        }
        Ok(approved)
    }

    /// Canonical writes come first and are authoritative; the vector
    /// index is written after and only best-effort.
    fn stage_upsert(&self, run: &Run, evidence: &[Evidence], claims: &[Claim]) -> Result<()> {
        for row in evidence {
            self.store.create_evidence(row)?;
        }
        for claim in claims {
            self.store.create_claim(claim)?;
        }
        self.store.update_run_status(
            &run.id,
            RunStatus::Upsert,
            None,
            Some(claims.len() as u64),
            None,
        )?;
        let run_dir = self.store.run_dir(&run.id);
        log_event(
            &run_dir,
            run.id,
            EventType::ClaimsPersisted,
            json!({ "claims": claims.len() }),
        )?;

        if let Some(vector) = self.vector {
            for row in evidence {
                if let Err(err) = vector.upsert_evidence(row) {
                    let _ = log_event(
                        &run_dir,
                        run.id,
                        EventType::VectorWriteSkipped,
                        json!({
                            "key": crate::store::evidence_key(&row.id),
                            "error": format!("{err:#}"),
                        }),
                    );
                }
            }
            for claim in claims {
                if let Err(err) = vector.upsert_claim(claim) {
                    let _ = log_event(
                        &run_dir,
                        run.id,
                        EventType::VectorWriteSkipped,
                        json!({
                            "key": crate::store::claim_key(&claim.id),
                            "error": format!("{err:#}"),
                        }),
                    );
                }
            }
        }
        Ok(())
    }

    /// Synthesizes the report from the currently persisted state. Usable
    /// before `completed` (partial) and after (authoritative).
    pub fn report(&self, run_id: Uuid) -> Result<RunReport> {
        let run = self
            .store
            .get_run(&run_id)?
            .with_context(|| format!("Run {run_id} not found"))?;
        let evidence = self.store.evidence_for_run(&run_id)?;
        let claims = self.store.claims_for_run(&run_id)?;
        let synthesizer = Synthesizer::new(self.model, &self.config.llm);
        let report = synthesizer.synthesize(&run.subject, &evidence, &claims, &self.consent);
        let _ = log_event(
            &self.store.run_dir(&run_id),
            run_id,
            EventType::ReportSynthesized,
            json!({
                "confidence_score": report.confidence_score,
                "claims": claims.len(),
                "evidence": evidence.len(),
            }),
        );
        Ok(RunReport {
            run,
            report,
            evidence,
            claims,
        })
    }
}

fn stage_rank(status: RunStatus) -> u8 {
    status.sequence_rank().unwrap_or(0)
}
