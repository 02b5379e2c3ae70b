use crate::config::{PipelineSettings, ScraperSettings};
use crate::model::{ContentKind, Evidence, Run};
use crate::scraper::{
    ScrapeFailure, ScrapeProvider, PROFILE_SEARCH_SOURCE, WEB_SEARCH_SOURCE,
};
use anyhow::{bail, Result};
use std::collections::HashSet;

/// Why a single provider call produced no evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestIssueReason {
    ScraperUnavailable,
    ScraperTimeout,
    ScraperMalformed,
    ProviderError,
}

/// One absorbed per-call failure. These never abort a harvest; they
/// surface as missing evidence plus a logged event.
#[derive(Debug, Clone)]
pub struct HarvestIssue {
    pub source: String,
    pub reason: HarvestIssueReason,
    pub message: String,
}

impl HarvestIssue {
    fn from_failure(source: impl Into<String>, failure: &ScrapeFailure) -> Self {
        let reason = match failure {
            ScrapeFailure::Unavailable { .. } => HarvestIssueReason::ScraperUnavailable,
            ScrapeFailure::Timeout => HarvestIssueReason::ScraperTimeout,
            ScrapeFailure::Malformed(_) => HarvestIssueReason::ScraperMalformed,
            ScrapeFailure::Provider(_) => HarvestIssueReason::ProviderError,
        };
        Self {
            source: source.into(),
            reason,
            message: failure.to_string(),
        }
    }
}

/// Result of one harvest: collected evidence, calls actually spent, and
/// the per-call failures that were absorbed along the way.
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    pub evidence: Vec<Evidence>,
    pub calls_made: u32,
    pub issues: Vec<HarvestIssue>,
}

/// Decides which provider calls to make for a subject and in what
/// order, under a hard budget of trigger calls.
pub struct Harvester<'a> {
    provider: &'a dyn ScrapeProvider,
    scraper: &'a ScraperSettings,
    pipeline: &'a PipelineSettings,
}

impl<'a> Harvester<'a> {
    pub fn new(
        provider: &'a dyn ScrapeProvider,
        scraper: &'a ScraperSettings,
        pipeline: &'a PipelineSettings,
    ) -> Self {
        Self {
            provider,
            scraper,
            pipeline,
        }
    }

    /// Collects evidence for the run's subject. A failed individual call
    /// is recorded and skipped; an empty final list is not an error. The
    /// number of provider calls made never exceeds the run's budget.
    pub fn harvest(&self, run: &Run) -> Result<HarvestOutcome> {
        let budget = run.max_provider_calls;
        if budget == 0 {
            return Ok(HarvestOutcome::default());
        }
        if is_direct_profile_url(&run.subject, &self.scraper.profile_host) {
            self.harvest_direct(run, budget)
        } else {
            self.harvest_search(run, budget)
        }
    }

    fn harvest_direct(&self, run: &Run, _budget: u32) -> Result<HarvestOutcome> {
        let mut outcome = HarvestOutcome::default();
        let url = run.subject.as_str();
        outcome.calls_made += 1;
        let result = if url.contains("/company/") {
            self.provider.scrape_company(url)
        } else {
            self.provider.scrape_profile(url)
        };
        match result {
            Ok(record) => {
                let content = serde_json::to_string(&record)?;
                push_deduped(
                    &mut outcome.evidence,
                    Evidence::new(run.id, &run.subject, url, content, ContentKind::Json),
                );
            }
            Err(failure) => outcome.issues.push(HarvestIssue::from_failure(url, &failure)),
        }
        Ok(outcome)
    }

    fn harvest_search(&self, run: &Run, budget: u32) -> Result<HarvestOutcome> {
        let tokens: Vec<&str> = run.subject.split_whitespace().collect();
        if tokens.len() < 2 {
            bail!(
                "search subject {:?} needs at least two name tokens (first and last name)",
                run.subject
            );
        }
        let first_name = tokens[0].to_string();
        let last_name = tokens[1..].join(" ");

        let mut outcome = HarvestOutcome::default();

        // Context web search first; its evidence anchors the synthesis
        // narrative even when no profile scrape succeeds.
        if outcome.calls_made < budget {
            outcome.calls_made += 1;
            match self.provider.search_web(&run.subject) {
                Ok(data) => {
                    let content = serde_json::to_string(&data)?;
                    push_deduped(
                        &mut outcome.evidence,
                        Evidence::new(
                            run.id,
                            &run.subject,
                            WEB_SEARCH_SOURCE,
                            content,
                            ContentKind::Json,
                        ),
                    );
                }
                Err(failure) => outcome
                    .issues
                    .push(HarvestIssue::from_failure(WEB_SEARCH_SOURCE, &failure)),
            }
        }

        let mut discovered_urls: Vec<String> = Vec::new();
        if outcome.calls_made < budget {
            outcome.calls_made += 1;
            match self.provider.search_profiles(&first_name, &last_name) {
                Ok(records) => {
                    discovered_urls = records
                        .iter()
                        .filter_map(|r| r.profile_url().map(|u| u.to_string()))
                        .collect();
                    let content = serde_json::to_string(&records)?;
                    push_deduped(
                        &mut outcome.evidence,
                        Evidence::new(
                            run.id,
                            &run.subject,
                            PROFILE_SEARCH_SOURCE,
                            content,
                            ContentKind::Json,
                        ),
                    );
                }
                Err(failure) => outcome
                    .issues
                    .push(HarvestIssue::from_failure(PROFILE_SEARCH_SOURCE, &failure)),
            }
        }

        // Fan out over discovered profiles until the budget or the
        // fan-out cap is exhausted; remaining URLs are skipped silently.
        let mut fanned_out = 0u32;
        for url in discovered_urls {
            if outcome.calls_made >= budget || fanned_out >= self.pipeline.profile_fanout_limit {
                break;
            }
            outcome.calls_made += 1;
            fanned_out += 1;
            match self.provider.scrape_profile(&url) {
                Ok(record) => {
                    let content = serde_json::to_string(&record)?;
                    push_deduped(
                        &mut outcome.evidence,
                        Evidence::new(run.id, &run.subject, &url, content, ContentKind::Json),
                    );
                }
                Err(failure) => outcome
                    .issues
                    .push(HarvestIssue::from_failure(&url, &failure)),
            }
        }

        Ok(outcome)
    }
}

/// A subject is a direct-scrape URL when it points at a profile or
/// company page under the configured host.
pub fn is_direct_profile_url(subject: &str, profile_host: &str) -> bool {
    subject.contains(profile_host) && (subject.contains("/in/") || subject.contains("/company/"))
}

fn push_deduped(evidence: &mut Vec<Evidence>, candidate: Evidence) {
    let seen: HashSet<&str> = evidence.iter().map(|e| e.content_hash.as_str()).collect();
    if !seen.contains(candidate.content_hash.as_str()) {
        evidence.push(candidate);
    }
}
