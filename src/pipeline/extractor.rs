use crate::config::LlmSettings;
use crate::llm::{extract_json_block, ChatModel, ChatRequest};
use crate::model::{Claim, ClaimCandidate, ContentKind, Evidence, ExtractionResult};
use crate::scraper::ProfileRecord;
use chrono::Utc;
use serde::Deserialize;

/// Initial policy tag for claims produced by the LLM path.
pub const EXTRACTED_AI_TAG: &str = "extracted:ai";
/// Initial policy tag for claims produced by the deterministic fallback.
pub const EXTRACTED_FALLBACK_TAG: &str = "extracted:fallback";

/// Output of extracting one evidence record. The extraction (when one
/// was produced) still needs to be persisted onto the evidence by the
/// caller; extraction itself never touches the store.
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub extraction: Option<ExtractionResult>,
    pub claims: Vec<Claim>,
    pub issue: Option<String>,
}

/// Shape the extraction LLM must answer with.
#[derive(Debug, Deserialize)]
struct LlmExtraction {
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default)]
    claims: Vec<ClaimCandidate>,
}

/// Turns evidence records into claim candidates, via LLM when one is
/// available and via deterministic profile-field mapping otherwise.
pub struct Extractor<'a> {
    model: Option<&'a dyn ChatModel>,
    settings: &'a LlmSettings,
}

impl<'a> Extractor<'a> {
    pub fn new(model: Option<&'a dyn ChatModel>, settings: &'a LlmSettings) -> Self {
        Self { model, settings }
    }

    /// Extracts claims from one evidence record. A failed LLM call or an
    /// unparseable completion falls back to deterministic field mapping;
    /// evidence that neither path understands yields zero claims.
    pub fn extract(&self, evidence: &Evidence) -> ExtractOutcome {
        // A prior extraction short-circuits the LLM entirely.
        if let Some(prior) = &evidence.extraction {
            let claims = prior
                .claims
                .iter()
                .map(|candidate| Claim::from_candidate(candidate, evidence, EXTRACTED_AI_TAG))
                .collect();
            return ExtractOutcome {
                extraction: None,
                claims,
                issue: None,
            };
        }

        let mut llm_issue = None;
        if let Some(model) = self.model {
            match self.extract_via_llm(model, evidence) {
                Ok(parsed) => {
                    let extraction = ExtractionResult {
                        entities: parsed.entities,
                        claims: parsed.claims,
                        extracted_at: Utc::now(),
                    };
                    let claims = extraction
                        .claims
                        .iter()
                        .map(|candidate| {
                            Claim::from_candidate(candidate, evidence, EXTRACTED_AI_TAG)
                        })
                        .collect();
                    return ExtractOutcome {
                        extraction: Some(extraction),
                        claims,
                        issue: None,
                    };
                }
                Err(message) => llm_issue = Some(message),
            }
        }

        match deterministic_candidates(evidence) {
            Some((entities, candidates)) if !candidates.is_empty() => {
                let extraction = ExtractionResult {
                    entities,
                    claims: candidates,
                    extracted_at: Utc::now(),
                };
                let claims = extraction
                    .claims
                    .iter()
                    .map(|candidate| {
                        Claim::from_candidate(candidate, evidence, EXTRACTED_FALLBACK_TAG)
                    })
                    .collect();
                ExtractOutcome {
                    extraction: Some(extraction),
                    claims,
                    issue: None,
                }
            }
            _ => ExtractOutcome {
                extraction: None,
                claims: Vec::new(),
                issue: llm_issue,
            },
        }
    }

    fn extract_via_llm(
        &self,
        model: &dyn ChatModel,
        evidence: &Evidence,
    ) -> Result<LlmExtraction, String> {
        let body = match evidence.content_kind {
            ContentKind::Json => serde_json::from_str::<serde_json::Value>(&evidence.content)
                .map(|v| v.to_string())
                .unwrap_or_else(|_| evidence.content.clone()),
            _ => evidence.content.clone(),
        };
        let prompt = format!(
            "Subject: {subject}\nSource: {source}\n\nEvidence:\n{body}\n\n\
             Extract factual claims about the subject. Respond with strict JSON:\n\
             {{\"entities\": [\"...\"], \"claims\": [{{\"predicate\": \"...\", \
             \"object\": \"...\", \"confidence\": 0.0}}]}}\n\
             Prefer these predicates where they fit: {predicates}. \
             Only state what the evidence supports.",
            subject = evidence.subject,
            source = evidence.source,
            body = body,
            predicates = crate::model::CANONICAL_PREDICATES.join(", "),
        );
        let request = ChatRequest::new(
            prompt,
            self.settings.extraction_temperature,
            self.settings.extraction_max_tokens,
        )
        .with_system("You extract typed claims from evidence. Answer with strict JSON only.");

        let completion = model
            .complete(&request)
            .map_err(|err| format!("extraction call failed: {err}"))?;
        let block = extract_json_block(&completion)
            .ok_or_else(|| "extraction completion carried no JSON".to_string())?;
        serde_json::from_str(block).map_err(|err| format!("extraction parse failed: {err}"))
    }
}

/// Maps a profile-shaped JSON payload directly to claim candidates.
/// Returns `None` for evidence the mapping does not understand.
fn deterministic_candidates(evidence: &Evidence) -> Option<(Vec<String>, Vec<ClaimCandidate>)> {
    if evidence.content_kind != ContentKind::Json {
        return None;
    }
    let record: ProfileRecord = serde_json::from_str(&evidence.content).ok()?;
    if !record.is_profile_shaped() {
        return None;
    }

    let mut entities = Vec::new();
    let mut candidates = Vec::new();
    let mut push = |predicate: &str, object: String, confidence: f64| {
        if !object.is_empty() {
            candidates.push(ClaimCandidate {
                predicate: predicate.to_string(),
                object,
                confidence,
            });
        }
    };

    if let Some(name) = &record.name {
        entities.push(name.clone());
        push("has_name", name.clone(), 0.95);
    }
    let company = record
        .current_company_name
        .clone()
        .or_else(|| record.experience.first().and_then(|e| e.company.clone()));
    if let Some(company) = company {
        entities.push(company.clone());
        push("works_at", company, 0.9);
    }
    let title = record
        .position
        .clone()
        .or_else(|| record.experience.first().and_then(|e| e.title.clone()));
    if let Some(title) = title {
        push("has_title", title, 0.9);
    }
    match (&record.city, &record.country_code) {
        (Some(city), Some(country)) => push("located_in", format!("{city}, {country}"), 0.85),
        (Some(city), None) => push("located_in", city.clone(), 0.85),
        (None, Some(country)) => push("located_in", country.clone(), 0.7),
        (None, None) => {}
    }
    if let Some(about) = &record.about {
        push("has_about", about.chars().take(200).collect(), 0.8);
    }
    for education in &record.education {
        if let Some(school) = &education.title {
            entities.push(school.clone());
            push("graduated_from", school.clone(), 0.85);
        }
        if let Some(year) = &education.end_year {
            push("graduation_year", year.clone(), 0.8);
        }
    }
    if let Some(followers) = record.followers {
        push("has_followers", followers.to_string(), 0.9);
    }
    if let Some(connections) = record.connections {
        push("has_connections", connections.to_string(), 0.9);
    }

    Some((entities, candidates))
}
